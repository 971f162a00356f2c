//! List command implementation.

use std::path::Path;
use strata_store::{FormatVersion, ListMode, SegmentLister, TableLayout};

/// Runs the list command.
///
/// Versions shown come from file names; segments are not opened, so a
/// segment whose header disagrees with its file name will still show the
/// file-name version here (the upgrade command's selector uses the header).
pub fn run(
    data_dir: &Path,
    keyspace: &str,
    table: &str,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let layout = TableLayout::new(data_dir);
    let table_dir = layout.table_dir(keyspace, table)?;

    let segments = SegmentLister::new(&table_dir, ListMode::Live).list()?;
    let latest = FormatVersion::latest();

    if format == "json" {
        let entries: Vec<_> = segments
            .iter()
            .map(|(descriptor, components)| {
                serde_json::json!({
                    "keyspace": descriptor.keyspace,
                    "table": descriptor.table,
                    "generation": descriptor.generation,
                    "version": descriptor.version.to_string(),
                    "components": components.len(),
                    "loadable": components.is_loadable(),
                    "outdated": descriptor.version != latest,
                })
            })
            .collect();
        println!("{}", serde_json::Value::Array(entries));
        return Ok(());
    }

    println!("Segments of {keyspace}.{table}");
    println!("==============================");
    if segments.is_empty() {
        println!("  (none)");
        return Ok(());
    }

    for (descriptor, components) in &segments {
        let status = if !components.is_loadable() {
            "incomplete"
        } else if descriptor.version == latest {
            "current"
        } else {
            "outdated"
        };
        println!(
            "  gen {:>6}  version {}  components {}  [{status}]",
            descriptor.generation,
            descriptor.version,
            components.len()
        );
    }

    Ok(())
}
