//! End-to-end upgrade runs against real table directories.

use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use strata_core::{
    BufferSink, CoreError, CoreResult, ProgressSink, SegmentBuilder, SegmentHandle,
    SegmentRewriter, UpgradeOptions, UpgradeScope, Upgrader,
};
use strata_store::{Component, FormatVersion, SegmentDescriptor};
use tempfile::{tempdir, TempDir};

fn version(tag: &str) -> FormatVersion {
    FormatVersion::parse(tag).unwrap()
}

/// Creates a table directory populated with segments at the given
/// (version, generation) identities.
fn table_with_segments(segments: &[(&str, u64)]) -> (TempDir, PathBuf) {
    let temp = tempdir().unwrap();
    let table_dir = temp.path().join("ks").join("events");
    fs::create_dir_all(&table_dir).unwrap();

    for &(tag, generation) in segments {
        write_segment(&table_dir, tag, generation);
    }

    (temp, table_dir)
}

fn write_segment(table_dir: &Path, tag: &str, generation: u64) -> SegmentDescriptor {
    let descriptor = SegmentDescriptor::new("ks", "events", version(tag), generation, table_dir);
    let mut builder = SegmentBuilder::new(descriptor.clone());
    builder
        .add_row(format!("row-{generation}-a").as_bytes())
        .add_row(format!("row-{generation}-b").as_bytes());
    builder.finish().unwrap();
    descriptor
}

/// Snapshot of a directory's file names and sizes, for unchanged checks.
fn directory_fingerprint(dir: &Path) -> BTreeMap<String, u64> {
    fs::read_dir(dir)
        .unwrap()
        .filter_map(|entry| {
            let entry = entry.unwrap();
            let metadata = entry.metadata().unwrap();
            metadata
                .is_file()
                .then(|| (entry.file_name().to_string_lossy().into_owned(), metadata.len()))
        })
        .collect()
}

fn run_upgrade(table_dir: &Path, options: UpgradeOptions) -> strata_core::UpgradeSummary {
    let mut sink = BufferSink::new();
    Upgrader::new(options).run(table_dir, &mut sink).unwrap()
}

#[test]
fn upgrades_all_outdated_segments() {
    let (_temp, table_dir) = table_with_segments(&[("la", 1), ("la", 2), ("la", 3)]);

    let mut sink = BufferSink::new();
    let summary = Upgrader::new(UpgradeOptions::new(version("ma")))
        .run(&table_dir, &mut sink)
        .unwrap();

    assert_eq!(summary.discovered, 3);
    assert_eq!(summary.candidates, 3);
    assert_eq!(summary.converted, 3);
    assert_eq!(summary.failed, 0);
    assert!(sink
        .lines()
        .contains(&"Found 3 segments that need upgrade.".to_string()));

    // Every identity now exists exactly once, at the target version.
    for generation in 1..=3 {
        let upgraded =
            SegmentDescriptor::new("ks", "events", version("ma"), generation, &table_dir);
        assert!(upgraded.path_for(Component::Data).exists());
        assert!(upgraded.path_for(Component::PrimaryIndex).exists());

        let old = upgraded.with_version(version("la"));
        assert!(!old.path_for(Component::Data).exists());
        assert!(!old.path_for(Component::PrimaryIndex).exists());
    }
}

#[test]
fn rerun_after_upgrade_is_a_noop() {
    let (_temp, table_dir) = table_with_segments(&[("la", 1), ("la", 2), ("la", 3)]);

    run_upgrade(&table_dir, UpgradeOptions::new(version("ma")));
    let before = directory_fingerprint(&table_dir);

    let summary = run_upgrade(&table_dir, UpgradeOptions::new(version("ma")));

    assert_eq!(summary.discovered, 3);
    assert_eq!(summary.candidates, 0);
    assert_eq!(summary.converted, 0);
    assert_eq!(summary.failed, 0);
    assert_eq!(directory_fingerprint(&table_dir), before);
}

#[test]
fn unsupported_target_fails_before_touching_anything() {
    let (_temp, table_dir) = table_with_segments(&[("la", 1), ("la", 2)]);
    let before = directory_fingerprint(&table_dir);

    let mut sink = BufferSink::new();
    let err = Upgrader::new(UpgradeOptions::new(version("jb")))
        .run(&table_dir, &mut sink)
        .unwrap_err();

    assert!(matches!(err, CoreError::UnsupportedTargetVersion { .. }));
    assert!(err.is_precondition());
    assert!(sink.lines().is_empty());
    assert_eq!(directory_fingerprint(&table_dir), before);
}

#[test]
fn unreadable_directory_is_a_precondition_failure() {
    let temp = tempdir().unwrap();
    let missing = temp.path().join("ks").join("absent");

    let mut sink = BufferSink::new();
    let err = Upgrader::new(UpgradeOptions::new(version("ma")))
        .run(&missing, &mut sink)
        .unwrap_err();

    assert!(err.is_precondition());
}

#[test]
fn corrupted_segment_does_not_abort_the_rest() {
    let (_temp, table_dir) = table_with_segments(&[("la", 1), ("la", 2), ("la", 3)]);

    // Stomp the data magic of generation 2.
    let victim = SegmentDescriptor::new("ks", "events", version("la"), 2, &table_dir);
    let mut file = OpenOptions::new()
        .write(true)
        .open(victim.path_for(Component::Data))
        .unwrap();
    file.seek(SeekFrom::Start(0)).unwrap();
    file.write_all(b"XXXX").unwrap();
    drop(file);

    let summary = run_upgrade(&table_dir, UpgradeOptions::new(version("ma")));

    assert_eq!(summary.discovered, 3);
    assert_eq!(summary.candidates, 2);
    assert_eq!(summary.converted, 2);
    assert_eq!(summary.failed, 1);

    // The corrupted segment's files are untouched.
    assert!(victim.path_for(Component::Data).exists());
    assert!(victim.path_for(Component::PrimaryIndex).exists());
    // The healthy ones were upgraded.
    for generation in [1, 3] {
        let upgraded =
            SegmentDescriptor::new("ks", "events", version("ma"), generation, &table_dir);
        assert!(upgraded.path_for(Component::Data).exists());
    }
}

#[test]
fn segment_missing_primary_index_is_never_a_candidate() {
    let (_temp, table_dir) = table_with_segments(&[("la", 1), ("la", 2), ("la", 3)]);

    let invalid = SegmentDescriptor::new("ks", "events", version("la"), 2, &table_dir);
    fs::remove_file(invalid.path_for(Component::PrimaryIndex)).unwrap();

    let summary = run_upgrade(&table_dir, UpgradeOptions::new(version("ma")));

    assert_eq!(summary.discovered, 3);
    assert_eq!(summary.candidates, 2);
    assert_eq!(summary.converted, 2);
    // Missing required components is a silent skip, not a failure.
    assert_eq!(summary.failed, 0);
    assert!(invalid.path_for(Component::Data).exists());
}

#[test]
fn keep_source_leaves_both_versions_on_disk() {
    let (_temp, table_dir) = table_with_segments(&[("la", 5)]);

    let summary = run_upgrade(
        &table_dir,
        UpgradeOptions::new(version("ma")).with_keep_source(true),
    );
    assert_eq!(summary.converted, 1);

    let old = SegmentDescriptor::new("ks", "events", version("la"), 5, &table_dir);
    let new = old.with_version(version("ma"));
    for component in [Component::Data, Component::PrimaryIndex, Component::Statistics] {
        assert!(old.path_for(component).exists(), "{component} (old)");
        assert!(new.path_for(component).exists(), "{component} (new)");
    }
}

#[test]
fn snapshot_mode_upgrades_only_the_snapshot() {
    let (_temp, table_dir) = table_with_segments(&[("la", 1)]);
    let snapshot_dir = table_dir.join("snapshots").join("before");
    fs::create_dir_all(&snapshot_dir).unwrap();
    write_segment(&snapshot_dir, "la", 9);

    let summary = run_upgrade(
        &table_dir,
        UpgradeOptions::new(version("ma")).with_snapshot("before"),
    );

    assert_eq!(summary.discovered, 1);
    assert_eq!(summary.converted, 1);

    // Snapshot segment upgraded, live segment untouched.
    let snapped = SegmentDescriptor::new("ks", "events", version("ma"), 9, &snapshot_dir);
    assert!(snapped.path_for(Component::Data).exists());
    let live = SegmentDescriptor::new("ks", "events", version("la"), 1, &table_dir);
    assert!(live.path_for(Component::Data).exists());
}

/// A rewriter that fails for one generation, to exercise conversion-error
/// isolation separately from discovery-error isolation.
struct FailingRewriter {
    fail_generation: u64,
    inner: strata_core::FormatRewriter,
}

impl SegmentRewriter for FailingRewriter {
    fn rewrite(
        &self,
        handle: &SegmentHandle,
        scope: &mut UpgradeScope,
        output: &mut dyn ProgressSink,
        target: FormatVersion,
        keep_source: bool,
    ) -> CoreResult<Vec<SegmentDescriptor>> {
        if handle.descriptor().generation == self.fail_generation {
            // Leave a partial file behind so abort has something to discard.
            let partial = handle
                .descriptor()
                .with_version(target)
                .path_for(Component::Data);
            scope.track_new(partial.clone())?;
            fs::write(&partial, b"partial")?;
            return Err(CoreError::conversion(
                handle.descriptor().to_string(),
                "synthetic rewrite failure",
            ));
        }
        self.inner.rewrite(handle, scope, output, target, keep_source)
    }
}

#[test]
fn conversion_failure_aborts_only_that_segment() {
    let (_temp, table_dir) = table_with_segments(&[("la", 1), ("la", 2), ("la", 3)]);

    let upgrader = Upgrader::with_rewriter(
        UpgradeOptions::new(version("ma")),
        Box::new(FailingRewriter {
            fail_generation: 2,
            inner: strata_core::FormatRewriter::new(),
        }),
    );

    let mut sink = BufferSink::new();
    let summary = upgrader.run(&table_dir, &mut sink).unwrap();

    assert_eq!(summary.candidates, 3);
    assert_eq!(summary.converted, 2);
    assert_eq!(summary.failed, 1);
    assert!(sink
        .lines()
        .iter()
        .any(|l| l.contains("Error upgrading ks.events gen 2")));

    // The failed segment keeps its old files and no partial new file.
    let failed_old = SegmentDescriptor::new("ks", "events", version("la"), 2, &table_dir);
    assert!(failed_old.path_for(Component::Data).exists());
    let failed_new = failed_old.with_version(version("ma"));
    assert!(!failed_new.path_for(Component::Data).exists());
}

#[test]
fn drain_timeout_does_not_fail_the_run() {
    let (_temp, table_dir) = table_with_segments(&[("la", 1)]);

    let upgrader = Upgrader::new(
        UpgradeOptions::new(version("ma")).with_drain_timeout(Duration::from_millis(20)),
    );
    upgrader
        .compaction()
        .submit(|| std::thread::sleep(Duration::from_secs(2)))
        .unwrap();

    let started = std::time::Instant::now();
    let mut sink = BufferSink::new();
    let summary = upgrader.run(&table_dir, &mut sink).unwrap();

    assert_eq!(summary.converted, 1);
    // The stuck job is abandoned at the timeout, so the run returns well
    // before the job finishes.
    assert!(
        started.elapsed() < Duration::from_secs(1),
        "run blocked past the drain timeout"
    );
}

#[test]
fn empty_table_directory_reports_zero_everything() {
    let temp = tempdir().unwrap();
    let table_dir = temp.path().join("ks").join("events");
    fs::create_dir_all(&table_dir).unwrap();

    let summary = run_upgrade(&table_dir, UpgradeOptions::new(version("ma")));
    assert_eq!(summary, strata_core::UpgradeSummary::default());
}

#[test]
fn segments_already_at_target_are_not_candidates() {
    // Target "la" is writable but not latest; the gen 1 segment is already
    // there and must be skipped without ever entering a scope, while the
    // "ka" segment is still upgraded.
    let (_temp, table_dir) = table_with_segments(&[("la", 1), ("ka", 2)]);
    let at_target = SegmentDescriptor::new("ks", "events", version("la"), 1, &table_dir);
    let before = fs::read(at_target.path_for(Component::Data)).unwrap();

    let mut sink = BufferSink::new();
    let summary = Upgrader::new(UpgradeOptions::new(version("la")))
        .run(&table_dir, &mut sink)
        .unwrap();

    assert_eq!(summary.discovered, 2);
    assert_eq!(summary.candidates, 1);
    assert_eq!(summary.converted, 1);
    assert_eq!(summary.failed, 0);
    assert!(sink
        .lines()
        .contains(&"Found 1 segments that need upgrade.".to_string()));
    assert_eq!(
        fs::read(at_target.path_for(Component::Data)).unwrap(),
        before
    );
}

#[test]
fn older_writable_target_is_accepted() {
    // "la" is writable but not latest; segments at "la" are not candidates
    // when the recorded version is already the latest, so build a "ka"
    // segment and upgrade it to "la".
    let (_temp, table_dir) = table_with_segments(&[("ka", 1)]);

    let summary = run_upgrade(&table_dir, UpgradeOptions::new(version("la")));
    assert_eq!(summary.converted, 1);

    let upgraded = SegmentDescriptor::new("ks", "events", version("la"), 1, &table_dir);
    assert!(upgraded.path_for(Component::Data).exists());
}
