//! Human-readable progress output.

/// Sink for human-readable progress lines.
///
/// The upgrade orchestrator reports what it is doing through a sink rather
/// than logging directly, so the CLI can print to stdout while tests
/// capture the lines.
pub trait ProgressSink {
    /// Emits one progress line.
    fn line(&mut self, message: &str);
}

/// Writes progress lines to stdout.
#[derive(Debug, Default)]
pub struct StdoutSink;

impl ProgressSink for StdoutSink {
    fn line(&mut self, message: &str) {
        println!("{message}");
    }
}

/// Collects progress lines in memory, for tests.
#[derive(Debug, Default)]
pub struct BufferSink {
    lines: Vec<String>,
}

impl BufferSink {
    /// Creates an empty buffer sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The lines collected so far.
    #[must_use]
    pub fn lines(&self) -> &[String] {
        &self.lines
    }
}

impl ProgressSink for BufferSink {
    fn line(&mut self, message: &str) {
        self.lines.push(message.to_string());
    }
}
