use std::fmt;

/// Severity of a message sent through a [`Reporter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportLevel {
	Info,
	Warn,
}

impl fmt::Display for ReportLevel {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Info => f.write_str("info"),
			Self::Warn => f.write_str("warn"),
		}
	}
}

/// Stage messages emitted by the compile and import pipelines.
///
/// Passed explicitly into every pipeline call. The pipelines never write to
/// stdout or stderr themselves.
pub trait Reporter {
	fn info(&mut self, message: &str);
	fn warn(&mut self, message: &str);
}

/// Forwards every message to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingReporter;

impl Reporter for TracingReporter {
	fn info(&mut self, message: &str) {
		tracing::info!("{message}");
	}

	fn warn(&mut self, message: &str) {
		tracing::warn!("{message}");
	}
}

/// Discards every message.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullReporter;

impl Reporter for NullReporter {
	fn info(&mut self, _message: &str) {}

	fn warn(&mut self, _message: &str) {}
}

/// A single collected message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportLine {
	pub level: ReportLevel,
	pub message: String,
}

/// Collects messages in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryReporter {
	lines: Vec<ReportLine>,
}

impl MemoryReporter {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn lines(&self) -> &[ReportLine] {
		&self.lines
	}

	/// Messages of the given level, in emission order.
	pub fn messages(&self, level: ReportLevel) -> Vec<&str> {
		self.lines
			.iter()
			.filter(|line| line.level == level)
			.map(|line| line.message.as_str())
			.collect()
	}

	pub fn into_lines(self) -> Vec<ReportLine> {
		self.lines
	}

	fn push(&mut self, level: ReportLevel, message: &str) {
		self.lines.push(ReportLine {
			level,
			message: message.to_string(),
		});
	}
}

impl Reporter for MemoryReporter {
	fn info(&mut self, message: &str) {
		self.push(ReportLevel::Info, message);
	}

	fn warn(&mut self, message: &str) {
		self.push(ReportLevel::Warn, message);
	}
}
