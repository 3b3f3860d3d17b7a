use std::fmt;
use std::path::Path;
use std::path::PathBuf;

use crate::CRLF;
use crate::CompileOptions;
use crate::DiscoveryOptions;
use crate::ErrorContext;
use crate::HtkError;
use crate::HtkResult;
use crate::PlaceholderValues;
use crate::Reporter;
use crate::compile_hotkeys;
use crate::parser::split_length_header;
use crate::parser::split_lines;
use crate::writer::unique_suffix;

const SNIPPET_WINDOW: usize = 16;
const HEADER_PREVIEW_CHARS: usize = 120;

/// Result of rebuilding a workspace and comparing it with its source file.
#[derive(Debug, Clone)]
pub struct RoundTripReport {
	/// Source file content, lossily decoded.
	pub original: String,
	/// Rebuilt file content, lossily decoded.
	pub rebuilt: String,
	/// `None` when the bytes are identical.
	pub mismatch: Option<Mismatch>,
}

impl RoundTripReport {
	pub fn matched(&self) -> bool {
		self.mismatch.is_none()
	}
}

/// Where and how the rebuilt file first diverges from the original.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mismatch {
	/// 0-based byte offset of the first difference.
	pub offset: usize,
	pub original_len: usize,
	pub rebuilt_len: usize,
	/// Record and line of the offset within the original.
	pub record_context: String,
	pub original_records: usize,
	pub rebuilt_records: usize,
	/// Only header length tokens differ.
	pub length_tokens_only: bool,
	pub original_hex: String,
	pub rebuilt_hex: String,
	pub original_text: String,
	pub rebuilt_text: String,
}

impl fmt::Display for Mismatch {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		writeln!(
			f,
			"Mismatch at byte {} (original {} bytes, rebuilt {} bytes).",
			self.offset + 1,
			self.original_len,
			self.rebuilt_len
		)?;
		writeln!(f, "{}", self.record_context)?;
		writeln!(
			f,
			"Original records: {}, rebuilt records: {}.",
			self.original_records, self.rebuilt_records
		)?;
		if self.length_tokens_only {
			writeln!(
				f,
				"Only length tokens differ (computed script length vs. original header value)."
			)?;
		}
		writeln!(f, "Original hex: {}", self.original_hex)?;
		writeln!(f, "Rebuilt hex:  {}", self.rebuilt_hex)?;
		writeln!(f, "Original text: {}", self.original_text)?;
		write!(f, "Rebuilt text:  {}", self.rebuilt_text)
	}
}

/// Removes the wrapped path when dropped.
struct TempFile(PathBuf);

impl Drop for TempFile {
	fn drop(&mut self) {
		let _ = std::fs::remove_file(&self.0);
	}
}

/// Compile `workspace_root` (without placeholder values) to a temp file in
/// the workspace and byte-compare it with `source_path`.
pub fn verify_round_trip(
	source_path: &Path,
	workspace_root: &Path,
	discovery: &DiscoveryOptions,
	reporter: &mut dyn Reporter,
) -> HtkResult<RoundTripReport> {
	let temp = TempFile(workspace_root.join(format!(".roundtrip-{}.htk", unique_suffix())));
	let options = CompileOptions {
		workspace_root: workspace_root.to_path_buf(),
		output_path: temp.0.clone(),
		placeholder_values: PlaceholderValues::default(),
		fail_on_missing_placeholders: false,
		discovery: discovery.clone(),
	};

	compile_hotkeys(&options, reporter).map_err(|e| verify_error(source_path, &e.to_string(), e.details()))?;

	let original = std::fs::read(source_path)
		.map_err(|e| verify_error(source_path, "Unable to read the Hotkey source file.", Some(&e.to_string())))?;
	let rebuilt = std::fs::read(&temp.0)
		.map_err(|e| verify_error(source_path, "Unable to read the rebuilt Hotkey file.", Some(&e.to_string())))?;

	let mismatch = compare(&original, &rebuilt);
	match &mismatch {
		Some(mismatch) => reporter.warn(&format!("Round-trip mismatch at byte {}.", mismatch.offset + 1)),
		None => reporter.info("Round-trip verification matched."),
	}

	Ok(RoundTripReport {
		original: String::from_utf8_lossy(&original).into_owned(),
		rebuilt: String::from_utf8_lossy(&rebuilt).into_owned(),
		mismatch,
	})
}

fn verify_error(source_path: &Path, cause: &str, details: Option<&str>) -> HtkError {
	let details = match details {
		Some(details) => format!("{cause} {details}"),
		None => cause.to_string(),
	};

	HtkError::import_verify("Round-trip verification failed.")
		.with_details(details)
		.with_context(ErrorContext::source(source_path))
}

/// Compare two byte buffers and describe the first difference.
pub fn compare(original: &[u8], rebuilt: &[u8]) -> Option<Mismatch> {
	let offset = first_difference(original, rebuilt)?;
	let start = offset.saturating_sub(SNIPPET_WINDOW);
	let original_text = String::from_utf8_lossy(original);
	let rebuilt_text = String::from_utf8_lossy(rebuilt);

	Some(Mismatch {
		offset,
		original_len: original.len(),
		rebuilt_len: rebuilt.len(),
		record_context: record_context(original, offset),
		original_records: count_records(&original_text),
		rebuilt_records: count_records(&rebuilt_text),
		length_tokens_only: only_length_tokens_differ(&original_text, &rebuilt_text),
		original_hex: hex_snippet(original, start),
		rebuilt_hex: hex_snippet(rebuilt, start),
		original_text: ascii_snippet(original, start),
		rebuilt_text: ascii_snippet(rebuilt, start),
	})
}

fn first_difference(original: &[u8], rebuilt: &[u8]) -> Option<usize> {
	let shared = original.len().min(rebuilt.len());
	let position = original
		.iter()
		.zip(rebuilt)
		.position(|(a, b)| a != b);

	match position {
		Some(index) => Some(index),
		None if original.len() != rebuilt.len() => Some(shared),
		None => None,
	}
}

fn window(bytes: &[u8], start: usize) -> &[u8] {
	let start = start.min(bytes.len());
	let end = (start + SNIPPET_WINDOW * 2).min(bytes.len());
	&bytes[start..end]
}

fn hex_snippet(bytes: &[u8], start: usize) -> String {
	window(bytes, start)
		.iter()
		.map(|byte| format!("{byte:02x}"))
		.collect::<Vec<_>>()
		.join(" ")
}

fn ascii_snippet(bytes: &[u8], start: usize) -> String {
	String::from_utf8_lossy(window(bytes, start))
		.chars()
		.map(|c| if (' '..='~').contains(&c) { c } else { '.' })
		.collect()
}

fn count_records(text: &str) -> usize {
	split_lines(text)
		.into_iter()
		.filter(|line| split_length_header(line).is_some())
		.count()
}

fn crlf_lines(bytes: &[u8]) -> Vec<&[u8]> {
	let mut lines = Vec::new();
	let mut start = 0;
	let mut index = 0;

	while index + 1 < bytes.len() {
		if bytes[index] == b'\r' && bytes[index + 1] == b'\n' {
			lines.push(&bytes[start..index]);
			index += 2;
			start = index;
		} else {
			index += 1;
		}
	}
	lines.push(&bytes[start..]);

	lines
}

/// Same line count, and every differing line is a header whose only change
/// is the length token.
fn only_length_tokens_differ(original: &str, rebuilt: &str) -> bool {
	let original_lines = original.split(CRLF).collect::<Vec<_>>();
	let rebuilt_lines = rebuilt.split(CRLF).collect::<Vec<_>>();

	if original_lines.len() != rebuilt_lines.len() {
		return false;
	}

	original_lines
		.iter()
		.zip(&rebuilt_lines)
		.filter(|(a, b)| a != b)
		.all(|(a, b)| {
			match (split_length_header(a), split_length_header(b)) {
				(Some((a_prefix, _, a_body)), Some((b_prefix, _, b_body))) => {
					a_prefix == b_prefix && a_body == b_body
				}
				_ => false,
			}
		})
}

/// Describe which record and line of `bytes` contains byte `offset`.
///
/// Lines are split on raw `\r\n` so invalid UTF-8 cannot shift the offsets.
fn record_context(bytes: &[u8], offset: usize) -> String {
	let mut line_start = 0;
	let mut record_index = 0;

	for (index, raw_line) in crlf_lines(bytes).into_iter().enumerate() {
		let line_end = line_start + raw_line.len();
		let line = String::from_utf8_lossy(raw_line);
		if split_length_header(&line).is_some() {
			record_index += 1;
		}

		if offset >= line_start && offset <= line_end + 1 {
			if record_index == 0 {
				return "Offset occurs before the first record header.".to_string();
			}

			let preview = line.chars().take(HEADER_PREVIEW_CHARS).collect::<String>();
			let ellipsis = if line.chars().count() > HEADER_PREVIEW_CHARS {
				"..."
			} else {
				""
			};
			return format!(
				"Record {record_index}, line {} (header: {preview}{ellipsis})",
				index + 1
			);
		}

		line_start = line_end + CRLF.len();
	}

	"Offset occurs after the last record.".to_string()
}
