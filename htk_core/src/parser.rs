//! Splits `Hotkey.htk` text into raw records.
//!
//! Two header shapes are recognised:
//!
//! ```text
//! Ctrl+B:Buy 100:~ 42:CXL ALL~0D~0A...   length-delimited header
//! Ctrl+B:Buy 100:CXL ALL                 legacy inline header, single line
//! ```
//!
//! Any other line continues the body of the current record.

use std::collections::HashMap;
use std::io;
use std::path::Path;
use std::path::PathBuf;

use crate::ESCAPE;
use crate::ErrorContext;
use crate::HtkError;
use crate::HtkResult;
use crate::is_valid_key_combo;

/// One record as it appears in the file, body still encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedHotkeyRecord {
	/// 1-indexed position among records.
	pub index: usize,
	/// 1-indexed line of the header.
	pub line: usize,
	/// Trimmed key combination, possibly empty.
	pub key: String,
	pub label: String,
	/// Declared byte length. Always `0` for legacy inline headers.
	pub script_length: usize,
	/// Concatenated encoded body lines.
	pub encoded_body: String,
	pub source_path: PathBuf,
	/// Whether the header lacked a `~ length:` token.
	pub legacy_inline: bool,
}

impl ParsedHotkeyRecord {
	/// Whether the body already encodes at least the declared number of
	/// bytes. Legacy inline records are always complete.
	fn is_complete(&self) -> bool {
		self.legacy_inline
			|| self.script_length == 0
			|| encoded_byte_count(&self.encoded_body) >= self.script_length
	}
}

/// Number of bytes an encoded body decodes to, without validating tokens.
pub fn encoded_byte_count(encoded: &str) -> usize {
	let mut count = 0;
	let mut chars = encoded.chars();
	while let Some(c) = chars.next() {
		count += 1;
		if c == ESCAPE {
			chars.nth(1);
		}
	}
	count
}

/// `key:label:rest` split at the first two colons. The label may be empty.
struct HeaderParts<'a> {
	key: &'a str,
	label: &'a str,
	rest: &'a str,
}

fn split_header(line: &str) -> Option<HeaderParts<'_>> {
	let (key, after_key) = line.split_once(':')?;
	let (label, rest) = after_key.split_once(':')?;

	Some(HeaderParts { key, label, rest })
}

/// Match `~<whitespace>+<digits>:` at the start of `rest`, returning the
/// digits and the remaining body.
fn split_length_token(rest: &str) -> Option<(&str, &str)> {
	let after_tilde = rest.strip_prefix(ESCAPE)?;
	let digits_start = after_tilde.trim_start();
	if digits_start.len() == after_tilde.len() {
		return None;
	}

	let digits_len = digits_start
		.bytes()
		.take_while(u8::is_ascii_digit)
		.count();
	if digits_len == 0 {
		return None;
	}

	let (digits, after_digits) = digits_start.split_at(digits_len);
	let body = after_digits.strip_prefix(':')?;

	Some((digits, body))
}

/// Whether `line` is a complete length-delimited header with a non-empty
/// label.
pub fn is_record_header(line: &str) -> bool {
	split_header(line).is_some_and(|parts| {
		!parts.label.is_empty() && split_length_token(parts.rest).is_some()
	})
}

/// Split a length-delimited header line, empty label allowed, into the
/// prefix up to the digits, the digits, and the body after them.
pub(crate) fn split_length_header(line: &str) -> Option<(&str, &str, &str)> {
	let parts = split_header(line)?;
	let (digits, body) = split_length_token(parts.rest)?;
	let prefix_len = line.len() - digits.len() - 1 - body.len();

	Some((&line[..prefix_len], digits, body))
}

/// Split content into lines on `\r\n`, `\n`, or `\r`.
pub(crate) fn split_lines(content: &str) -> Vec<&str> {
	let mut lines = Vec::new();
	let mut start = 0;
	let bytes = content.as_bytes();
	let mut index = 0;

	while index < bytes.len() {
		match bytes[index] {
			b'\r' => {
				lines.push(&content[start..index]);
				if bytes.get(index + 1) == Some(&b'\n') {
					index += 1;
				}
				start = index + 1;
			}
			b'\n' => {
				lines.push(&content[start..index]);
				start = index + 1;
			}
			_ => {}
		}
		index += 1;
	}
	lines.push(&content[start..]);

	lines
}

/// Parse `Hotkey.htk` content into records.
pub fn parse_hotkey_records(content: &str, source_path: &Path) -> HtkResult<Vec<ParsedHotkeyRecord>> {
	let mut records: Vec<ParsedHotkeyRecord> = Vec::new();
	let mut seen_keys: HashMap<String, usize> = HashMap::new();
	let mut current: Option<ParsedHotkeyRecord> = None;

	for (offset, line) in split_lines(content).into_iter().enumerate() {
		let line_number = offset + 1;
		let record_index = records.len() + usize::from(current.is_some()) + 1;

		if let Some(parts) = split_header(line) {
			if let Some((length_raw, body)) = split_length_token(parts.rest) {
				if parts.label.trim().is_empty() {
					return Err(missing_header_fields(line_number, Some(record_index), source_path));
				}

				let key = parts.key.trim();
				let script_length = length_raw.parse::<usize>().map_err(|_| {
					HtkError::import_parse("Hotkey record has an invalid script length token.")
						.with_details(format!("Line {line_number} length token: {length_raw}."))
						.with_context(
							ErrorContext::record(record_index, line_number)
								.with_key(key)
								.with_label(parts.label)
								.with_source_path(source_path),
						)
				})?;

				register_key(&mut seen_keys, key, parts.label, record_index, line_number, source_path)?;
				records.extend(current.take());
				current = Some(ParsedHotkeyRecord {
					index: record_index,
					line: line_number,
					key: key.to_string(),
					label: parts.label.to_string(),
					script_length,
					encoded_body: body.to_string(),
					source_path: source_path.to_path_buf(),
					legacy_inline: false,
				});
				continue;
			}

			let continues_body = current.as_ref().is_some_and(|record| !record.is_complete());
			if !parts.label.is_empty() && !continues_body {
				if parts.label.trim().is_empty() {
					return Err(missing_header_fields(line_number, Some(record_index), source_path));
				}

				let key = parts.key.trim();
				if key.is_empty() || is_valid_key_combo(key) {
					register_key(&mut seen_keys, key, parts.label, record_index, line_number, source_path)?;
					records.extend(current.take());
					current = Some(ParsedHotkeyRecord {
						index: record_index,
						line: line_number,
						key: key.to_string(),
						label: parts.label.to_string(),
						script_length: 0,
						encoded_body: parts.rest.to_string(),
						source_path: source_path.to_path_buf(),
						legacy_inline: true,
					});
					continue;
				}
			}
		}

		match current.as_mut() {
			Some(record) => record.encoded_body.push_str(line),
			None if line.trim().is_empty() => {}
			None => {
				return Err(
					HtkError::import_parse("Hotkey.htk contains data before the first record header.")
						.with_details(format!("Line {line_number} does not match a hotkey header."))
						.with_context(ErrorContext::line(line_number).with_source_path(source_path)),
				);
			}
		}
	}

	records.extend(current);

	if records.is_empty() {
		return Err(
			HtkError::import_parse("Hotkey.htk contains no hotkey records.")
				.with_details(source_path.display().to_string())
				.with_context(ErrorContext::source(source_path)),
		);
	}

	tracing::debug!(records = records.len(), "parsed hotkey records");
	Ok(records)
}

fn missing_header_fields(line: usize, record_index: Option<usize>, source_path: &Path) -> HtkError {
	let mut context = ErrorContext::line(line).with_source_path(source_path);
	context.record_index = record_index;

	HtkError::import_parse("Hotkey record is missing required header fields.")
		.with_details(format!("Line {line} must include key and label."))
		.with_context(context)
}

fn register_key(
	seen_keys: &mut HashMap<String, usize>,
	key: &str,
	label: &str,
	record_index: usize,
	line: usize,
	source_path: &Path,
) -> HtkResult<()> {
	if key.is_empty() {
		return Ok(());
	}

	if let Some(first_line) = seen_keys.get(key) {
		return Err(
			HtkError::import_parse("Duplicate key combination detected in Hotkey.htk.")
				.with_details(format!("Key {key} appears on lines {first_line} and {line}."))
				.with_context(
					ErrorContext::record(record_index, line)
						.with_key(key)
						.with_label(label)
						.with_source_path(source_path),
				),
		);
	}

	seen_keys.insert(key.to_string(), line);
	Ok(())
}

/// Read an import source, checking that it exists, is a regular file, is
/// not blank, and contains at least one length-delimited record header.
pub fn read_import_source(source_path: &Path) -> HtkResult<String> {
	let metadata = std::fs::metadata(source_path).map_err(|e| {
		let message = if e.kind() == io::ErrorKind::NotFound {
			"Hotkey source file does not exist."
		} else {
			"Unable to read the Hotkey source file."
		};
		HtkError::import_input(message)
			.with_details(format!("{}: {e}", source_path.display()))
			.with_context(ErrorContext::source(source_path))
	})?;

	if !metadata.is_file() {
		return Err(
			HtkError::import_input("Hotkey source is not a file.")
				.with_details(source_path.display().to_string())
				.with_context(ErrorContext::source(source_path)),
		);
	}

	let bytes = std::fs::read(source_path).map_err(|e| {
		HtkError::import_input("Unable to read the Hotkey source file.")
			.with_details(e.to_string())
			.with_context(ErrorContext::source(source_path))
	})?;
	let content = String::from_utf8_lossy(&bytes).into_owned();

	if content.trim().is_empty() {
		return Err(
			HtkError::import_input("Hotkey.htk is empty.")
				.with_details(source_path.display().to_string())
				.with_context(ErrorContext::source(source_path)),
		);
	}

	if !split_lines(&content).into_iter().any(is_record_header) {
		return Err(
			HtkError::import_input("Hotkey.htk does not appear to contain any hotkey records.")
				.with_details("Expected a line formatted as Key:Label:~ length:encodedScript.")
				.with_context(ErrorContext::source(source_path)),
		);
	}

	Ok(content)
}
