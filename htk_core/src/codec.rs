//! The `Hotkey.htk` body codec.
//!
//! Script text is normalized to CRLF and encoded byte by byte: printable
//! ASCII in `0x20..=0x7D` is written literally, every other byte becomes a
//! `~XX` token with two uppercase hex digits. The encoded stream is wrapped
//! into lines of [`ENCODED_LINE_WIDTH`] characters without ever splitting a
//! token, and the first line is prefixed with the record header
//! `key:label:~ length:`.

use std::path::PathBuf;

use crate::CRLF;
use crate::DecodedHotkeyRecord;
use crate::ENCODED_LINE_WIDTH;
use crate::ESCAPE;
use crate::ErrorContext;
use crate::HotkeyModel;
use crate::HtkError;
use crate::HtkResult;
use crate::LITERAL_MAX;
use crate::LITERAL_MIN;
use crate::ParsedHotkeyRecord;
use crate::normalize_to_crlf;

const HEX_DIGITS: &[u8; 16] = b"0123456789ABCDEF";

/// Encode script text into a single unwrapped token stream.
pub fn encode_script_text(script_text: &str) -> String {
	let normalized = normalize_to_crlf(script_text);
	encode_bytes(normalized.as_bytes())
}

/// Encode raw bytes into a token stream.
pub fn encode_bytes(bytes: &[u8]) -> String {
	let mut encoded = String::with_capacity(bytes.len());

	for &byte in bytes {
		if (LITERAL_MIN..=LITERAL_MAX).contains(&byte) {
			encoded.push(char::from(byte));
		} else {
			encoded.push(ESCAPE);
			encoded.push(char::from(HEX_DIGITS[usize::from(byte >> 4)]));
			encoded.push(char::from(HEX_DIGITS[usize::from(byte & 0x0F)]));
		}
	}

	encoded
}

/// Byte length of `script_text` once normalized to CRLF.
pub fn script_byte_length(script_text: &str) -> usize {
	normalize_to_crlf(script_text).len()
}

/// Split an encoded stream into lines of `line_width` characters, extending
/// a line by one or two characters when the break would fall inside a
/// `~XX` token. An empty stream yields a single empty line.
pub fn wrap_encoded(encoded: &str, line_width: usize) -> Vec<&str> {
	if encoded.is_empty() {
		return vec![""];
	}

	let width = line_width.max(1);
	let bytes = encoded.as_bytes();
	let len = bytes.len();
	let mut lines = Vec::with_capacity(len / width + 1);
	let mut index = 0;

	while index < len {
		let mut end = (index + width).min(len);

		if end < len {
			if bytes[end - 1] == b'~' {
				end = (end + 2).min(len);
			} else if end >= index + 2 && bytes[end - 2] == b'~' && bytes[end - 1].is_ascii_hexdigit()
			{
				end = (end + 1).min(len);
			}
		}

		// Tokens are ASCII so every boundary is a char boundary.
		lines.push(&encoded[index..end]);
		index = end;
	}

	lines
}

/// Render one compiled hotkey as CRLF-joined record lines.
pub fn render_hotkey_record(hotkey: &HotkeyModel) -> HtkResult<String> {
	ensure_header_renderable(hotkey)?;

	let encoded = encode_script_text(&hotkey.script_text);
	let chunks = wrap_encoded(&encoded, ENCODED_LINE_WIDTH);
	let prefix = format!("{}:{}:~ {}:", hotkey.key, hotkey.label, hotkey.script_length);

	let mut lines = Vec::with_capacity(chunks.len());
	for (index, chunk) in chunks.iter().enumerate() {
		if index == 0 {
			lines.push(format!("{prefix}{chunk}"));
		} else {
			lines.push((*chunk).to_string());
		}
	}

	Ok(lines.join(CRLF))
}

/// Render every hotkey, joined by CRLF with no trailing line break.
pub fn render_hotkeys(hotkeys: &[HotkeyModel]) -> HtkResult<String> {
	let records = hotkeys
		.iter()
		.map(render_hotkey_record)
		.collect::<HtkResult<Vec<_>>>()?;

	Ok(records.join(CRLF))
}

fn ensure_header_renderable(hotkey: &HotkeyModel) -> HtkResult<()> {
	let bad_key = hotkey
		.key
		.chars()
		.any(|c| c == ':' || c.is_whitespace());
	let bad_label = hotkey
		.label
		.chars()
		.any(|c| c == ':' || c == '\r' || c == '\n');

	if !bad_key && !bad_label {
		return Ok(());
	}

	let details = if bad_key {
		format!(
			"Key `{}` cannot contain `:`, whitespace, or line breaks.",
			hotkey.key
		)
	} else {
		format!(
			"Label `{}` cannot contain `:` or line breaks.",
			hotkey.label
		)
	};

	Err(
		HtkError::template_render("Hotkey record header cannot be rendered.")
			.with_details(details)
			.with_context(
				ErrorContext::source(&hotkey.source_path)
					.with_id(&hotkey.id)
					.with_key(&hotkey.key)
					.with_label(&hotkey.label),
			),
	)
}

/// Details of a record whose decoded byte count disagrees with its header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LengthMismatch {
	pub record_index: usize,
	pub line: usize,
	pub key: String,
	pub label: String,
	pub declared_length: usize,
	pub decoded_length: usize,
	pub source_path: PathBuf,
}

/// How the decoder treats a header length that disagrees with the body.
pub enum LengthPolicy<'a> {
	/// Fail with an `ImportDecode` error.
	Strict,
	/// Report the mismatch and keep the decoded content.
	Lenient(&'a mut dyn FnMut(&LengthMismatch)),
}

impl std::fmt::Debug for LengthPolicy<'_> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::Strict => f.write_str("Strict"),
			Self::Lenient(_) => f.write_str("Lenient"),
		}
	}
}

/// Decode one parsed record back into CRLF-normalized script text.
pub fn decode_hotkey_record(
	record: &ParsedHotkeyRecord,
	policy: &mut LengthPolicy<'_>,
) -> HtkResult<DecodedHotkeyRecord> {
	if record.encoded_body.is_empty() {
		return Err(decode_error(
			record,
			"Hotkey record has an empty script body.",
			"Encoded script content is missing.",
		));
	}

	let bytes = decode_to_bytes(record)?;

	if record.script_length > 0 && bytes.len() != record.script_length {
		match policy {
			LengthPolicy::Strict => {
				return Err(decode_error(
					record,
					"Hotkey record script length does not match the header token.",
					format!(
						"Expected {} bytes, got {}.",
						record.script_length,
						bytes.len()
					),
				));
			}
			LengthPolicy::Lenient(on_mismatch) => {
				on_mismatch(&LengthMismatch {
					record_index: record.index,
					line: record.line,
					key: record.key.clone(),
					label: record.label.clone(),
					declared_length: record.script_length,
					decoded_length: bytes.len(),
					source_path: record.source_path.clone(),
				});
			}
		}
	}

	if bytes.is_empty() {
		return Err(decode_error(
			record,
			"Hotkey record has an empty script body.",
			"Decoded script content is empty.",
		));
	}

	ensure_crlf_sequences(&bytes, record)?;

	let decoded_length = bytes.len();
	let text = String::from_utf8(bytes).map_err(|e| {
		decode_error(
			record,
			"Hotkey record contains invalid UTF-8.",
			e.to_string(),
		)
	})?;

	Ok(DecodedHotkeyRecord {
		index: record.index,
		line: record.line,
		key: record.key.clone(),
		label: record.label.clone(),
		script_length: decoded_length,
		script_text: normalize_to_crlf(&text),
	})
}

fn decode_to_bytes(record: &ParsedHotkeyRecord) -> HtkResult<Vec<u8>> {
	let mut bytes = Vec::with_capacity(record.encoded_body.len());
	let mut chars = record.encoded_body.chars();

	while let Some(c) = chars.next() {
		if c == ESCAPE {
			let token: String = chars.clone().take(2).collect();
			let value = parse_hex_pair(&token).ok_or_else(|| {
				decode_error(
					record,
					"Hotkey record contains an invalid encoding token.",
					format!("Token \"~{token}\" is not a valid hex sequence."),
				)
			})?;
			chars.nth(1);
			bytes.push(value);
		} else if c.is_ascii() {
			bytes.push(c as u8);
		} else {
			return Err(decode_error(
				record,
				"Hotkey record contains a character outside the encoded range.",
				format!("Character {c:?} (U+{:04X}) must be written as ~XX tokens.", u32::from(c)),
			));
		}
	}

	Ok(bytes)
}

fn parse_hex_pair(token: &str) -> Option<u8> {
	if token.len() != 2 || !token.bytes().all(|b| b.is_ascii_hexdigit()) {
		return None;
	}

	u8::from_str_radix(token, 16).ok()
}

fn ensure_crlf_sequences(bytes: &[u8], record: &ParsedHotkeyRecord) -> HtkResult<()> {
	let mut index = 0;
	while index < bytes.len() {
		match bytes[index] {
			b'\r' => {
				if bytes.get(index + 1) != Some(&b'\n') {
					return Err(decode_error(
						record,
						"Hotkey record contains an invalid line ending.",
						"Expected CRLF (0D0A) newline encoding.",
					));
				}
				index += 2;
			}
			b'\n' => {
				return Err(decode_error(
					record,
					"Hotkey record contains an invalid line ending.",
					"Unexpected LF (0A) without a preceding CR (0D).",
				));
			}
			_ => index += 1,
		}
	}

	Ok(())
}

fn decode_error(
	record: &ParsedHotkeyRecord,
	message: &str,
	details: impl Into<String>,
) -> HtkError {
	HtkError::import_decode(message)
		.with_details(details)
		.with_context(
			ErrorContext::record(record.index, record.line)
				.with_key(&record.key)
				.with_label(&record.label)
				.with_source_path(&record.source_path),
		)
}
