use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::path::PathBuf;

use crate::ErrorContext;
use crate::HtkError;
use crate::HtkResult;
use crate::KeymapEntry;
use crate::script_byte_length;

/// One compiled hotkey record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HotkeyModel {
	pub id: String,
	pub key: String,
	pub label: String,
	/// Script text after placeholder substitution, `\n` line endings.
	pub script_text: String,
	pub source_path: PathBuf,
	/// Byte length of the CRLF-normalized script text.
	pub script_length: usize,
}

/// Stable codes for non-fatal compile findings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WarningCode {
	OptionalConfig,
	UnreferencedScript,
	MissingPlaceholderSetting,
}

impl WarningCode {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::OptionalConfig => "OPTIONAL_CONFIG",
			Self::UnreferencedScript => "UNREFERENCED_SCRIPT",
			Self::MissingPlaceholderSetting => "MISSING_PLACEHOLDER_SETTING",
		}
	}
}

impl fmt::Display for WarningCode {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// A non-fatal finding from a compile run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileWarning {
	pub code: WarningCode,
	pub message: String,
	pub source_path: Option<PathBuf>,
	pub id: Option<String>,
	pub key: Option<String>,
}

impl CompileWarning {
	pub fn new(code: WarningCode, message: impl Into<String>) -> Self {
		Self {
			code,
			message: message.into(),
			source_path: None,
			id: None,
			key: None,
		}
	}

	#[must_use]
	pub fn with_source_path(mut self, path: impl AsRef<Path>) -> Self {
		self.source_path = Some(path.as_ref().to_path_buf());
		self
	}
}

impl fmt::Display for CompileWarning {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "[{}] {}", self.code, self.message)
	}
}

/// Reject blank scripts and scripts that were not valid UTF-8 on disk.
pub fn validate_script_content(content: &str, source_path: &Path) -> HtkResult<()> {
	if content.trim().is_empty() {
		return Err(
			HtkError::validation("Script content is empty.")
				.with_details(source_path.display().to_string())
				.with_context(ErrorContext::source(source_path)),
		);
	}

	if content.contains(char::REPLACEMENT_CHARACTER) {
		return Err(
			HtkError::validation("Script content contains invalid UTF-8.")
				.with_details(source_path.display().to_string())
				.with_context(ErrorContext::source(source_path)),
		);
	}

	Ok(())
}

/// Fail when two entries share an id, or two non-empty keys collide after
/// trimming.
pub fn ensure_unique_entries(entries: &[KeymapEntry]) -> HtkResult<()> {
	let duplicate_ids = find_duplicates(entries.iter().map(|entry| entry.id.as_str()), false);
	if !duplicate_ids.is_empty() {
		return Err(
			HtkError::keymap("Duplicate hotkey ids detected in keymap.yaml.")
				.with_details(format!("Duplicate ids: {}.", duplicate_ids.join(", "))),
		);
	}

	let duplicate_keys = find_duplicates(entries.iter().map(|entry| entry.key.as_str()), true);
	if !duplicate_keys.is_empty() {
		return Err(
			HtkError::keymap("Duplicate key combinations detected in keymap.yaml.")
				.with_details(format!("Duplicate keys: {}.", duplicate_keys.join(", "))),
		);
	}

	Ok(())
}

/// Values occurring more than once, in first-seen order.
fn find_duplicates<'a>(values: impl Iterator<Item = &'a str>, ignore_empty: bool) -> Vec<&'a str> {
	let mut counts: Vec<(&str, usize)> = Vec::new();
	for value in values {
		let normalized = value.trim();
		if ignore_empty && normalized.is_empty() {
			continue;
		}

		match counts.iter_mut().find(|(seen, _)| *seen == normalized) {
			Some((_, count)) => *count += 1,
			None => counts.push((normalized, 1)),
		}
	}

	counts
		.into_iter()
		.filter(|(_, count)| *count > 1)
		.map(|(value, _)| value)
		.collect()
}

/// Build one model per entry from the substituted script contents.
pub fn build_hotkey_models(
	entries: &[KeymapEntry],
	script_contents: &HashMap<PathBuf, String>,
) -> HtkResult<Vec<HotkeyModel>> {
	entries
		.iter()
		.map(|entry| {
			let script_text = script_contents
				.get(&entry.script_path)
				.cloned()
				.unwrap_or_default();
			validate_script_content(&script_text, &entry.script_path)?;
			let script_length = script_byte_length(&script_text);

			Ok(HotkeyModel {
				id: entry.id.clone(),
				key: entry.key.clone(),
				label: entry.label.clone(),
				script_text,
				source_path: entry.script_path.clone(),
				script_length,
			})
		})
		.collect()
}

/// Order models by keymap position, tie-broken by id.
pub fn aggregate_hotkeys(hotkeys: Vec<HotkeyModel>) -> Vec<HotkeyModel> {
	let mut indexed = hotkeys.into_iter().enumerate().collect::<Vec<_>>();
	indexed.sort_by(|(a_index, a), (b_index, b)| a_index.cmp(b_index).then_with(|| a.id.cmp(&b.id)));

	indexed.into_iter().map(|(_, hotkey)| hotkey).collect()
}
