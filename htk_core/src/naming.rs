use std::collections::HashMap;
use std::collections::HashSet;

use crate::ErrorContext;
use crate::HtkError;
use crate::HtkResult;
use crate::SCRIPT_EXTENSION;
use crate::SCRIPTS_DIR;

/// An imported record with its script bytes recovered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedHotkeyRecord {
	pub index: usize,
	pub line: usize,
	pub key: String,
	pub label: String,
	/// Number of decoded bytes.
	pub script_length: usize,
	/// CRLF-normalized script text.
	pub script_text: String,
}

/// A decoded record with the identity it will have in the workspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedHotkeyRecord {
	pub record: DecodedHotkeyRecord,
	pub id: String,
	/// `<base>.das`
	pub file_name: String,
	/// Forward-slash path relative to the destination root, e.g.
	/// `hotkeys/buy.das`.
	pub script_path: String,
}

/// Lowercase `value`, collapsing every run of non-alphanumeric characters
/// into a single `_` and trimming underscores from both ends.
pub fn sanitize_name(value: &str) -> String {
	let mut sanitized = String::with_capacity(value.len());
	let mut pending_separator = false;

	for c in value.trim().chars() {
		if c.is_ascii_alphanumeric() {
			if pending_separator && !sanitized.is_empty() {
				sanitized.push('_');
			}
			pending_separator = false;
			sanitized.push(c.to_ascii_lowercase());
		} else {
			pending_separator = true;
		}
	}

	sanitized
}

/// Hands out `base`, `base_2`, `base_3`, ... per base, never repeating an
/// issued name.
#[derive(Debug, Default)]
struct UniqueNames {
	counts: HashMap<String, usize>,
	issued: HashSet<String>,
}

impl UniqueNames {
	fn issue(&mut self, base: &str) -> String {
		let count = self.counts.entry(base.to_string()).or_insert(0);
		loop {
			*count += 1;
			let candidate = if *count == 1 {
				base.to_string()
			} else {
				format!("{base}_{count}")
			};

			if self.issued.insert(candidate.clone()) {
				return candidate;
			}
		}
	}
}

/// Derive deterministic, unique ids and file names in record order.
pub fn assign_names(records: Vec<DecodedHotkeyRecord>) -> HtkResult<Vec<NamedHotkeyRecord>> {
	let mut ids = UniqueNames::default();
	let mut files = UniqueNames::default();

	records
		.into_iter()
		.map(|record| {
			let id_base = first_non_empty(&[record.label.as_str(), record.key.as_str()]);
			let Some(id_base) = id_base else {
				return Err(naming_error(
					&record,
					"Unable to generate a hotkey id for this record.",
					"Label and key could not be sanitized into a valid id.",
				));
			};
			let id = ids.issue(&id_base);

			let Some(file_base) = first_non_empty(&[id.as_str(), record.key.as_str(), record.label.as_str()]) else {
				return Err(naming_error(
					&record,
					"Unable to generate a filename for this record.",
					"Label and key could not be sanitized into a valid filename.",
				));
			};
			let file_name = format!("{}.{SCRIPT_EXTENSION}", files.issue(&file_base));
			let script_path = format!("{SCRIPTS_DIR}/{file_name}");

			Ok(NamedHotkeyRecord {
				record,
				id,
				file_name,
				script_path,
			})
		})
		.collect()
}

fn first_non_empty(values: &[&str]) -> Option<String> {
	values
		.iter()
		.map(|value| sanitize_name(value))
		.find(|value| !value.is_empty())
}

fn naming_error(record: &DecodedHotkeyRecord, message: &str, details: &str) -> HtkError {
	HtkError::import_naming(message)
		.with_details(details)
		.with_context(
			ErrorContext::record(record.index, record.line)
				.with_key(&record.key)
				.with_label(&record.label),
		)
}
