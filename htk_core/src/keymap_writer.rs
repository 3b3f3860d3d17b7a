use std::fmt::Write as _;

use serde_yaml_ng::Value;

use crate::NamedHotkeyRecord;
use crate::extract_group;

/// A `keymap.yaml` row produced by import.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportKeymapEntry {
	pub id: String,
	pub key: String,
	pub label: String,
	pub script_path: String,
	/// From the first `// Group: <name>` line of the script.
	pub group: Option<String>,
}

/// Build keymap rows in record order.
pub fn build_keymap_entries(records: &[NamedHotkeyRecord]) -> Vec<ImportKeymapEntry> {
	records
		.iter()
		.map(|named| {
			ImportKeymapEntry {
				id: named.id.clone(),
				key: named.record.key.clone(),
				label: named.record.label.clone(),
				script_path: named.script_path.clone(),
				group: extract_group(&named.record.script_text),
			}
		})
		.collect()
}

/// Render entries as a YAML list, with a `# <group>` heading before each run
/// of consecutive entries sharing a group. Lines are joined with `\n`.
pub fn render_keymap_yaml(entries: &[ImportKeymapEntry]) -> String {
	let mut lines: Vec<String> = Vec::with_capacity(entries.len() * 4);
	let mut current_group: Option<&str> = None;

	for entry in entries {
		match entry.group.as_deref() {
			None => current_group = None,
			Some(group) if current_group != Some(group) => {
				if !lines.is_empty() {
					lines.push(String::new());
				}
				lines.push(format!("# {group}"));
				current_group = Some(group);
			}
			Some(_) => {}
		}

		lines.push(format!("- id: {}", format_yaml_string(&entry.id)));
		lines.push(format!("  key: {}", format_yaml_string(&entry.key)));
		lines.push(format!("  label: {}", format_yaml_string(&entry.label)));
		lines.push(format!("  scriptPath: {}", format_yaml_string(&entry.script_path)));
	}

	lines.join("\n")
}

const QUOTE_TRIGGERS: &[char] = &[
	':', '#', '-', '\n', '\r', '\t', '[', ']', '{', '}', ',', '&', '*', '!', '|', '>', '\'', '"',
	'%', '@', '`', '\\',
];

/// A YAML scalar for `value`, double-quoted unless the plain form is
/// guaranteed to read back as the same string.
pub fn format_yaml_string(value: &str) -> String {
	if needs_quotes(value) {
		quote(value)
	} else {
		value.to_string()
	}
}

fn needs_quotes(value: &str) -> bool {
	if value.is_empty()
		|| value.starts_with(char::is_whitespace)
		|| value.ends_with(char::is_whitespace)
		|| value.contains(QUOTE_TRIGGERS)
		|| value.chars().any(char::is_control)
	{
		return true;
	}

	// Plain scalars such as `true`, `null`, or `42` resolve to other types.
	!matches!(
		serde_yaml_ng::from_str::<Value>(value),
		Ok(Value::String(ref parsed)) if parsed == value
	)
}

fn quote(value: &str) -> String {
	let mut quoted = String::with_capacity(value.len() + 2);
	quoted.push('"');
	for c in value.chars() {
		match c {
			'\\' => quoted.push_str("\\\\"),
			'"' => quoted.push_str("\\\""),
			'\n' => quoted.push_str("\\n"),
			'\r' => quoted.push_str("\\r"),
			'\t' => quoted.push_str("\\t"),
			c if c.is_control() => {
				let _ = write!(quoted, "\\u{:04X}", u32::from(c));
			}
			c => quoted.push(c),
		}
	}
	quoted.push('"');
	quoted
}
