use std::path::Path;
use std::path::PathBuf;

use tempfile::TempDir;

use crate::DecodedHotkeyRecord;
use crate::NamedHotkeyRecord;
use crate::ParsedHotkeyRecord;
use crate::assign_names;

pub(crate) const SCENARIO_KEYMAP: &str = "- id: buy
  key: Ctrl+B
  label: Buy
  scriptPath: hotkeys/buy.das
- id: sell
  key: Ctrl+S
  label: Sell
  scriptPath: hotkeys/sell.das
";

/// Two 10-byte scripts compile to this exact file.
pub(crate) const SCENARIO_HTK: &str = "Ctrl+B:Buy:~ 10:CXL ALL~0D~0AB\r\nCtrl+S:Sell:~ 10:CXL ALL~0D~0AS";

pub(crate) fn tempdir() -> TempDir {
	tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {e}"))
}

pub(crate) fn write_file(root: &Path, relative: &str, content: &str) -> PathBuf {
	let path = root.join(relative);
	if let Some(parent) = path.parent() {
		std::fs::create_dir_all(parent).unwrap_or_else(|e| panic!("create_dir_all: {e}"));
	}
	std::fs::write(&path, content).unwrap_or_else(|e| panic!("write {}: {e}", path.display()));
	path
}

pub(crate) fn read_file(path: &Path) -> String {
	std::fs::read_to_string(path).unwrap_or_else(|e| panic!("read {}: {e}", path.display()))
}

/// A workspace with `keymap.yaml`, `hotkeys/buy.das`, and `hotkeys/sell.das`.
pub(crate) fn scenario_workspace() -> TempDir {
	let tmp = tempdir();
	write_file(tmp.path(), "keymap.yaml", SCENARIO_KEYMAP);
	write_file(tmp.path(), "hotkeys/buy.das", "CXL ALL\nB");
	write_file(tmp.path(), "hotkeys/sell.das", "CXL ALL\nS");
	tmp
}

/// Sorted file names directly inside `dir`.
pub(crate) fn list_dir(dir: &Path) -> Vec<String> {
	let mut names = std::fs::read_dir(dir)
		.unwrap_or_else(|e| panic!("read_dir {}: {e}", dir.display()))
		.filter_map(Result::ok)
		.map(|entry| entry.file_name().to_string_lossy().into_owned())
		.collect::<Vec<_>>();
	names.sort();
	names
}

pub(crate) fn parsed_record(key: &str, label: &str, script_length: usize, body: &str) -> ParsedHotkeyRecord {
	ParsedHotkeyRecord {
		index: 1,
		line: 1,
		key: key.to_string(),
		label: label.to_string(),
		script_length,
		encoded_body: body.to_string(),
		source_path: PathBuf::from("Hotkey.htk"),
		legacy_inline: false,
	}
}

pub(crate) fn decoded_record(index: usize, key: &str, label: &str, script_text: &str) -> DecodedHotkeyRecord {
	DecodedHotkeyRecord {
		index,
		line: index,
		key: key.to_string(),
		label: label.to_string(),
		script_length: script_text.len(),
		script_text: script_text.to_string(),
	}
}

/// Named records for `(key, label, script)` triples in order.
pub(crate) fn named_records(rows: &[(&str, &str, &str)]) -> Vec<NamedHotkeyRecord> {
	let decoded = rows
		.iter()
		.enumerate()
		.map(|(index, (key, label, text))| decoded_record(index + 1, key, label, text))
		.collect();

	assign_names(decoded).unwrap_or_else(|e| panic!("assign_names: {e}"))
}
