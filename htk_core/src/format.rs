//! Grammar constants for the `Hotkey.htk` wire format and the workspace
//! layout it round-trips with.

/// Record and line separator in `Hotkey.htk` and every file this tool writes.
pub const CRLF: &str = "\r\n";

/// Escape introducer for a two-digit hex token (`~0D`, `~7E`, ...).
pub const ESCAPE: char = '~';

/// Encoded form of a CRLF pair inside a script body.
pub const NEWLINE_TOKEN: &str = "~0D~0A";

/// Characters per wrapped body line before token-safe extension.
pub const ENCODED_LINE_WIDTH: usize = 51;

/// Lowest byte written literally.
pub const LITERAL_MIN: u8 = 0x20;

/// Highest byte written literally. `~` (0x7E) is always escaped.
pub const LITERAL_MAX: u8 = 0x7D;

/// Mapping document at the workspace root.
pub const KEYMAP_FILE_NAME: &str = "keymap.yaml";

/// Script file extension, compared case-insensitively.
pub const SCRIPT_EXTENSION: &str = "das";

/// Directory (relative to the destination root) that imported scripts land in.
pub const SCRIPTS_DIR: &str = "hotkeys";

/// File-name prefix of platform metadata files (AppleDouble) skipped on discovery.
pub const JUNK_FILE_PREFIX: &str = "._";

/// Directory names never descended into during discovery.
pub const DEFAULT_IGNORED_DIRS: [&str; 8] = [
	".git",
	".specify",
	".vscode",
	".vscode-test",
	"node_modules",
	"out",
	"dist",
	"build",
];

/// Whether `value` is a key combination such as `Ctrl+Shift+B` or `F1`.
///
/// A combo is one or more alphanumeric segments joined by `+`, and must
/// contain at least one uppercase letter or digit.
pub fn is_valid_key_combo(value: &str) -> bool {
	if value.is_empty() {
		return false;
	}

	let segments_ok = value
		.split('+')
		.all(|segment| !segment.is_empty() && segment.chars().all(|c| c.is_ascii_alphanumeric()));

	segments_ok
		&& value
			.chars()
			.any(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
}

/// Normalize every line-ending variant (`\r\n`, `\r`, `\n`) to `\n`.
pub fn normalize_to_lf(content: &str) -> String {
	if content.contains('\r') {
		content.replace("\r\n", "\n").replace('\r', "\n")
	} else {
		content.to_string()
	}
}

/// Normalize every line-ending variant to CRLF.
pub fn normalize_to_crlf(content: &str) -> String {
	normalize_to_lf(content).replace('\n', CRLF)
}
