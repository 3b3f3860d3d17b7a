#![allow(dead_code)]

use std::path::Path;
use std::path::PathBuf;

use assert_cmd::Command;
use insta_cmd::get_cargo_bin;

pub const KEYMAP: &str = "- id: buy
  key: Ctrl+B
  label: Buy
  scriptPath: hotkeys/buy.das
- id: sell
  key: Ctrl+S
  label: Sell
  scriptPath: hotkeys/sell.das
";

/// What the [`KEYMAP`] workspace compiles to.
pub const HOTKEY_FILE: &str =
	"Ctrl+B:Buy:~ 10:CXL ALL~0D~0AB\r\nCtrl+S:Sell:~ 10:CXL ALL~0D~0AS";

pub fn htk_cmd() -> Command {
	let mut cmd = Command::new(get_cargo_bin("htk"));
	cmd.env("NO_COLOR", "1");
	cmd.env_remove("HTK_LOG");
	cmd
}

pub fn write_file(root: &Path, relative: &str, content: &str) -> std::io::Result<PathBuf> {
	let path = root.join(relative);
	if let Some(parent) = path.parent() {
		std::fs::create_dir_all(parent)?;
	}
	std::fs::write(&path, content)?;
	Ok(path)
}

/// A buildable workspace with two scripts and an `htk.toml` pointing the
/// output at `build/Hotkey.htk`.
pub fn write_workspace(root: &Path) -> std::io::Result<()> {
	write_file(root, "keymap.yaml", KEYMAP)?;
	write_file(root, "hotkeys/buy.das", "CXL ALL\nB")?;
	write_file(root, "hotkeys/sell.das", "CXL ALL\nS")?;
	write_file(root, "htk.toml", "output = \"build/Hotkey.htk\"\n")?;
	Ok(())
}
