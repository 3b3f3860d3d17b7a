use std::path::PathBuf;

use clap::Args;
use clap::Parser;
use clap::Subcommand;
use clap::ValueEnum;
use htk_core::ConflictStrategy;

#[derive(Parser)]
#[command(
	author,
	version,
	about = "Compile hotkey script workspaces into Hotkey.htk files and import them back.",
	long_about = "htk keeps trading-terminal hotkeys as a workspace of plain scripts plus a \
	              keymap.yaml, and converts that workspace to and from the single Hotkey.htk \
	              file the terminal loads.\n\nQuick start:\n  htk init            Create a \
	              sample workspace\n  htk build           Compile the workspace into \
	              Hotkey.htk\n  htk import <FILE>   Recover a workspace from Hotkey.htk\n  htk \
	              verify <FILE>   Check that the workspace rebuilds the file exactly\n  htk info \
	                        Inspect the workspace"
)]
pub struct HtkCli {
	#[command(subcommand)]
	pub command: Option<Commands>,

	/// Path to the workspace root directory.
	#[arg(long, short, global = true)]
	pub path: Option<PathBuf>,

	/// Enable verbose output.
	#[arg(long, short, global = true, default_value_t = false)]
	pub verbose: bool,

	/// Disable colored output.
	#[arg(long, global = true, default_value_t = false)]
	pub no_color: bool,
}

#[derive(Subcommand)]
pub enum Commands {
	/// Initialize a workspace with a sample keymap, script, and config.
	///
	/// Creates `keymap.yaml`, `hotkeys/example.das`, and `htk.toml` in the
	/// workspace root. Existing files are left untouched.
	Init,
	/// Compile the workspace into a single `Hotkey.htk` file.
	///
	/// Reads `keymap.yaml`, loads every referenced `.das` script, substitutes
	/// account placeholders, and writes the encoded records to the output
	/// path from `htk.toml` or `--output`.
	Build(BuildArgs),
	/// Recover a workspace from an existing `Hotkey.htk` file.
	///
	/// Decodes every record into `hotkeys/<name>.das` and writes a matching
	/// `keymap.yaml` into the workspace root. The write is all or nothing.
	Import(ImportArgs),
	/// Check that the workspace rebuilds a `Hotkey.htk` file byte for byte.
	///
	/// Exits with a non-zero status code when the rebuilt file differs.
	Verify {
		/// The `Hotkey.htk` file to compare against.
		source: PathBuf,

		/// Show a line diff between the original and the rebuilt file.
		#[arg(long, default_value_t = false)]
		diff: bool,
	},
	/// Print a summary of the workspace.
	///
	/// Shows the resolved config file, output path, discovered scripts,
	/// keymap entries, ignored scripts, and placeholder settings.
	Info {
		/// Output format for info results.
		#[arg(long, value_enum, default_value_t = OutputFormat::Text)]
		format: OutputFormat,
	},
}

#[derive(Debug, Clone, Args)]
#[allow(clippy::struct_excessive_bools)]
pub struct BuildArgs {
	/// Output path, overriding `output` in `htk.toml`.
	#[arg(long, short)]
	pub output: Option<PathBuf>,

	/// Overwrite an existing output file without asking.
	#[arg(long, default_value_t = false)]
	pub force: bool,

	/// Fail when a script uses an account placeholder with no configured
	/// value.
	#[arg(long, default_value_t = false)]
	pub strict_placeholders: bool,

	/// Value substituted for `%%LIVE%%`.
	#[arg(long)]
	pub live_account: Option<String>,

	/// Value substituted for `%%SIMULATED%%`.
	#[arg(long)]
	pub simulated_account: Option<String>,

	/// Insert a `YYYYMMDD-HHMMSS` timestamp into the output file name.
	#[arg(long, default_value_t = false)]
	pub timestamp: bool,

	/// Output format for build results.
	#[arg(long, value_enum, default_value_t = OutputFormat::Text)]
	pub format: OutputFormat,

	/// Watch the workspace and rebuild on changes. Implies `--force`.
	#[arg(long, default_value_t = false)]
	pub watch: bool,
}

#[derive(Debug, Clone, Args)]
pub struct ImportArgs {
	/// The `Hotkey.htk` file to import.
	pub source: PathBuf,

	/// What to do when destination files already exist. When omitted the
	/// conflicts are listed and you are asked.
	#[arg(long, value_enum)]
	pub on_conflict: Option<ConflictChoice>,

	/// Treat a header length that disagrees with the decoded script as an
	/// error instead of a warning.
	#[arg(long, default_value_t = false)]
	pub strict_length: bool,

	/// Rebuild the imported workspace and compare it with the source file.
	#[arg(long, default_value_t = false)]
	pub verify: bool,

	/// Output format for import results.
	#[arg(long, value_enum, default_value_t = OutputFormat::Text)]
	pub format: OutputFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
	/// Human-readable text output with colors and formatting.
	Text,
	/// JSON output for programmatic consumption.
	Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ConflictChoice {
	/// Replace existing scripts and `keymap.yaml`.
	Overwrite,
	/// Keep existing scripts. Fails when `keymap.yaml` exists.
	Skip,
	/// Abort when anything would be overwritten.
	Cancel,
}

impl From<ConflictChoice> for ConflictStrategy {
	fn from(choice: ConflictChoice) -> Self {
		match choice {
			ConflictChoice::Overwrite => Self::Overwrite,
			ConflictChoice::Skip => Self::Skip,
			ConflictChoice::Cancel => Self::Cancel,
		}
	}
}
