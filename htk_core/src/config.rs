use std::path::Path;
use std::path::PathBuf;

use chrono::NaiveDateTime;
use serde::Deserialize;

use crate::CompileOptions;
use crate::DiscoveryOptions;
use crate::ErrorContext;
use crate::HtkError;
use crate::HtkResult;
use crate::PlaceholderValues;

/// Default maximum script size in bytes (10 MB).
pub const DEFAULT_MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// Default ceiling on the number of scripts a workspace may contain.
pub const DEFAULT_MAX_FILES: usize = 5000;

/// Supported config file locations in discovery order (highest precedence
/// first).
pub const CONFIG_FILE_CANDIDATES: [&str; 3] = ["htk.toml", ".htk.toml", ".config/htk.toml"];

/// Configuration loaded from an `htk.toml` file.
///
/// ```toml
/// output = "build/Hotkey.htk"
/// append_timestamp = false
/// fail_on_missing_placeholders = false
/// max_files = 5000
/// max_file_size = 10485760
///
/// [accounts]
/// live = "U1234567"
/// simulated = "TRPAPER1"
///
/// [exclude]
/// dirs = ["archive"]
/// patterns = ["drafts/", "*.old.das"]
///
/// [import]
/// strict_length = false
/// ```
#[derive(Debug, Deserialize)]
pub struct HtkConfig {
	/// Output path of the compiled `Hotkey.htk`, relative to the workspace root
	/// unless absolute.
	#[serde(default)]
	pub output: Option<PathBuf>,
	/// Insert a local `YYYYMMDD-HHMMSS` timestamp before the output extension.
	#[serde(default)]
	pub append_timestamp: bool,
	/// Fail the build when a script uses an account placeholder that has no
	/// configured value.
	#[serde(default)]
	pub fail_on_missing_placeholders: bool,
	/// Maximum number of `.das` scripts discovery accepts.
	#[serde(default = "default_max_files")]
	pub max_files: usize,
	/// Maximum size in bytes of a single script.
	#[serde(default = "default_max_file_size")]
	pub max_file_size: u64,
	/// Account identifiers substituted for `%%LIVE%%` and `%%SIMULATED%%`.
	#[serde(default)]
	pub accounts: AccountsConfig,
	/// Extra exclusions applied on top of the built-in housekeeping
	/// directories.
	#[serde(default)]
	pub exclude: ExcludeConfig,
	#[serde(default)]
	pub import: ImportConfig,
}

/// Account values for placeholder substitution. Blank strings count as unset.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AccountsConfig {
	#[serde(default)]
	pub live: Option<String>,
	#[serde(default)]
	pub simulated: Option<String>,
}

/// Exclusion configuration for workspace discovery.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExcludeConfig {
	/// Additional directory names skipped anywhere in the tree.
	#[serde(default)]
	pub dirs: Vec<String>,
	/// Gitignore-style patterns, relative to the workspace root.
	#[serde(default)]
	pub patterns: Vec<String>,
}

/// Defaults for `htk import`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ImportConfig {
	/// Treat a header length token that disagrees with the decoded byte count
	/// as an error instead of a warning.
	#[serde(default)]
	pub strict_length: bool,
}

fn default_max_files() -> usize {
	DEFAULT_MAX_FILES
}

fn default_max_file_size() -> u64 {
	DEFAULT_MAX_FILE_SIZE
}

impl HtkConfig {
	/// Resolve the config path from known discovery candidates.
	#[must_use]
	pub fn resolve_path(root: &Path) -> Option<PathBuf> {
		CONFIG_FILE_CANDIDATES
			.iter()
			.map(|candidate| root.join(candidate))
			.find(|path| path.is_file())
	}

	/// Load the config from the first discovered config file at `root`.
	/// Returns `None` if no config file exists.
	pub fn load(root: &Path) -> HtkResult<Option<HtkConfig>> {
		let Some(config_path) = Self::resolve_path(root) else {
			return Ok(None);
		};

		let content = std::fs::read_to_string(&config_path).map_err(|e| {
			HtkError::configuration("Unable to read htk.toml.")
				.with_details(format!("{}: {e}", config_path.display()))
				.with_context(ErrorContext::source(&config_path))
		})?;
		let config: HtkConfig = toml::from_str(&content).map_err(|e| {
			HtkError::configuration("htk.toml could not be parsed.")
				.with_details(e.to_string())
				.with_context(ErrorContext::source(&config_path))
		})?;

		Ok(Some(config))
	}
}

/// Values supplied on the command line that take precedence over `htk.toml`.
#[derive(Debug, Clone, Default)]
#[allow(clippy::struct_excessive_bools)]
pub struct SettingsOverrides {
	pub output: Option<PathBuf>,
	pub live_account: Option<String>,
	pub simulated_account: Option<String>,
	/// Forces strict placeholder checking on; never turns it off.
	pub fail_on_missing_placeholders: bool,
	/// Forces strict length checking on import; never turns it off.
	pub strict_length: bool,
	/// Forces a timestamped output path; never turns it off.
	pub append_timestamp: bool,
}

/// Resolved settings for one pipeline run.
///
/// Built once by the caller and passed by value into the pipelines, so that
/// nothing inside `htk_core` reads ambient configuration.
#[derive(Debug, Clone)]
pub struct Settings {
	pub workspace_root: PathBuf,
	/// Absolute output path before any timestamp is applied.
	pub output_path: Option<PathBuf>,
	pub append_timestamp: bool,
	pub placeholder_values: PlaceholderValues,
	pub fail_on_missing_placeholders: bool,
	pub strict_length: bool,
	pub discovery: DiscoveryOptions,
}

impl Settings {
	/// Load `htk.toml` (if any) from `root` and merge the overrides.
	pub fn load(root: &Path, overrides: SettingsOverrides) -> HtkResult<Self> {
		let config = HtkConfig::load(root)?;
		Ok(Self::resolve(root, config.as_ref(), overrides))
	}

	/// Merge an optional config with command-line overrides.
	pub fn resolve(root: &Path, config: Option<&HtkConfig>, overrides: SettingsOverrides) -> Self {
		let output_path = overrides
			.output
			.or_else(|| config.and_then(|c| c.output.clone()))
			.map(|path| resolve_against(root, &path));
		let live_account = overrides
			.live_account
			.or_else(|| config.and_then(|c| c.accounts.live.clone()));
		let simulated_account = overrides
			.simulated_account
			.or_else(|| config.and_then(|c| c.accounts.simulated.clone()));

		let discovery = DiscoveryOptions {
			max_files: Some(config.map_or(DEFAULT_MAX_FILES, |c| c.max_files)),
			max_file_size: config.map_or(DEFAULT_MAX_FILE_SIZE, |c| c.max_file_size),
			ignored_dirs: config.map(|c| c.exclude.dirs.clone()).unwrap_or_default(),
			exclude_patterns: config
				.map(|c| c.exclude.patterns.clone())
				.unwrap_or_default(),
			..DiscoveryOptions::default()
		};

		Self {
			workspace_root: root.to_path_buf(),
			output_path,
			append_timestamp: overrides.append_timestamp
				|| config.is_some_and(|c| c.append_timestamp),
			placeholder_values: PlaceholderValues::new(live_account, simulated_account),
			fail_on_missing_placeholders: overrides.fail_on_missing_placeholders
				|| config.is_some_and(|c| c.fail_on_missing_placeholders),
			strict_length: overrides.strict_length
				|| config.is_some_and(|c| c.import.strict_length),
			discovery,
		}
	}

	/// The output path the build should write to, with the timestamp applied
	/// when configured.
	pub fn resolved_output_path(&self, now: NaiveDateTime) -> HtkResult<PathBuf> {
		let Some(output_path) = &self.output_path else {
			return Err(HtkError::configuration(
				"Output path is required. Set `output` in htk.toml or pass --output.",
			));
		};

		if self.append_timestamp {
			Ok(append_timestamp_to_path(output_path, now))
		} else {
			Ok(output_path.clone())
		}
	}

	/// Build the compile options for this run.
	pub fn compile_options(&self, now: NaiveDateTime) -> HtkResult<CompileOptions> {
		Ok(CompileOptions {
			workspace_root: self.workspace_root.clone(),
			output_path: self.resolved_output_path(now)?,
			placeholder_values: self.placeholder_values.clone(),
			fail_on_missing_placeholders: self.fail_on_missing_placeholders,
			discovery: self.discovery.clone(),
		})
	}
}

fn resolve_against(root: &Path, path: &Path) -> PathBuf {
	if path.is_absolute() {
		path.to_path_buf()
	} else {
		root.join(path)
	}
}

/// Insert `-YYYYMMDD-HHMMSS` between the file stem and its extension.
///
/// `build/Hotkey.htk` becomes `build/Hotkey-20240131-093005.htk`.
pub fn append_timestamp_to_path(path: &Path, now: NaiveDateTime) -> PathBuf {
	let timestamp = now.format("%Y%m%d-%H%M%S");
	let stem = path
		.file_stem()
		.map(|stem| stem.to_string_lossy().into_owned())
		.unwrap_or_default();
	let file_name = match path.extension() {
		Some(extension) => format!("{stem}-{timestamp}.{}", extension.to_string_lossy()),
		None => format!("{stem}-{timestamp}"),
	};

	path.with_file_name(file_name)
}
