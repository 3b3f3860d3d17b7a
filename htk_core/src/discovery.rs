use std::collections::HashSet;
use std::io;
use std::path::Path;
use std::path::PathBuf;

use ignore::gitignore::Gitignore;
use ignore::gitignore::GitignoreBuilder;

use crate::CompileWarning;
use crate::DEFAULT_IGNORED_DIRS;
use crate::DEFAULT_MAX_FILE_SIZE;
use crate::ErrorContext;
use crate::HtkError;
use crate::HtkResult;
use crate::JUNK_FILE_PREFIX;
use crate::KEYMAP_FILE_NAME;
use crate::SCRIPT_EXTENSION;
use crate::WarningCode;

/// Options controlling how a workspace is walked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryOptions {
	/// Maximum number of scripts accepted. `None` disables the limit.
	pub max_files: Option<usize>,
	/// Maximum size in bytes of a single script.
	pub max_file_size: u64,
	/// Directory names skipped in addition to [`DEFAULT_IGNORED_DIRS`].
	pub ignored_dirs: Vec<String>,
	/// Gitignore-syntax patterns matched relative to the workspace root.
	pub exclude_patterns: Vec<String>,
	/// Optional config files to probe, relative to the root unless absolute.
	pub optional_config_candidates: Vec<PathBuf>,
}

impl Default for DiscoveryOptions {
	fn default() -> Self {
		Self {
			max_files: None,
			max_file_size: DEFAULT_MAX_FILE_SIZE,
			ignored_dirs: Vec::new(),
			exclude_patterns: Vec::new(),
			optional_config_candidates: Vec::new(),
		}
	}
}

/// Everything the compile pipeline reads from a workspace.
#[derive(Debug, Clone)]
pub struct WorkspaceInputs {
	pub keymap_path: PathBuf,
	/// Every discovered `.das` script, sorted.
	pub script_paths: Vec<PathBuf>,
	pub optional_config_paths: Vec<PathBuf>,
	pub warnings: Vec<CompileWarning>,
}

/// Locate `keymap.yaml` and every script under `root`.
pub fn discover_workspace_inputs(
	root: &Path,
	options: &DiscoveryOptions,
) -> HtkResult<WorkspaceInputs> {
	let keymap_path = resolve_keymap_path(root)?;
	let script_paths = discover_script_paths(root, options)?;

	if script_paths.is_empty() {
		return Err(
			HtkError::discovery("No .das source files were found in the workspace.")
				.with_details(root.display().to_string())
				.with_context(ErrorContext::source(root)),
		);
	}

	let (optional_config_paths, warnings) =
		discover_optional_configs(root, &options.optional_config_candidates);

	tracing::debug!(
		scripts = script_paths.len(),
		optional_configs = optional_config_paths.len(),
		"discovered workspace inputs"
	);

	Ok(WorkspaceInputs {
		keymap_path,
		script_paths,
		optional_config_paths,
		warnings,
	})
}

fn resolve_keymap_path(root: &Path) -> HtkResult<PathBuf> {
	let keymap_path = root.join(KEYMAP_FILE_NAME);
	let text = std::fs::read_to_string(&keymap_path).map_err(|e| {
		HtkError::discovery("No keymap.yaml file was found at the workspace root.")
			.with_details(format!("{}: {e}", keymap_path.display()))
			.with_context(ErrorContext::source(&keymap_path))
	})?;

	if text.trim().is_empty() {
		return Err(
			HtkError::discovery("keymap.yaml is empty. Add at least one entry before compiling.")
				.with_details(keymap_path.display().to_string())
				.with_context(ErrorContext::source(&keymap_path)),
		);
	}

	Ok(keymap_path)
}

fn discover_script_paths(root: &Path, options: &DiscoveryOptions) -> HtkResult<Vec<PathBuf>> {
	let exclude = build_exclude_matcher(root, &options.exclude_patterns)?;
	let ignored_dirs = DEFAULT_IGNORED_DIRS
		.iter()
		.map(|name| (*name).to_string())
		.chain(options.ignored_dirs.iter().cloned())
		.collect::<HashSet<_>>();

	let mut walker = Walker {
		ignored_dirs: &ignored_dirs,
		exclude: &exclude,
		max_file_size: options.max_file_size,
		visited_dirs: HashSet::new(),
		files: Vec::new(),
	};
	walker.walk_dir(root)?;

	let mut files = walker.files;
	// Sort for deterministic ordering.
	files.sort();

	if let Some(max_files) = options.max_files {
		if files.len() > max_files {
			return Err(
				HtkError::discovery("Workspace contains more source files than the compiler allows.")
					.with_details(format!(
						"Found {} files, limit is {max_files}.",
						files.len()
					)),
			);
		}
	}

	Ok(files)
}

/// Build a `Gitignore` matcher from `[exclude] patterns` in `htk.toml`.
fn build_exclude_matcher(root: &Path, patterns: &[String]) -> HtkResult<Gitignore> {
	let mut builder = GitignoreBuilder::new(root);
	for pattern in patterns {
		builder.add_line(None, pattern).map_err(|e| {
			HtkError::configuration(format!("Invalid exclude pattern `{pattern}`."))
				.with_details(e.to_string())
		})?;
	}

	builder.build().map_err(|e| {
		HtkError::configuration("Failed to build exclude rules.").with_details(e.to_string())
	})
}

struct Walker<'a> {
	ignored_dirs: &'a HashSet<String>,
	exclude: &'a Gitignore,
	max_file_size: u64,
	visited_dirs: HashSet<PathBuf>,
	files: Vec<PathBuf>,
}

impl Walker<'_> {
	fn walk_dir(&mut self, dir: &Path) -> HtkResult<()> {
		// Detect symlink cycles by tracking canonical paths.
		let canonical = dir.canonicalize().unwrap_or_else(|_| dir.to_path_buf());
		if !self.visited_dirs.insert(canonical) {
			return Err(
				HtkError::discovery("Workspace contains a symlink cycle.")
					.with_details(dir.display().to_string())
					.with_context(ErrorContext::source(dir)),
			);
		}

		let entries = std::fs::read_dir(dir).map_err(|e| read_dir_error(dir, &e))?;

		for entry in entries {
			let entry = entry.map_err(|e| read_dir_error(dir, &e))?;
			let path = entry.path();
			let name = entry.file_name();
			let name = name.to_string_lossy();
			let is_dir = path.is_dir();

			if self.exclude.matched(&path, is_dir).is_ignore() {
				continue;
			}

			if is_dir {
				if !self.ignored_dirs.contains(&*name) {
					self.walk_dir(&path)?;
				}
				continue;
			}

			if !path.is_file() || name.starts_with(JUNK_FILE_PREFIX) || !is_script_file(&path) {
				continue;
			}

			self.check_file_size(&path)?;
			self.files.push(path);
		}

		Ok(())
	}

	fn check_file_size(&self, path: &Path) -> HtkResult<()> {
		let size = std::fs::metadata(path).map_or(0, |m| m.len());
		if size > self.max_file_size {
			return Err(
				HtkError::discovery("Script file exceeds the maximum allowed size.")
					.with_details(format!(
						"{}: {size} bytes, limit is {}.",
						path.display(),
						self.max_file_size
					))
					.with_context(ErrorContext::source(path)),
			);
		}

		Ok(())
	}
}

fn read_dir_error(dir: &Path, error: &io::Error) -> HtkError {
	HtkError::discovery("Unable to read a workspace directory.")
		.with_details(format!("{}: {error}", dir.display()))
		.with_context(ErrorContext::source(dir))
}

/// Whether `path` has a `.das` extension (any case).
pub fn is_script_file(path: &Path) -> bool {
	path.extension()
		.and_then(|ext| ext.to_str())
		.is_some_and(|ext| ext.eq_ignore_ascii_case(SCRIPT_EXTENSION))
}

fn discover_optional_configs(
	root: &Path,
	candidates: &[PathBuf],
) -> (Vec<PathBuf>, Vec<CompileWarning>) {
	let mut paths = Vec::new();
	let mut warnings = Vec::new();

	for candidate in candidates {
		let resolved = if candidate.is_absolute() {
			candidate.clone()
		} else {
			root.join(candidate)
		};

		match std::fs::metadata(&resolved) {
			Ok(_) => paths.push(resolved),
			Err(e) if e.kind() == io::ErrorKind::NotFound => {}
			Err(e) => {
				let message = format!("Optional config not readable: {} ({e})", resolved.display());
				tracing::warn!("{message}");
				warnings.push(
					CompileWarning::new(WarningCode::OptionalConfig, message).with_source_path(resolved),
				);
			}
		}
	}

	(paths, warnings)
}
