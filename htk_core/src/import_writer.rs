use std::fmt;
use std::io;
use std::path::Path;
use std::path::PathBuf;

use crate::ErrorContext;
use crate::HtkError;
use crate::HtkResult;
use crate::KEYMAP_FILE_NAME;
use crate::NamedHotkeyRecord;
use crate::SCRIPTS_DIR;
use crate::normalize_to_crlf;
use crate::writer::temp_path_beside;
use crate::writer::unique_suffix;

/// What to do when import targets already exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictStrategy {
	/// Replace existing files.
	Overwrite,
	/// Leave existing scripts untouched. Not allowed when `keymap.yaml`
	/// exists.
	Skip,
	/// Abort when anything exists.
	Cancel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictKind {
	Script,
	Keymap,
}

impl fmt::Display for ConflictKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Script => f.write_str("script"),
			Self::Keymap => f.write_str("keymap"),
		}
	}
}

/// An import target that already exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictInfo {
	pub path: PathBuf,
	pub kind: ConflictKind,
	/// Set for script conflicts.
	pub record_index: Option<usize>,
	pub key: Option<String>,
	pub label: Option<String>,
}

/// Outcome of a successful import write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportResult {
	pub destination_root: PathBuf,
	pub scripts_dir: PathBuf,
	pub keymap_path: PathBuf,
	pub written_script_paths: Vec<PathBuf>,
	/// Existing scripts left in place under [`ConflictStrategy::Skip`].
	pub skipped_script_paths: Vec<PathBuf>,
}

/// The file operations an import transaction performs.
pub(crate) trait FileOps {
	fn exists(&self, path: &Path) -> io::Result<bool>;
	fn create_dir_all(&self, path: &Path) -> io::Result<()>;
	fn remove_dir(&self, path: &Path) -> io::Result<()>;
	fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()>;
	fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;
	fn remove_file(&self, path: &Path) -> io::Result<()>;
}

/// [`FileOps`] backed by `std::fs`.
pub(crate) struct StdFileOps;

impl FileOps for StdFileOps {
	fn exists(&self, path: &Path) -> io::Result<bool> {
		match std::fs::symlink_metadata(path) {
			Ok(_) => Ok(true),
			Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
			Err(e) => Err(e),
		}
	}

	fn create_dir_all(&self, path: &Path) -> io::Result<()> {
		std::fs::create_dir_all(path)
	}

	fn remove_dir(&self, path: &Path) -> io::Result<()> {
		std::fs::remove_dir(path)
	}

	fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
		std::fs::write(path, contents)
	}

	fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
		std::fs::rename(from, to)
	}

	fn remove_file(&self, path: &Path) -> io::Result<()> {
		std::fs::remove_file(path)
	}
}

/// List destination files an import of `records` would overwrite.
pub fn find_import_conflicts(
	destination_root: &Path,
	records: &[NamedHotkeyRecord],
) -> HtkResult<Vec<ConflictInfo>> {
	find_conflicts_with(&StdFileOps, destination_root, records)
}

fn find_conflicts_with(
	ops: &dyn FileOps,
	destination_root: &Path,
	records: &[NamedHotkeyRecord],
) -> HtkResult<Vec<ConflictInfo>> {
	let scripts_dir = destination_root.join(SCRIPTS_DIR);
	let keymap_path = destination_root.join(KEYMAP_FILE_NAME);
	let mut conflicts = Vec::new();

	if probe(ops, &keymap_path)? {
		conflicts.push(ConflictInfo {
			path: keymap_path,
			kind: ConflictKind::Keymap,
			record_index: None,
			key: None,
			label: None,
		});
	}

	for named in records {
		let script_path = scripts_dir.join(&named.file_name);
		if probe(ops, &script_path)? {
			conflicts.push(ConflictInfo {
				path: script_path,
				kind: ConflictKind::Script,
				record_index: Some(named.record.index),
				key: Some(named.record.key.clone()),
				label: Some(named.record.label.clone()),
			});
		}
	}

	Ok(conflicts)
}

fn probe(ops: &dyn FileOps, path: &Path) -> HtkResult<bool> {
	ops.exists(path).map_err(|e| {
		HtkError::import_write("Unable to inspect the destination workspace.")
			.with_details(format!("{}: {e}", path.display()))
			.with_context(ErrorContext::destination(path))
	})
}

/// One line per conflict: `<path> (record N)` or `<path> (keymap)`.
pub fn format_conflicts(conflicts: &[ConflictInfo]) -> String {
	conflicts
		.iter()
		.map(|conflict| {
			match conflict.record_index {
				Some(index) => format!("{} (record {index})", conflict.path.display()),
				None => format!("{} ({})", conflict.path.display(), conflict.kind),
			}
		})
		.collect::<Vec<_>>()
		.join("\n")
}

/// Write every script into `hotkeys/` plus `keymap.yaml`, all or nothing.
///
/// On any failure every temp file is removed, every committed target is
/// removed, every backed-up original is restored, and a `hotkeys/` directory
/// created by this call is removed again.
pub fn write_import_outputs(
	destination_root: &Path,
	records: &[NamedHotkeyRecord],
	keymap_yaml: &str,
	strategy: ConflictStrategy,
) -> HtkResult<ImportResult> {
	write_import_outputs_with(&StdFileOps, destination_root, records, keymap_yaml, strategy)
}

struct WriteTarget {
	path: PathBuf,
	content: String,
}

pub(crate) fn write_import_outputs_with(
	ops: &dyn FileOps,
	destination_root: &Path,
	records: &[NamedHotkeyRecord],
	keymap_yaml: &str,
	strategy: ConflictStrategy,
) -> HtkResult<ImportResult> {
	let scripts_dir = destination_root.join(SCRIPTS_DIR);
	let keymap_path = destination_root.join(KEYMAP_FILE_NAME);
	let conflicts = find_conflicts_with(ops, destination_root, records)?;

	if !conflicts.is_empty() && strategy == ConflictStrategy::Cancel {
		return Err(
			HtkError::import_conflict("Import canceled due to existing files.")
				.with_details(format!("{} conflicting file(s) detected.", conflicts.len()))
				.with_context(ErrorContext::destination(destination_root)),
		);
	}

	if strategy == ConflictStrategy::Skip
		&& conflicts.iter().any(|conflict| conflict.kind == ConflictKind::Keymap)
	{
		return Err(
			HtkError::import_conflict("keymap.yaml already exists at the destination.")
				.with_details("Skipping keymap.yaml is not supported.")
				.with_context(ErrorContext::destination(&keymap_path)),
		);
	}

	let mut skipped_script_paths = Vec::new();
	let mut script_targets = Vec::with_capacity(records.len());
	for named in records {
		let path = scripts_dir.join(&named.file_name);
		let conflicting = conflicts
			.iter()
			.any(|conflict| conflict.kind == ConflictKind::Script && conflict.path == path);

		if strategy == ConflictStrategy::Skip && conflicting {
			tracing::debug!(path = %path.display(), "skipping existing script");
			skipped_script_paths.push(path);
			continue;
		}

		script_targets.push(WriteTarget {
			path,
			content: normalize_to_crlf(&named.record.script_text),
		});
	}

	let written_script_paths = script_targets
		.iter()
		.map(|target| target.path.clone())
		.collect::<Vec<_>>();
	let mut targets = script_targets;
	targets.push(WriteTarget {
		path: keymap_path.clone(),
		content: normalize_to_crlf(keymap_yaml),
	});

	let mut transaction = Transaction::new(ops);
	if let Err(e) = transaction.run(&scripts_dir, &targets) {
		let rollback_failures = transaction.rollback();
		let mut details = e.to_string();
		if !rollback_failures.is_empty() {
			details = format!("{details}\nRollback problems:\n{}", rollback_failures.join("\n"));
		}

		return Err(
			HtkError::import_write("Unable to write imported hotkey files.")
				.with_details(details)
				.with_context(ErrorContext::destination(destination_root)),
		);
	}

	tracing::debug!(
		written = written_script_paths.len(),
		skipped = skipped_script_paths.len(),
		"import outputs written"
	);

	Ok(ImportResult {
		destination_root: destination_root.to_path_buf(),
		scripts_dir,
		keymap_path,
		written_script_paths,
		skipped_script_paths,
	})
}

/// Book-keeping for an all-or-nothing multi-file write.
struct Transaction<'a> {
	ops: &'a dyn FileOps,
	created_dir: Option<PathBuf>,
	/// `(target, temp)` pairs not yet renamed into place.
	temps: Vec<(PathBuf, PathBuf)>,
	/// `(target, backup)` pairs for targets that existed.
	backups: Vec<(PathBuf, PathBuf)>,
	committed: Vec<PathBuf>,
}

impl<'a> Transaction<'a> {
	fn new(ops: &'a dyn FileOps) -> Self {
		Self {
			ops,
			created_dir: None,
			temps: Vec::new(),
			backups: Vec::new(),
			committed: Vec::new(),
		}
	}

	fn run(&mut self, scripts_dir: &Path, targets: &[WriteTarget]) -> io::Result<()> {
		if !self.ops.exists(scripts_dir)? {
			self.ops.create_dir_all(scripts_dir)?;
			self.created_dir = Some(scripts_dir.to_path_buf());
		}

		for target in targets {
			let temp_path = temp_path_beside(&target.path, ".import", "tmp");
			self.temps.push((target.path.clone(), temp_path.clone()));
			self.ops.write(&temp_path, target.content.as_bytes())?;
		}

		for target in targets {
			if self.ops.exists(&target.path)? {
				let mut backup = target.path.clone().into_os_string();
				backup.push(format!(".bak-{}", unique_suffix()));
				let backup = PathBuf::from(backup);
				self.ops.rename(&target.path, &backup)?;
				self.backups.push((target.path.clone(), backup));
			}
		}

		while let Some((target, temp_path)) = self.temps.first().cloned() {
			self.ops.rename(&temp_path, &target)?;
			self.temps.remove(0);
			self.committed.push(target);
		}

		for (target, backup) in std::mem::take(&mut self.backups) {
			if let Err(e) = self.ops.remove_file(&backup) {
				tracing::warn!(
					target = %target.display(),
					backup = %backup.display(),
					"unable to remove import backup: {e}"
				);
			}
		}

		Ok(())
	}

	/// Undo everything done so far, returning a description of each step that
	/// could not be undone.
	fn rollback(&mut self) -> Vec<String> {
		let mut failures = Vec::new();

		for (_, temp_path) in self.temps.drain(..) {
			remove_if_exists(self.ops, &temp_path, &mut failures);
		}

		for target in self.committed.drain(..) {
			remove_if_exists(self.ops, &target, &mut failures);
		}

		for (target, backup) in self.backups.drain(..) {
			if let Err(e) = self.ops.rename(&backup, &target) {
				failures.push(format!(
					"restore {} from {}: {e}",
					target.display(),
					backup.display()
				));
			}
		}

		if let Some(dir) = self.created_dir.take() {
			if let Err(e) = self.ops.remove_dir(&dir) {
				failures.push(format!("remove {}: {e}", dir.display()));
			}
		}

		for failure in &failures {
			tracing::warn!("import rollback: {failure}");
		}

		failures
	}
}

fn remove_if_exists(ops: &dyn FileOps, path: &Path, failures: &mut Vec<String>) {
	match ops.remove_file(path) {
		Ok(()) => {}
		Err(e) if e.kind() == io::ErrorKind::NotFound => {}
		Err(e) => failures.push(format!("remove {}: {e}", path.display())),
	}
}
