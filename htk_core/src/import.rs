use std::fmt;
use std::path::PathBuf;

use crate::ConflictInfo;
use crate::ConflictStrategy;
use crate::HtkError;
use crate::HtkResult;
use crate::ImportKeymapEntry;
use crate::ImportResult;
use crate::LengthMismatch;
use crate::LengthPolicy;
use crate::Reporter;
use crate::assign_names;
use crate::build_keymap_entries;
use crate::decode_hotkey_record;
use crate::find_import_conflicts;
use crate::format_conflicts;
use crate::parse_hotkey_records;
use crate::read_import_source;
use crate::render_keymap_yaml;
use crate::write_import_outputs;

/// Inputs for [`import_hotkey_file`].
#[derive(Debug, Clone)]
pub struct ImportOptions {
	pub source_path: PathBuf,
	pub destination_root: PathBuf,
	/// Fail on header length mismatches instead of warning.
	pub strict_length: bool,
	/// Fixed conflict policy. When `None` the resolver is asked, and only if
	/// conflicts exist.
	pub conflict_strategy: Option<ConflictStrategy>,
}

/// Decides how to handle existing destination files.
pub trait ConflictResolver {
	fn resolve(&mut self, conflicts: &[ConflictInfo]) -> ConflictStrategy;
}

impl<F> ConflictResolver for F
where
	F: FnMut(&[ConflictInfo]) -> ConflictStrategy,
{
	fn resolve(&mut self, conflicts: &[ConflictInfo]) -> ConflictStrategy {
		self(conflicts)
	}
}

/// A non-fatal import finding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportWarning {
	pub message: String,
	pub record_index: usize,
	pub line: usize,
	pub key: String,
	pub label: String,
}

impl From<&LengthMismatch> for ImportWarning {
	fn from(mismatch: &LengthMismatch) -> Self {
		Self {
			message: format!(
				"Record {} (line {}) declares {} bytes but decodes to {} bytes.",
				mismatch.record_index, mismatch.line, mismatch.declared_length, mismatch.decoded_length
			),
			record_index: mismatch.record_index,
			line: mismatch.line,
			key: mismatch.key.clone(),
			label: mismatch.label.clone(),
		}
	}
}

impl fmt::Display for ImportWarning {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.message)
	}
}

/// Everything produced by a successful import.
#[derive(Debug, Clone)]
pub struct ImportOutcome {
	pub result: ImportResult,
	pub entries: Vec<ImportKeymapEntry>,
	pub warnings: Vec<ImportWarning>,
	pub conflicts: Vec<ConflictInfo>,
	pub strategy: ConflictStrategy,
}

/// Recover a workspace from a `Hotkey.htk` file.
pub fn import_hotkey_file(
	options: &ImportOptions,
	resolver: &mut dyn ConflictResolver,
	reporter: &mut dyn Reporter,
) -> HtkResult<ImportOutcome> {
	let source_path = &options.source_path;
	reporter.info(&format!("Reading {}", source_path.display()));
	let content = read_import_source(source_path)?;
	let parsed = parse_hotkey_records(&content, source_path)?;
	reporter.info(&format!("Parsed {} hotkey record(s).", parsed.len()));

	let mut warnings = Vec::new();
	let mut decoded = Vec::with_capacity(parsed.len());
	{
		let mut on_mismatch = |mismatch: &LengthMismatch| warnings.push(ImportWarning::from(mismatch));
		let mut policy = if options.strict_length {
			LengthPolicy::Strict
		} else {
			LengthPolicy::Lenient(&mut on_mismatch)
		};

		for record in &parsed {
			decoded.push(decode_hotkey_record(record, &mut policy)?);
		}
	}

	for warning in &warnings {
		tracing::warn!(record = warning.record_index, line = warning.line, "{}", warning.message);
		reporter.warn(&warning.message);
	}

	let named = assign_names(decoded)?;
	let entries = build_keymap_entries(&named);
	let keymap_yaml = render_keymap_yaml(&entries);

	let conflicts = find_import_conflicts(&options.destination_root, &named)?;
	let strategy = match options.conflict_strategy {
		Some(strategy) => strategy,
		None if conflicts.is_empty() => ConflictStrategy::Overwrite,
		None => {
			reporter.warn(&format!(
				"{} existing file(s) would be overwritten:\n{}",
				conflicts.len(),
				format_conflicts(&conflicts)
			));
			resolver.resolve(&conflicts)
		}
	};

	if options.conflict_strategy.is_none() && strategy == ConflictStrategy::Cancel {
		return Err(
			HtkError::import_canceled("Import canceled.")
				.with_details(format!("{} conflicting file(s) left untouched.", conflicts.len())),
		);
	}

	let result = write_import_outputs(&options.destination_root, &named, &keymap_yaml, strategy)?;

	for skipped in &result.skipped_script_paths {
		reporter.warn(&format!("Skipped existing script {}", skipped.display()));
	}
	reporter.info(&format!(
		"Imported {} script(s) into {}",
		result.written_script_paths.len(),
		result.destination_root.display()
	));

	Ok(ImportOutcome {
		result,
		entries,
		warnings,
		conflicts,
		strategy,
	})
}
