use std::collections::BTreeSet;
use std::collections::HashMap;
use std::collections::HashSet;
use std::path::PathBuf;

use crate::CompileWarning;
use crate::DiscoveryOptions;
use crate::HotkeyModel;
use crate::HtkError;
use crate::HtkResult;
use crate::KeymapEntry;
use crate::PlaceholderValues;
use crate::PlaceholderWarning;
use crate::PlaceholderWarningTracker;
use crate::Reporter;
use crate::WarningCode;
use crate::aggregate_hotkeys;
use crate::build_hotkey_models;
use crate::discover_workspace_inputs;
use crate::ensure_placeholders_satisfied;
use crate::ensure_unique_entries;
use crate::is_ignored;
use crate::load_script_files;
use crate::normalize_to_lf;
use crate::parse_keymap_file;
use crate::render_hotkeys;
use crate::substitute_placeholders;
use crate::write_hotkey_file;

/// Inputs for [`compile_hotkeys`].
#[derive(Debug, Clone)]
pub struct CompileOptions {
	pub workspace_root: PathBuf,
	/// Final output path, timestamp already applied.
	pub output_path: PathBuf,
	pub placeholder_values: PlaceholderValues,
	pub fail_on_missing_placeholders: bool,
	pub discovery: DiscoveryOptions,
}

impl CompileOptions {
	/// Options with no placeholder values and default discovery.
	pub fn new(workspace_root: impl Into<PathBuf>, output_path: impl Into<PathBuf>) -> Self {
		Self {
			workspace_root: workspace_root.into(),
			output_path: output_path.into(),
			placeholder_values: PlaceholderValues::default(),
			fail_on_missing_placeholders: false,
			discovery: DiscoveryOptions::default(),
		}
	}
}

/// Everything produced by a successful compile.
#[derive(Debug, Clone)]
pub struct CompileResult {
	/// Records in output order.
	pub hotkeys: Vec<HotkeyModel>,
	pub warnings: Vec<CompileWarning>,
	pub placeholder_warnings: Vec<PlaceholderWarning>,
	pub output_path: PathBuf,
	/// Discovered scripts excluded by an ignore tag.
	pub ignored_scripts: Vec<PathBuf>,
}

/// Compile a workspace into a single `Hotkey.htk` file.
pub fn compile_hotkeys(options: &CompileOptions, reporter: &mut dyn Reporter) -> HtkResult<CompileResult> {
	let root = &options.workspace_root;
	let inputs = discover_workspace_inputs(root, &options.discovery)?;
	reporter.info(&format!(
		"Discovered {} script(s) in {}",
		inputs.script_paths.len(),
		root.display()
	));

	let entries = parse_keymap_file(&inputs.keymap_path, root, &inputs.script_paths)?;
	let referenced_paths = entries
		.iter()
		.map(|entry| entry.script_path.clone())
		.collect::<Vec<_>>();
	let script_contents = load_script_files(&referenced_paths, options.discovery.max_files)?;

	let ignored_scripts = detect_ignored_scripts(&inputs.script_paths, &script_contents);
	for ignored in &ignored_scripts {
		reporter.info(&format!("Ignoring {}", ignored.display()));
	}

	let filtered = entries
		.into_iter()
		.filter(|entry| !ignored_scripts.contains(&entry.script_path))
		.collect::<Vec<_>>();
	if filtered.is_empty() {
		return Err(
			HtkError::keymap("All keymap entries are ignored.")
				.with_details("No buildable scripts remain after applying // Ignore: True tags."),
		);
	}
	ensure_unique_entries(&filtered)?;

	let mut tracker = PlaceholderWarningTracker::new();
	let substituted = substitute_all(&filtered, &script_contents, &options.placeholder_values, &mut tracker);
	let placeholder_warnings = tracker.build_placeholder_warnings();
	ensure_placeholders_satisfied(&placeholder_warnings, options.fail_on_missing_placeholders)?;

	let buildable_paths = inputs
		.script_paths
		.iter()
		.filter(|path| !ignored_scripts.contains(*path))
		.cloned()
		.collect::<Vec<_>>();
	let warnings = collect_warnings(inputs.warnings, &filtered, &buildable_paths, tracker.build_warnings());
	for warning in &warnings {
		tracing::warn!(code = %warning.code, "{}", warning.message);
		reporter.warn(&warning.message);
	}

	let hotkeys = aggregate_hotkeys(build_hotkey_models(&filtered, &substituted)?);
	let rendered = render_hotkeys(&hotkeys)?;
	write_hotkey_file(&options.output_path, &rendered)?;
	reporter.info(&format!(
		"Wrote {} hotkey record(s) to {}",
		hotkeys.len(),
		options.output_path.display()
	));

	Ok(CompileResult {
		hotkeys,
		warnings,
		placeholder_warnings,
		output_path: options.output_path.clone(),
		ignored_scripts: ignored_scripts.into_iter().collect(),
	})
}

/// Discovered scripts carrying an ignore tag, sorted. Scripts not loaded by
/// the keymap are read here; unreadable ones are treated as not ignored.
fn detect_ignored_scripts(
	script_paths: &[PathBuf],
	loaded: &HashMap<PathBuf, String>,
) -> BTreeSet<PathBuf> {
	script_paths
		.iter()
		.filter(|path| {
			match loaded.get(*path) {
				Some(content) => is_ignored(content),
				None => {
					std::fs::read(path)
						.is_ok_and(|bytes| is_ignored(&normalize_to_lf(&String::from_utf8_lossy(&bytes))))
				}
			}
		})
		.cloned()
		.collect()
}

fn substitute_all(
	entries: &[KeymapEntry],
	script_contents: &HashMap<PathBuf, String>,
	values: &PlaceholderValues,
	tracker: &mut PlaceholderWarningTracker,
) -> HashMap<PathBuf, String> {
	let mut substituted = HashMap::with_capacity(entries.len());

	for entry in entries {
		if substituted.contains_key(&entry.script_path) {
			continue;
		}
		let Some(script_text) = script_contents.get(&entry.script_path) else {
			continue;
		};

		let substitution = substitute_placeholders(script_text, values);
		for kind in &substitution.missing {
			tracker.add_missing(*kind, &entry.script_path);
		}
		substituted.insert(entry.script_path.clone(), substitution.text);
	}

	substituted
}

fn collect_warnings(
	base_warnings: Vec<CompileWarning>,
	entries: &[KeymapEntry],
	script_paths: &[PathBuf],
	placeholder_warnings: Vec<CompileWarning>,
) -> Vec<CompileWarning> {
	let mut warnings = base_warnings;
	warnings.extend(placeholder_warnings);

	let referenced = entries
		.iter()
		.map(|entry| &entry.script_path)
		.collect::<HashSet<_>>();

	for script_path in script_paths {
		if !referenced.contains(script_path) {
			warnings.push(
				CompileWarning::new(
					WarningCode::UnreferencedScript,
					format!("Script {} is not referenced by keymap.yaml.", script_path.display()),
				)
				.with_source_path(script_path),
			);
		}
	}

	warnings
}
