use std::path::Path;
use std::path::PathBuf;

use serde_yaml_ng::Mapping;
use serde_yaml_ng::Value;

use crate::ErrorContext;
use crate::HtkError;
use crate::HtkResult;

/// One row of `keymap.yaml` with its script reference resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeymapEntry {
	pub id: String,
	/// Key combination; empty when the entry has no key.
	pub key: String,
	pub label: String,
	/// Absolute path of the discovered script this entry refers to.
	pub script_path: PathBuf,
}

/// The two accepted top-level shapes of `keymap.yaml`.
#[derive(Debug, Clone, PartialEq)]
pub enum KeymapDocument {
	/// A bare list of entries.
	List(Vec<Value>),
	/// A mapping with an `entries` list.
	Object { entries: Vec<Value> },
}

impl KeymapDocument {
	pub fn from_value(value: Value) -> HtkResult<Self> {
		match value {
			Value::Sequence(entries) => Ok(Self::List(entries)),
			Value::Mapping(mut mapping) => {
				match mapping.remove("entries") {
					Some(Value::Sequence(entries)) => Ok(Self::Object { entries }),
					_ => Err(not_a_list()),
				}
			}
			_ => Err(not_a_list()),
		}
	}

	pub fn entries(&self) -> &[Value] {
		match self {
			Self::List(entries) | Self::Object { entries } => entries,
		}
	}
}

fn not_a_list() -> HtkError {
	HtkError::keymap("keymap.yaml must contain a list of entries.")
		.with_details("Expected a YAML array or an object with an entries array.")
}

/// Read and parse `keymap.yaml`, resolving every script reference against
/// the discovered script paths.
pub fn parse_keymap_file(
	keymap_path: &Path,
	workspace_root: &Path,
	script_paths: &[PathBuf],
) -> HtkResult<Vec<KeymapEntry>> {
	let text = std::fs::read_to_string(keymap_path).map_err(|e| {
		HtkError::keymap("Unable to read keymap.yaml.")
			.with_details(format!("{}: {e}", keymap_path.display()))
			.with_context(ErrorContext::source(keymap_path))
	})?;

	parse_keymap_str(&text, keymap_path, workspace_root, script_paths)
}

/// Parse keymap text already loaded from `keymap_path`.
pub fn parse_keymap_str(
	text: &str,
	keymap_path: &Path,
	workspace_root: &Path,
	script_paths: &[PathBuf],
) -> HtkResult<Vec<KeymapEntry>> {
	if text.trim().is_empty() {
		return Err(
			HtkError::keymap("keymap.yaml is empty. Add at least one entry before compiling.")
				.with_details(keymap_path.display().to_string())
				.with_context(ErrorContext::source(keymap_path)),
		);
	}

	let value: Value = serde_yaml_ng::from_str(text).map_err(|e| {
		HtkError::keymap("keymap.yaml could not be parsed.")
			.with_details(e.to_string())
			.with_context(ErrorContext::source(keymap_path))
	})?;
	let document = KeymapDocument::from_value(value)?;

	if document.entries().is_empty() {
		return Err(
			HtkError::keymap("keymap.yaml contains no entries.")
				.with_details(keymap_path.display().to_string())
				.with_context(ErrorContext::source(keymap_path)),
		);
	}

	document
		.entries()
		.iter()
		.enumerate()
		.map(|(index, raw)| {
			let Value::Mapping(row) = raw else {
				return Err(
					HtkError::keymap("Keymap entry must be an object.")
						.with_details(format!("Entry {} is not a mapping object.", index + 1)),
				);
			};

			let context = ErrorContext::default();
			let id = read_string_field(row, &["id"], "id", index, &context, false)?;
			let context = context.with_id(&id);
			let key = read_string_field(row, &["key", "keyCombo"], "key", index, &context, true)?;
			let context = context.with_key(&key);
			// Not trimmed: header labels may carry edge spaces.
			let label = read_raw_field(row, &["label", "name"], "label", index, &context, false)?;
			let reference = read_string_field(
				row,
				&["scriptPath", "script"],
				"scriptPath",
				index,
				&context,
				false,
			)?;
			let script_path = resolve_script_path(&reference, workspace_root, script_paths, &context)?;

			Ok(KeymapEntry {
				id,
				key,
				label,
				script_path,
			})
		})
		.collect()
}

/// Read the first usable string among `keys`, trimmed.
fn read_string_field(
	row: &Mapping,
	keys: &[&str],
	label: &str,
	index: usize,
	context: &ErrorContext,
	allow_empty: bool,
) -> HtkResult<String> {
	read_raw_field(row, keys, label, index, context, allow_empty).map(|value| value.trim().to_string())
}

/// Read the first usable string among `keys` as written. A value counts as
/// blank when it is empty after trimming. When `allow_empty` is set a
/// missing, null, or blank value yields `""`. Non-string values never count.
fn read_raw_field(
	row: &Mapping,
	keys: &[&str],
	label: &str,
	index: usize,
	context: &ErrorContext,
	allow_empty: bool,
) -> HtkResult<String> {
	for key in keys {
		match row.get(*key) {
			Some(Value::String(value)) => {
				if value.trim().is_empty() {
					if allow_empty {
						return Ok(String::new());
					}
				} else {
					return Ok(value.clone());
				}
			}
			Some(Value::Null) if allow_empty => return Ok(String::new()),
			_ => {}
		}
	}

	if allow_empty {
		return Ok(String::new());
	}

	Err(
		HtkError::keymap(format!("Keymap entry is missing required {label}."))
			.with_details(format!("Entry {} is missing {}.", index + 1, keys.join(" or ")))
			.with_context(context.clone()),
	)
}

fn normalize_path(path: &str) -> String {
	path.replace('\\', "/").to_lowercase()
}

struct Candidate<'a> {
	full_path: &'a PathBuf,
	full: String,
	relative: String,
	relative_without_ext: String,
	base: String,
	base_without_ext: String,
}

/// Resolve a keymap script reference to exactly one discovered script.
///
/// Tried in order: absolute path match, workspace-relative match (with or
/// without the `.das` extension), then file-name match. Comparisons ignore
/// case and separator style.
pub fn resolve_script_path(
	reference: &str,
	workspace_root: &Path,
	script_paths: &[PathBuf],
	context: &ErrorContext,
) -> HtkResult<PathBuf> {
	let target = normalize_path(reference);
	let target_without_ext = target.strip_suffix(".das").unwrap_or(&target);

	let candidates = script_paths
		.iter()
		.map(|full_path| {
			let relative = normalize_path(
				&full_path
					.strip_prefix(workspace_root)
					.unwrap_or(full_path)
					.to_string_lossy(),
			);
			Candidate {
				full_path,
				full: normalize_path(&full_path.to_string_lossy()),
				relative_without_ext: relative.strip_suffix(".das").unwrap_or(&relative).to_string(),
				relative,
				base: full_path
					.file_name()
					.map(|name| normalize_path(&name.to_string_lossy()))
					.unwrap_or_default(),
				base_without_ext: full_path
					.file_stem()
					.map(|stem| normalize_path(&stem.to_string_lossy()))
					.unwrap_or_default(),
			}
		})
		.collect::<Vec<_>>();

	let mut matches: Vec<&PathBuf> = if Path::new(reference).is_absolute() {
		candidates
			.iter()
			.filter(|candidate| candidate.full == target)
			.map(|candidate| candidate.full_path)
			.collect()
	} else {
		candidates
			.iter()
			.filter(|candidate| {
				candidate.relative == target || candidate.relative_without_ext == target_without_ext
			})
			.map(|candidate| candidate.full_path)
			.collect()
	};

	if matches.is_empty() {
		matches = candidates
			.iter()
			.filter(|candidate| {
				candidate.base == target
					|| candidate.base_without_ext == target
					|| candidate.base_without_ext == target_without_ext
			})
			.map(|candidate| candidate.full_path)
			.collect();
	}

	matches.dedup();

	match matches.as_slice() {
		[single] => Ok((*single).clone()),
		[] => {
			Err(
				HtkError::keymap("Keymap entry references a missing script.")
					.with_details(format!("No .das file matches {reference}."))
					.with_context(context.clone().with_source_path(reference)),
			)
		}
		_ => {
			let listed = matches
				.iter()
				.map(|path| path.display().to_string())
				.collect::<Vec<_>>()
				.join(", ");
			Err(
				HtkError::keymap("Keymap entry references multiple scripts.")
					.with_details(format!("Ambiguous matches for {reference}: {listed}."))
					.with_context(context.clone().with_source_path(reference)),
			)
		}
	}
}
