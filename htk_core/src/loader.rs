use std::collections::HashMap;
use std::path::PathBuf;

use crate::ErrorContext;
use crate::HtkError;
use crate::HtkResult;
use crate::normalize_to_lf;

/// Read each unique script once and normalize its line endings to `\n`.
///
/// Bytes that are not valid UTF-8 are replaced with U+FFFD so the validator
/// can report them against the right file.
pub fn load_script_files(
	script_paths: &[PathBuf],
	max_files: Option<usize>,
) -> HtkResult<HashMap<PathBuf, String>> {
	let mut unique = script_paths.to_vec();
	unique.sort();
	unique.dedup();

	if let Some(max_files) = max_files {
		if unique.len() > max_files {
			return Err(
				HtkError::script("Too many script files provided for compilation.")
					.with_details(format!(
						"Found {} files, limit is {max_files}.",
						unique.len()
					)),
			);
		}
	}

	let mut contents = HashMap::with_capacity(unique.len());
	for script_path in unique {
		let bytes = std::fs::read(&script_path).map_err(|e| {
			HtkError::script("Unable to read script file.")
				.with_details(format!("{}: {e}", script_path.display()))
				.with_context(ErrorContext::source(&script_path))
		})?;
		let text = normalize_to_lf(&String::from_utf8_lossy(&bytes));
		contents.insert(script_path, text);
	}

	Ok(contents)
}
