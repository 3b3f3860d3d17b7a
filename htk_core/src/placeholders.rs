use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;
use std::path::PathBuf;

use crate::CompileWarning;
use crate::HtkError;
use crate::HtkResult;
use crate::WarningCode;

/// Account placeholders substituted into scripts at compile time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PlaceholderKind {
	Live,
	Simulated,
}

impl PlaceholderKind {
	/// Substitution order.
	pub const ALL: [Self; 2] = [Self::Live, Self::Simulated];

	/// Literal marker in script text.
	pub fn token(self) -> &'static str {
		match self {
			Self::Live => "%%LIVE%%",
			Self::Simulated => "%%SIMULATED%%",
		}
	}

	/// Human-readable setting name.
	pub fn label(self) -> &'static str {
		match self {
			Self::Live => "Live Account",
			Self::Simulated => "Simulated Account",
		}
	}
}

impl fmt::Display for PlaceholderKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{} ({})", self.label(), self.token())
	}
}

/// Configured account identifiers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaceholderValues {
	pub live_account: Option<String>,
	pub simulated_account: Option<String>,
}

impl PlaceholderValues {
	pub fn new(live_account: Option<String>, simulated_account: Option<String>) -> Self {
		Self {
			live_account,
			simulated_account,
		}
	}

	/// The value for `kind`, or `None` when unset or blank.
	pub fn value(&self, kind: PlaceholderKind) -> Option<&str> {
		let value = match kind {
			PlaceholderKind::Live => self.live_account.as_deref(),
			PlaceholderKind::Simulated => self.simulated_account.as_deref(),
		};

		value.filter(|value| !value.trim().is_empty())
	}
}

/// Outcome of substituting placeholders in one script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Substitution {
	pub text: String,
	/// Occurrences replaced per kind.
	pub replaced: BTreeMap<PlaceholderKind, usize>,
	/// Kinds present in the script without a usable value. Those tokens are
	/// left verbatim.
	pub missing: Vec<PlaceholderKind>,
}

/// Replace every placeholder that has a value, in [`PlaceholderKind::ALL`]
/// order.
pub fn substitute_placeholders(script_text: &str, values: &PlaceholderValues) -> Substitution {
	let mut text = script_text.to_string();
	let mut replaced = BTreeMap::new();
	let mut missing = Vec::new();

	for kind in PlaceholderKind::ALL {
		let count = text.matches(kind.token()).count();
		if count == 0 {
			continue;
		}

		match values.value(kind) {
			Some(value) => {
				text = text.replace(kind.token(), value);
				replaced.insert(kind, count);
			}
			None => missing.push(kind),
		}
	}

	Substitution {
		text,
		replaced,
		missing,
	}
}

/// A placeholder kind left unresolved, with every script that used it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaceholderWarning {
	pub kind: PlaceholderKind,
	/// Sorted, deduplicated.
	pub affected_scripts: Vec<PathBuf>,
}

/// Aggregates missing placeholders across a compile run.
#[derive(Debug, Default)]
pub struct PlaceholderWarningTracker {
	missing: BTreeMap<PlaceholderKind, BTreeSet<PathBuf>>,
}

impl PlaceholderWarningTracker {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn add_missing(&mut self, kind: PlaceholderKind, source_path: &Path) {
		self.missing
			.entry(kind)
			.or_default()
			.insert(source_path.to_path_buf());
	}

	pub fn is_empty(&self) -> bool {
		self.missing.is_empty()
	}

	/// One `MISSING_PLACEHOLDER_SETTING` warning per kind.
	pub fn build_warnings(&self) -> Vec<CompileWarning> {
		self.missing
			.keys()
			.map(|kind| {
				CompileWarning::new(
					WarningCode::MissingPlaceholderSetting,
					format!(
						"{} setting is missing. Placeholder {} will be left unchanged.",
						kind.label(),
						kind.token()
					),
				)
			})
			.collect()
	}

	pub fn build_placeholder_warnings(&self) -> Vec<PlaceholderWarning> {
		self.missing
			.iter()
			.map(|(kind, scripts)| {
				PlaceholderWarning {
					kind: *kind,
					affected_scripts: scripts.iter().cloned().collect(),
				}
			})
			.collect()
	}
}

/// Fail when strict placeholder checking is on and any placeholder is
/// unresolved.
pub fn ensure_placeholders_satisfied(
	warnings: &[PlaceholderWarning],
	fail_on_missing: bool,
) -> HtkResult<()> {
	if !fail_on_missing || warnings.is_empty() {
		return Ok(());
	}

	let missing = warnings
		.iter()
		.map(|warning| warning.kind.to_string())
		.collect::<Vec<_>>()
		.join(", ");
	let affected = warnings
		.iter()
		.flat_map(|warning| warning.affected_scripts.iter())
		.map(|path| path.display().to_string())
		.collect::<BTreeSet<_>>();

	let mut details = vec![format!("Missing settings for: {missing}.")];
	if !affected.is_empty() {
		let affected = affected.into_iter().collect::<Vec<_>>().join(", ");
		details.push(format!("Affected scripts: {affected}."));
	}

	Err(
		HtkError::validation("Account placeholder settings are required for this build.")
			.with_details(details.join(" ")),
	)
}
