//! Comment tags recognised inside script bodies.
//!
//! - `// Ignore: True` excludes a script from compilation.
//! - `// Group: <name>` assigns an imported script to a keymap group heading.
//!
//! Both are matched per line, case-insensitively, with flexible whitespace
//! around the `//` and `:`.

/// Whether any line of `script_text` is an ignore tag.
pub fn is_ignored(script_text: &str) -> bool {
	split_lines(script_text).any(|line| {
		tag_value(line, "ignore").is_some_and(|value| value.eq_ignore_ascii_case("true"))
	})
}

/// The group named by the first `// Group: <name>` line, if any.
pub fn extract_group(script_text: &str) -> Option<String> {
	split_lines(script_text)
		.filter_map(|line| tag_value(line, "group"))
		.find(|value| !value.is_empty())
		.map(str::to_string)
}

fn split_lines(text: &str) -> impl Iterator<Item = &str> {
	text.split(['\r', '\n'])
}

/// Parse `// <name> : <value>` and return the trimmed value.
fn tag_value<'a>(line: &'a str, name: &str) -> Option<&'a str> {
	let rest = line.trim_start().strip_prefix("//")?.trim_start();
	let rest = strip_prefix_ignore_case(rest, name)?.trim_start();
	let value = rest.strip_prefix(':')?;

	Some(value.trim())
}

fn strip_prefix_ignore_case<'a>(value: &'a str, prefix: &str) -> Option<&'a str> {
	let head = value.get(..prefix.len())?;
	if head.eq_ignore_ascii_case(prefix) {
		value.get(prefix.len()..)
	} else {
		None
	}
}
