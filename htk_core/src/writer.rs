use std::io;
use std::path::Path;
use std::path::PathBuf;
use std::time::UNIX_EPOCH;

use crate::ErrorContext;
use crate::HtkError;
use crate::HtkResult;
use crate::normalize_to_crlf;

/// Write `content` to `output_path` with CRLF line endings.
///
/// The bytes go to a temp file beside the destination which is then renamed
/// over it. Missing parent directories are created first.
pub fn write_hotkey_file(output_path: &Path, content: &str) -> HtkResult<()> {
	write_atomically(output_path, content).map_err(|e| {
		HtkError::file_write("Unable to write the Hotkey file. Check the output path and permissions.")
			.with_details(e.to_string())
			.with_context(ErrorContext::destination(output_path))
	})?;

	tracing::debug!(path = %output_path.display(), "wrote hotkey file");
	Ok(())
}

fn write_atomically(output_path: &Path, content: &str) -> io::Result<()> {
	if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
		std::fs::create_dir_all(parent)?;
	}

	let temp_path = temp_path_beside(output_path, ".hotkey", "tmp");
	let result = std::fs::write(&temp_path, normalize_to_crlf(content))
		.and_then(|()| rename_with_overwrite(&temp_path, output_path));

	if result.is_err() {
		let _ = std::fs::remove_file(&temp_path);
	}

	result
}

/// Rename, retrying once after removing the destination when the platform
/// refuses to replace an existing file.
fn rename_with_overwrite(temp_path: &Path, output_path: &Path) -> io::Result<()> {
	match std::fs::rename(temp_path, output_path) {
		Ok(()) => Ok(()),
		Err(e) if matches!(e.kind(), io::ErrorKind::AlreadyExists | io::ErrorKind::PermissionDenied) => {
			match std::fs::remove_file(output_path) {
				Ok(()) => {}
				Err(e) if e.kind() == io::ErrorKind::NotFound => {}
				Err(e) => return Err(e),
			}
			std::fs::rename(temp_path, output_path)
		}
		Err(e) => Err(e),
	}
}

/// A unique sibling path such as `.hotkey-1234-1700000000000-0.tmp`.
pub(crate) fn temp_path_beside(target: &Path, prefix: &str, extension: &str) -> PathBuf {
	let directory = target.parent().unwrap_or_else(|| Path::new(""));
	directory.join(format!("{prefix}-{}.{extension}", unique_suffix()))
}

/// `<pid>-<nanos>-<sequence>`, distinct across processes and across calls.
pub(crate) fn unique_suffix() -> String {
	use std::sync::atomic::AtomicU64;
	use std::sync::atomic::Ordering;

	static COUNTER: AtomicU64 = AtomicU64::new(0);

	let nanos = std::time::SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.map_or(0, |duration| duration.as_nanos());
	let sequence = COUNTER.fetch_add(1, Ordering::Relaxed);

	format!("{}-{nanos}-{sequence}", std::process::id())
}
