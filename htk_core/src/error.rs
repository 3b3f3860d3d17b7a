use std::fmt;
use std::path::Path;
use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

/// Structured location attached to an [`HtkError`].
///
/// Every field is optional: compile errors usually know an `id`, `key` and
/// `source_path`, import errors usually know a record index and line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorContext {
	/// 1-indexed record position within a `Hotkey.htk` file.
	pub record_index: Option<usize>,
	/// 1-indexed line number within a `Hotkey.htk` file.
	pub line: Option<usize>,
	pub id: Option<String>,
	pub key: Option<String>,
	pub label: Option<String>,
	pub source_path: Option<PathBuf>,
	pub destination_path: Option<PathBuf>,
}

impl ErrorContext {
	/// Context for a record found at `line` in an imported file.
	pub fn record(record_index: usize, line: usize) -> Self {
		Self {
			record_index: Some(record_index),
			line: Some(line),
			..Self::default()
		}
	}

	/// Context pointing at a single line of an imported file.
	pub fn line(line: usize) -> Self {
		Self {
			line: Some(line),
			..Self::default()
		}
	}

	/// Context pointing at a file on disk.
	pub fn source(path: impl AsRef<Path>) -> Self {
		Self {
			source_path: Some(path.as_ref().to_path_buf()),
			..Self::default()
		}
	}

	/// Context pointing at a destination path for writes.
	pub fn destination(path: impl AsRef<Path>) -> Self {
		Self {
			destination_path: Some(path.as_ref().to_path_buf()),
			..Self::default()
		}
	}

	#[must_use]
	pub fn with_id(mut self, id: impl Into<String>) -> Self {
		self.id = Some(id.into());
		self
	}

	#[must_use]
	pub fn with_key(mut self, key: impl Into<String>) -> Self {
		self.key = Some(key.into());
		self
	}

	#[must_use]
	pub fn with_label(mut self, label: impl Into<String>) -> Self {
		self.label = Some(label.into());
		self
	}

	#[must_use]
	pub fn with_source_path(mut self, path: impl AsRef<Path>) -> Self {
		self.source_path = Some(path.as_ref().to_path_buf());
		self
	}

	#[must_use]
	pub fn with_destination_path(mut self, path: impl AsRef<Path>) -> Self {
		self.destination_path = Some(path.as_ref().to_path_buf());
		self
	}

	/// Returns true when no field is populated.
	pub fn is_empty(&self) -> bool {
		*self == Self::default()
	}
}

impl fmt::Display for ErrorContext {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let mut parts = Vec::new();
		if let Some(index) = self.record_index {
			parts.push(format!("record={index}"));
		}
		if let Some(line) = self.line {
			parts.push(format!("line={line}"));
		}
		if let Some(id) = &self.id {
			parts.push(format!("id={id}"));
		}
		if let Some(key) = &self.key {
			parts.push(format!("key={key}"));
		}
		if let Some(label) = &self.label {
			parts.push(format!("label={label}"));
		}
		if let Some(path) = &self.source_path {
			parts.push(format!("path={}", path.display()));
		}
		if let Some(path) = &self.destination_path {
			parts.push(format!("destination={}", path.display()));
		}
		f.write_str(&parts.join(" | "))
	}
}

/// Payload carried by every [`HtkError`] variant.
#[derive(Debug, Clone, Default)]
pub struct ErrorInfo {
	/// Short, user-facing message.
	pub message: String,
	/// Optional technical detail (paths, counts, offending values).
	pub details: Option<String>,
	pub context: ErrorContext,
}

/// Stable error kinds. The string codes are part of the public surface and
/// must not change between releases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
	Configuration,
	Discovery,
	Keymap,
	Script,
	Validation,
	TemplateRender,
	FileWrite,
	ImportInput,
	ImportParse,
	ImportDecode,
	ImportNaming,
	ImportConflict,
	ImportWrite,
	ImportVerify,
	ImportCanceled,
}

impl ErrorKind {
	pub fn code(self) -> &'static str {
		match self {
			Self::Configuration => "CONFIGURATION_ERROR",
			Self::Discovery => "DISCOVERY_ERROR",
			Self::Keymap => "KEYMAP_ERROR",
			Self::Script => "SCRIPT_ERROR",
			Self::Validation => "VALIDATION_ERROR",
			Self::TemplateRender => "TEMPLATE_RENDER_ERROR",
			Self::FileWrite => "FILE_WRITE_ERROR",
			Self::ImportInput => "IMPORT_INPUT_ERROR",
			Self::ImportParse => "IMPORT_PARSE_ERROR",
			Self::ImportDecode => "IMPORT_DECODE_ERROR",
			Self::ImportNaming => "IMPORT_NAMING_ERROR",
			Self::ImportConflict => "IMPORT_CONFLICT_ERROR",
			Self::ImportWrite => "IMPORT_WRITE_ERROR",
			Self::ImportVerify => "IMPORT_VERIFY_ERROR",
			Self::ImportCanceled => "IMPORT_CANCELED",
		}
	}

	/// Whether this kind belongs to the import side of the tool.
	pub fn is_import(self) -> bool {
		matches!(
			self,
			Self::ImportInput
				| Self::ImportParse
				| Self::ImportDecode
				| Self::ImportNaming
				| Self::ImportConflict
				| Self::ImportWrite
				| Self::ImportVerify
				| Self::ImportCanceled
		)
	}
}

impl fmt::Display for ErrorKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.code())
	}
}

#[derive(Debug, Diagnostic, Error)]
#[non_exhaustive]
pub enum HtkError {
	#[error("{}", .0.message)]
	#[diagnostic(
		code(htk::configuration),
		help("set `output` in htk.toml or pass `--output`")
	)]
	Configuration(Box<ErrorInfo>),

	#[error("{}", .0.message)]
	#[diagnostic(
		code(htk::discovery),
		help("the workspace root needs a non-empty keymap.yaml and at least one .das script")
	)]
	Discovery(Box<ErrorInfo>),

	#[error("{}", .0.message)]
	#[diagnostic(
		code(htk::keymap),
		help("every keymap entry needs an id, a label, and a scriptPath matching exactly one .das file")
	)]
	Keymap(Box<ErrorInfo>),

	#[error("{}", .0.message)]
	#[diagnostic(code(htk::script))]
	Script(Box<ErrorInfo>),

	#[error("{}", .0.message)]
	#[diagnostic(code(htk::validation))]
	Validation(Box<ErrorInfo>),

	#[error("{}", .0.message)]
	#[diagnostic(
		code(htk::template_render),
		help("keys cannot contain `:` or whitespace and labels cannot contain `:` or line breaks")
	)]
	TemplateRender(Box<ErrorInfo>),

	#[error("{}", .0.message)]
	#[diagnostic(
		code(htk::file_write),
		help("check the output path and its permissions")
	)]
	FileWrite(Box<ErrorInfo>),

	#[error("{}", .0.message)]
	#[diagnostic(
		code(htk::import_input),
		help("expected a line formatted as `Key:Label:~ length:encodedScript`")
	)]
	ImportInput(Box<ErrorInfo>),

	#[error("{}", .0.message)]
	#[diagnostic(code(htk::import_parse))]
	ImportParse(Box<ErrorInfo>),

	#[error("{}", .0.message)]
	#[diagnostic(code(htk::import_decode))]
	ImportDecode(Box<ErrorInfo>),

	#[error("{}", .0.message)]
	#[diagnostic(
		code(htk::import_naming),
		help("give the record a label or key containing at least one letter or digit")
	)]
	ImportNaming(Box<ErrorInfo>),

	#[error("{}", .0.message)]
	#[diagnostic(
		code(htk::import_conflict),
		help("re-run with `--on-conflict overwrite` or choose an empty destination")
	)]
	ImportConflict(Box<ErrorInfo>),

	#[error("{}", .0.message)]
	#[diagnostic(
		code(htk::import_write),
		help("the destination was restored to its previous state")
	)]
	ImportWrite(Box<ErrorInfo>),

	#[error("{}", .0.message)]
	#[diagnostic(code(htk::import_verify))]
	ImportVerify(Box<ErrorInfo>),

	#[error("{}", .0.message)]
	#[diagnostic(code(htk::import_canceled))]
	ImportCanceled(Box<ErrorInfo>),
}

impl HtkError {
	/// Create an error of the given kind with a user-facing message.
	pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
		let info = Box::new(ErrorInfo {
			message: message.into(),
			..ErrorInfo::default()
		});

		match kind {
			ErrorKind::Configuration => Self::Configuration(info),
			ErrorKind::Discovery => Self::Discovery(info),
			ErrorKind::Keymap => Self::Keymap(info),
			ErrorKind::Script => Self::Script(info),
			ErrorKind::Validation => Self::Validation(info),
			ErrorKind::TemplateRender => Self::TemplateRender(info),
			ErrorKind::FileWrite => Self::FileWrite(info),
			ErrorKind::ImportInput => Self::ImportInput(info),
			ErrorKind::ImportParse => Self::ImportParse(info),
			ErrorKind::ImportDecode => Self::ImportDecode(info),
			ErrorKind::ImportNaming => Self::ImportNaming(info),
			ErrorKind::ImportConflict => Self::ImportConflict(info),
			ErrorKind::ImportWrite => Self::ImportWrite(info),
			ErrorKind::ImportVerify => Self::ImportVerify(info),
			ErrorKind::ImportCanceled => Self::ImportCanceled(info),
		}
	}

	pub fn configuration(message: impl Into<String>) -> Self {
		Self::new(ErrorKind::Configuration, message)
	}

	pub fn discovery(message: impl Into<String>) -> Self {
		Self::new(ErrorKind::Discovery, message)
	}

	pub fn keymap(message: impl Into<String>) -> Self {
		Self::new(ErrorKind::Keymap, message)
	}

	pub fn script(message: impl Into<String>) -> Self {
		Self::new(ErrorKind::Script, message)
	}

	pub fn validation(message: impl Into<String>) -> Self {
		Self::new(ErrorKind::Validation, message)
	}

	pub fn template_render(message: impl Into<String>) -> Self {
		Self::new(ErrorKind::TemplateRender, message)
	}

	pub fn file_write(message: impl Into<String>) -> Self {
		Self::new(ErrorKind::FileWrite, message)
	}

	pub fn import_input(message: impl Into<String>) -> Self {
		Self::new(ErrorKind::ImportInput, message)
	}

	pub fn import_parse(message: impl Into<String>) -> Self {
		Self::new(ErrorKind::ImportParse, message)
	}

	pub fn import_decode(message: impl Into<String>) -> Self {
		Self::new(ErrorKind::ImportDecode, message)
	}

	pub fn import_naming(message: impl Into<String>) -> Self {
		Self::new(ErrorKind::ImportNaming, message)
	}

	pub fn import_conflict(message: impl Into<String>) -> Self {
		Self::new(ErrorKind::ImportConflict, message)
	}

	pub fn import_write(message: impl Into<String>) -> Self {
		Self::new(ErrorKind::ImportWrite, message)
	}

	pub fn import_verify(message: impl Into<String>) -> Self {
		Self::new(ErrorKind::ImportVerify, message)
	}

	pub fn import_canceled(message: impl Into<String>) -> Self {
		Self::new(ErrorKind::ImportCanceled, message)
	}

	/// Attach technical detail.
	#[must_use]
	pub fn with_details(mut self, details: impl Into<String>) -> Self {
		self.info_mut().details = Some(details.into());
		self
	}

	/// Attach structured context.
	#[must_use]
	pub fn with_context(mut self, context: ErrorContext) -> Self {
		self.info_mut().context = context;
		self
	}

	pub fn kind(&self) -> ErrorKind {
		match self {
			Self::Configuration(_) => ErrorKind::Configuration,
			Self::Discovery(_) => ErrorKind::Discovery,
			Self::Keymap(_) => ErrorKind::Keymap,
			Self::Script(_) => ErrorKind::Script,
			Self::Validation(_) => ErrorKind::Validation,
			Self::TemplateRender(_) => ErrorKind::TemplateRender,
			Self::FileWrite(_) => ErrorKind::FileWrite,
			Self::ImportInput(_) => ErrorKind::ImportInput,
			Self::ImportParse(_) => ErrorKind::ImportParse,
			Self::ImportDecode(_) => ErrorKind::ImportDecode,
			Self::ImportNaming(_) => ErrorKind::ImportNaming,
			Self::ImportConflict(_) => ErrorKind::ImportConflict,
			Self::ImportWrite(_) => ErrorKind::ImportWrite,
			Self::ImportVerify(_) => ErrorKind::ImportVerify,
			Self::ImportCanceled(_) => ErrorKind::ImportCanceled,
		}
	}

	pub fn info(&self) -> &ErrorInfo {
		match self {
			Self::Configuration(info)
			| Self::Discovery(info)
			| Self::Keymap(info)
			| Self::Script(info)
			| Self::Validation(info)
			| Self::TemplateRender(info)
			| Self::FileWrite(info)
			| Self::ImportInput(info)
			| Self::ImportParse(info)
			| Self::ImportDecode(info)
			| Self::ImportNaming(info)
			| Self::ImportConflict(info)
			| Self::ImportWrite(info)
			| Self::ImportVerify(info)
			| Self::ImportCanceled(info) => info,
		}
	}

	fn info_mut(&mut self) -> &mut ErrorInfo {
		match self {
			Self::Configuration(info)
			| Self::Discovery(info)
			| Self::Keymap(info)
			| Self::Script(info)
			| Self::Validation(info)
			| Self::TemplateRender(info)
			| Self::FileWrite(info)
			| Self::ImportInput(info)
			| Self::ImportParse(info)
			| Self::ImportDecode(info)
			| Self::ImportNaming(info)
			| Self::ImportConflict(info)
			| Self::ImportWrite(info)
			| Self::ImportVerify(info)
			| Self::ImportCanceled(info) => info,
		}
	}

	/// The short user-facing message.
	pub fn message(&self) -> &str {
		&self.info().message
	}

	pub fn details(&self) -> Option<&str> {
		self.info().details.as_deref()
	}

	pub fn context(&self) -> &ErrorContext {
		&self.info().context
	}
}

pub type HtkResult<T> = Result<T, HtkError>;
pub type AnyError = Box<dyn std::error::Error>;
pub type AnyEmptyResult = Result<(), AnyError>;
pub type AnyResult<T> = Result<T, AnyError>;
