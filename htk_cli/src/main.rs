use std::io;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::process;
use std::sync::mpsc;
use std::time::Duration;

use chrono::Local;
use clap::Parser;
use htk_cli::BuildArgs;
use htk_cli::Commands;
use htk_cli::HtkCli;
use htk_cli::ImportArgs;
use htk_cli::OutputFormat;
use htk_core::AnyEmptyResult;
use htk_core::AnyError;
use htk_core::AnyResult;
use htk_core::CONFIG_FILE_CANDIDATES;
use htk_core::ConflictInfo;
use htk_core::ConflictStrategy;
use htk_core::ErrorKind;
use htk_core::HtkConfig;
use htk_core::HtkError;
use htk_core::HtkResult;
use htk_core::ImportOptions;
use htk_core::ImportOutcome;
use htk_core::KEYMAP_FILE_NAME;
use htk_core::MemoryReporter;
use htk_core::PlaceholderKind;
use htk_core::Reporter;
use htk_core::RoundTripReport;
use htk_core::Settings;
use htk_core::SettingsOverrides;
use htk_core::compile_hotkeys;
use htk_core::discover_workspace_inputs;
use htk_core::format_conflicts;
use htk_core::import_hotkey_file;
use htk_core::is_ignored;
use htk_core::is_script_file;
use htk_core::load_script_files;
use htk_core::parse_keymap_file;
use htk_core::verify_round_trip;
use notify::Watcher;
use owo_colors::OwoColorize;
use serde_json::json;
use similar::ChangeTag;
use similar::TextDiff;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

static USE_COLOR: std::sync::atomic::AtomicBool = std::sync::atomic::AtomicBool::new(true);

fn color_enabled() -> bool {
	USE_COLOR.load(std::sync::atomic::Ordering::Relaxed)
}

/// Apply ANSI color codes only when color is enabled.
macro_rules! colored {
	($text:expr,red) => {
		if color_enabled() {
			format!("{}", $text.red())
		} else {
			format!("{}", $text)
		}
	};
	($text:expr,green) => {
		if color_enabled() {
			format!("{}", $text.green())
		} else {
			format!("{}", $text)
		}
	};
	($text:expr,yellow) => {
		if color_enabled() {
			format!("{}", $text.yellow())
		} else {
			format!("{}", $text)
		}
	};
	($text:expr,bold) => {
		if color_enabled() {
			format!("{}", $text.bold())
		} else {
			format!("{}", $text)
		}
	};
	($text:expr,dimmed) => {
		if color_enabled() {
			format!("{}", $text.dimmed())
		} else {
			format!("{}", $text)
		}
	};
}

/// Environment variable holding a `tracing` filter directive.
const LOG_ENV: &str = "HTK_LOG";

fn main() {
	let args = HtkCli::parse();

	// Respect NO_COLOR env var and --no-color flag.
	let use_color = !args.no_color && std::env::var_os("NO_COLOR").is_none();
	if !use_color {
		USE_COLOR.store(false, std::sync::atomic::Ordering::Relaxed);
	}

	miette::set_hook(Box::new(move |_| {
		Box::new(
			miette::MietteHandlerOpts::new()
				.color(use_color)
				.unicode(use_color)
				.build(),
		)
	}))
	.ok();

	init_tracing(args.verbose, use_color);

	let result = match &args.command {
		Some(Commands::Init) => run_init(&args),
		Some(Commands::Build(build)) => run_build(&args, build),
		Some(Commands::Import(import)) => run_import(&args, import),
		Some(Commands::Verify { source, diff }) => run_verify(&args, source, *diff),
		Some(Commands::Info { format }) => run_info(&args, *format),
		None => {
			eprintln!("No subcommand specified. Run `htk --help` for usage.");
			process::exit(1);
		}
	};

	if let Err(e) = result {
		process::exit(report_error(e));
	}
}

/// Diagnostics go to stderr so that stdout stays clean for `--format json`.
fn init_tracing(verbose: bool, use_color: bool) {
	let default_directive = if verbose {
		"htk=debug,htk_core=debug"
	} else {
		"error"
	};
	let filter =
		EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default_directive));

	tracing_subscriber::registry()
		.with(filter)
		.with(
			fmt::layer()
				.with_target(false)
				.with_ansi(use_color)
				.with_writer(io::stderr),
		)
		.try_init()
		.ok();
}

/// Print an error and return the process exit code for it.
///
/// A canceled import is a decision, not a failure, and exits with `1`.
fn report_error(error: AnyError) -> i32 {
	match error.downcast::<HtkError>() {
		Ok(htk_err) => {
			let exit_code = if htk_err.kind() == ErrorKind::ImportCanceled {
				1
			} else {
				2
			};
			let details = htk_err.details().map(ToString::to_string);
			let context = htk_err.context().to_string();

			let report: miette::Report = (*htk_err).into();
			eprintln!("{report:?}");
			if let Some(details) = details {
				eprintln!("  {details}");
			}
			if !context.is_empty() {
				eprintln!("  {}", colored!(context, dimmed));
			}
			exit_code
		}
		Err(e) => {
			eprintln!("{} {e}", colored!("error:", red));
			2
		}
	}
}

fn resolve_root(args: &HtkCli) -> PathBuf {
	args.path
		.clone()
		.unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
}

fn print_section(title: &str) {
	println!();
	println!("{}", colored!(title, bold));
}

fn print_field(label: &str, value: impl std::fmt::Display) {
	println!("{label:<28} {value}");
}

/// Make a path relative to root for display purposes.
fn make_relative(path: &Path, root: &Path) -> String {
	path.strip_prefix(root)
		.unwrap_or(path)
		.display()
		.to_string()
}

/// Ask a yes/no question on stderr. End of input counts as "no".
fn confirm(question: &str) -> io::Result<bool> {
	eprint!("{question} [y/N] ");
	io::stderr().flush()?;

	let mut answer = String::new();
	if io::stdin().read_line(&mut answer)? == 0 {
		eprintln!();
		return Ok(false);
	}

	Ok(matches!(
		answer.trim().to_ascii_lowercase().as_str(),
		"y" | "yes"
	))
}

/// Prints stage messages for humans. Info lines only appear with `--verbose`.
struct ConsoleReporter {
	verbose: bool,
}

impl Reporter for ConsoleReporter {
	fn info(&mut self, message: &str) {
		if self.verbose {
			println!("{}", colored!(message, dimmed));
		}
	}

	fn warn(&mut self, message: &str) {
		eprintln!("{} {message}", colored!("warning:", yellow));
	}
}

fn run_init(args: &HtkCli) -> AnyEmptyResult {
	let root = resolve_root(args);
	let keymap_path = root.join(KEYMAP_FILE_NAME);
	let script_path = root.join("hotkeys").join("example.das");
	let config_path = root.join("htk.toml");

	let keymap_exists = keymap_path.exists();

	if keymap_exists {
		println!("Keymap already exists: {}", keymap_path.display());
	} else {
		let sample_keymap = "# Each entry binds a key combination to a script in this workspace.\n- id: \
		                     example\n  key: Ctrl+Shift+E\n  label: Example\n  scriptPath: \
		                     hotkeys/example.das\n";

		std::fs::write(&keymap_path, sample_keymap)?;
		println!("Created keymap: {}", keymap_path.display());
	}

	if script_path.exists() {
		println!("Script already exists: {}", script_path.display());
	} else {
		let sample_script = "// Group: Examples\n// Cancel every open order for the current \
		                     symbol.\nCXL ALL\n";

		if let Some(parent) = script_path.parent() {
			std::fs::create_dir_all(parent)?;
		}
		std::fs::write(&script_path, sample_script)?;
		println!("Created script: {}", script_path.display());
	}

	if !config_path.exists() {
		let sample_config = "# htk configuration\n\n# Where `htk build` writes the compiled \
		                     file.\noutput = \"build/Hotkey.htk\"\n\n# Insert a timestamp into \
		                     the output file name.\n# append_timestamp = true\n\n# Values \
		                     substituted for %%LIVE%% and %%SIMULATED%% in scripts.\n# \
		                     [accounts]\n# live = \"U1234567\"\n# simulated = \"TRPAPER1\"\n\n# \
		                     Extra directories and gitignore-style patterns to skip.\n# \
		                     [exclude]\n# dirs = [\"archive\"]\n# patterns = [\"drafts/\"]\n";

		std::fs::write(&config_path, sample_config)?;
		println!("Created htk.toml");
	}

	if !keymap_exists {
		println!();
		println!("Next steps:");
		println!("  1. Write your scripts as .das files under hotkeys/");
		println!("  2. Bind each script to a key in {}", keymap_path.display());
		println!("  3. Run `htk build` to produce Hotkey.htk");
	}

	Ok(())
}

fn run_build(args: &HtkCli, build: &BuildArgs) -> AnyEmptyResult {
	let built = run_build_once(args, build, build.force || build.watch)?;

	if !build.watch {
		if !built {
			process::exit(1);
		}
		return Ok(());
	}

	println!("\nWatching for file changes... (press Ctrl+C to stop)");

	let root = resolve_root(args);
	let (tx, rx) = mpsc::channel();

	let mut watcher =
		notify::recommended_watcher(move |res: Result<notify::Event, notify::Error>| {
			if let Ok(event) = res {
				let relevant = matches!(
					event.kind,
					notify::EventKind::Modify(_)
						| notify::EventKind::Create(_)
						| notify::EventKind::Remove(_)
				) && event.paths.iter().any(|path| is_workspace_input(path));

				if relevant {
					tracing::debug!(paths = ?event.paths, "workspace input changed");
					let _ = tx.send(());
				}
			}
		})?;

	watcher.watch(&root, notify::RecursiveMode::Recursive)?;

	loop {
		rx.recv()?;
		// Debounce: drain additional events within 200ms.
		while rx.recv_timeout(Duration::from_millis(200)).is_ok() {}

		println!("\nFile change detected, rebuilding...");
		if let Err(e) = run_build_once(args, build, true) {
			report_error(e);
		}
	}
}

/// Scripts, the keymap, and config files. The compiled output never matches,
/// so a rebuild cannot trigger itself.
fn is_workspace_input(path: &Path) -> bool {
	if is_script_file(path) {
		return true;
	}

	let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
		return false;
	};

	name == KEYMAP_FILE_NAME
		|| CONFIG_FILE_CANDIDATES
			.iter()
			.any(|candidate| Path::new(candidate).file_name().is_some_and(|file| file == name))
}

/// Run a single build. Returns `false` when the user declined to overwrite an
/// existing output file.
fn run_build_once(args: &HtkCli, build: &BuildArgs, overwrite: bool) -> AnyResult<bool> {
	let root = resolve_root(args);
	let settings = Settings::load(
		&root,
		SettingsOverrides {
			output: build.output.clone(),
			live_account: build.live_account.clone(),
			simulated_account: build.simulated_account.clone(),
			fail_on_missing_placeholders: build.strict_placeholders,
			strict_length: false,
			append_timestamp: build.timestamp,
		},
	)?;
	let options = settings.compile_options(Local::now().naive_local())?;
	let display_output = make_relative(&options.output_path, &root);
	tracing::debug!(output = %options.output_path.display(), "resolved build output");

	if options.output_path.exists()
		&& !overwrite
		&& !confirm(&format!("{display_output} already exists. Overwrite?"))?
	{
		println!("Build canceled. {display_output} was left unchanged.");
		return Ok(false);
	}

	let mut console = ConsoleReporter {
		verbose: args.verbose,
	};
	let mut memory = MemoryReporter::new();
	let reporter: &mut dyn Reporter = match build.format {
		OutputFormat::Text => &mut console,
		OutputFormat::Json => &mut memory,
	};

	let result = compile_hotkeys(&options, reporter)?;

	match build.format {
		OutputFormat::Text => {
			println!(
				"{} {} hotkey(s) into {display_output}",
				colored!("Built", green),
				result.hotkeys.len()
			);
			if !result.ignored_scripts.is_empty() {
				println!(
					"Ignored {} script(s) tagged `// Ignore: True`.",
					result.ignored_scripts.len()
				);
			}
		}
		OutputFormat::Json => {
			let hotkeys = result
				.hotkeys
				.iter()
				.map(|hotkey| {
					json!({
						"id": hotkey.id,
						"key": hotkey.key,
						"label": hotkey.label,
						"scriptPath": make_relative(&hotkey.source_path, &root),
						"scriptLength": hotkey.script_length,
					})
				})
				.collect::<Vec<_>>();
			let warnings = result
				.warnings
				.iter()
				.map(|warning| {
					json!({
						"code": warning.code.as_str(),
						"message": warning.message,
						"sourcePath": warning.source_path.as_ref().map(|path| make_relative(path, &root)),
					})
				})
				.collect::<Vec<_>>();
			let placeholders = result
				.placeholder_warnings
				.iter()
				.map(|warning| {
					json!({
						"token": warning.kind.token(),
						"setting": warning.kind.label(),
						"affectedScripts": warning
							.affected_scripts
							.iter()
							.map(|path| make_relative(path, &root))
							.collect::<Vec<_>>(),
					})
				})
				.collect::<Vec<_>>();
			let ignored = result
				.ignored_scripts
				.iter()
				.map(|path| make_relative(path, &root))
				.collect::<Vec<_>>();

			let output = json!({
				"ok": true,
				"outputPath": display_output,
				"hotkeys": hotkeys,
				"warnings": warnings,
				"missingPlaceholders": placeholders,
				"ignoredScripts": ignored,
				"messages": memory.lines().iter().map(|line| line.message.as_str()).collect::<Vec<_>>(),
			});
			println!("{}", serde_json::to_string_pretty(&output)?);
		}
	}

	Ok(true)
}

fn run_import(args: &HtkCli, import: &ImportArgs) -> AnyEmptyResult {
	let root = resolve_root(args);
	let settings = Settings::load(
		&root,
		SettingsOverrides {
			strict_length: import.strict_length,
			..SettingsOverrides::default()
		},
	)?;
	let options = ImportOptions {
		source_path: import.source.clone(),
		destination_root: root.clone(),
		strict_length: settings.strict_length,
		conflict_strategy: import.on_conflict.map(ConflictStrategy::from),
	};

	let format = import.format;
	let mut resolver = |conflicts: &[ConflictInfo]| {
		// Text mode already listed the conflicts through the reporter.
		if format == OutputFormat::Json {
			eprintln!(
				"{} existing file(s) would be overwritten:\n{}",
				conflicts.len(),
				format_conflicts(conflicts)
			);
		}
		prompt_conflict_strategy()
	};

	let mut console = ConsoleReporter {
		verbose: args.verbose,
	};
	let mut memory = MemoryReporter::new();
	let reporter: &mut dyn Reporter = match format {
		OutputFormat::Text => &mut console,
		OutputFormat::Json => &mut memory,
	};

	let outcome = import_hotkey_file(&options, &mut resolver, reporter)?;
	let round_trip = if import.verify {
		Some(verify_round_trip(
			&import.source,
			&root,
			&settings.discovery,
			reporter,
		)?)
	} else {
		None
	};
	let verified = round_trip.as_ref().map(RoundTripReport::matched);

	match format {
		OutputFormat::Text => print_import_summary(&outcome, round_trip.as_ref(), &root),
		OutputFormat::Json => {
			let scripts = outcome
				.entries
				.iter()
				.map(|entry| {
					json!({
						"id": entry.id,
						"key": entry.key,
						"label": entry.label,
						"scriptPath": entry.script_path,
						"group": entry.group,
					})
				})
				.collect::<Vec<_>>();
			let warnings = outcome
				.warnings
				.iter()
				.map(|warning| {
					json!({
						"message": warning.message,
						"record": warning.record_index,
						"line": warning.line,
						"key": warning.key,
						"label": warning.label,
					})
				})
				.collect::<Vec<_>>();
			let skipped = outcome
				.result
				.skipped_script_paths
				.iter()
				.map(|path| make_relative(path, &root))
				.collect::<Vec<_>>();

			let output = json!({
				"ok": verified.unwrap_or(true),
				"keymapPath": make_relative(&outcome.result.keymap_path, &root),
				"scripts": scripts,
				"skippedScripts": skipped,
				"conflicts": outcome.conflicts.len(),
				"strategy": strategy_name(outcome.strategy),
				"warnings": warnings,
				"verified": verified,
				"messages": memory.lines().iter().map(|line| line.message.as_str()).collect::<Vec<_>>(),
			});
			println!("{}", serde_json::to_string_pretty(&output)?);
		}
	}

	if verified == Some(false) {
		process::exit(1);
	}

	Ok(())
}

fn print_import_summary(outcome: &ImportOutcome, round_trip: Option<&RoundTripReport>, root: &Path) {
	let written = outcome.result.written_script_paths.len();
	println!(
		"{} {written} script(s) into {}",
		colored!("Imported", green),
		root.display()
	);
	println!(
		"Wrote {}",
		make_relative(&outcome.result.keymap_path, root)
	);

	let skipped = outcome.result.skipped_script_paths.len();
	if skipped > 0 {
		println!("Kept {skipped} existing script(s).");
	}

	if !outcome.warnings.is_empty() {
		println!(
			"{} length mismatch warning(s). Run `htk verify` to confirm the workspace rebuilds \
			 the file.",
			outcome.warnings.len()
		);
	}

	if let Some(report) = round_trip {
		match &report.mismatch {
			None => println!("{}", colored!("Round-trip verification passed.", green)),
			Some(mismatch) => {
				eprintln!("{}", colored!("Round-trip verification failed.", red));
				eprintln!("{mismatch}");
			}
		}
	}
}

/// Ask how to handle conflicting files. End of input cancels.
fn prompt_conflict_strategy() -> ConflictStrategy {
	eprint!("Overwrite, skip existing scripts, or cancel? [o/s/C] ");
	let _ = io::stderr().flush();

	let mut answer = String::new();
	match io::stdin().read_line(&mut answer) {
		Ok(0) | Err(_) => {
			eprintln!();
			ConflictStrategy::Cancel
		}
		Ok(_) => {
			match answer.trim().to_ascii_lowercase().as_str() {
				"o" | "overwrite" => ConflictStrategy::Overwrite,
				"s" | "skip" => ConflictStrategy::Skip,
				_ => ConflictStrategy::Cancel,
			}
		}
	}
}

fn strategy_name(strategy: ConflictStrategy) -> &'static str {
	match strategy {
		ConflictStrategy::Overwrite => "overwrite",
		ConflictStrategy::Skip => "skip",
		ConflictStrategy::Cancel => "cancel",
	}
}

fn run_verify(args: &HtkCli, source: &Path, show_diff: bool) -> AnyEmptyResult {
	let root = resolve_root(args);
	let settings = Settings::load(&root, SettingsOverrides::default())?;
	let mut reporter = ConsoleReporter {
		verbose: args.verbose,
	};

	let report = verify_round_trip(source, &root, &settings.discovery, &mut reporter)?;

	match &report.mismatch {
		None => {
			println!(
				"{} {} rebuilds byte for byte from {}",
				colored!("Verified:", green),
				source.display(),
				root.display()
			);
			Ok(())
		}
		Some(mismatch) => {
			eprintln!("{}", colored!("Round-trip verification failed.", red));
			eprintln!("{mismatch}");
			if show_diff {
				eprintln!();
				print_diff(&report.original, &report.rebuilt);
			}
			process::exit(1);
		}
	}
}

fn print_diff(original: &str, rebuilt: &str) {
	let diff = TextDiff::from_lines(original, rebuilt);
	for change in diff.iter_all_changes() {
		match change.tag() {
			ChangeTag::Delete => {
				eprint!("  {}", colored!(format!("-{change}"), red));
			}
			ChangeTag::Insert => {
				eprint!("  {}", colored!(format!("+{change}"), green));
			}
			ChangeTag::Equal => {
				eprint!("   {change}");
			}
		}
		if change.missing_newline() {
			eprintln!();
		}
	}
}

struct WorkspaceSummary {
	keymap_path: PathBuf,
	script_count: usize,
	keymap_entries: usize,
	ignored_scripts: Vec<PathBuf>,
}

fn summarize_workspace(root: &Path, settings: &Settings) -> HtkResult<WorkspaceSummary> {
	let inputs = discover_workspace_inputs(root, &settings.discovery)?;
	let entries = parse_keymap_file(&inputs.keymap_path, root, &inputs.script_paths)?;
	let contents = load_script_files(&inputs.script_paths, settings.discovery.max_files)?;
	let ignored_scripts = inputs
		.script_paths
		.iter()
		.filter(|path| contents.get(*path).is_some_and(|text| is_ignored(text)))
		.cloned()
		.collect();

	Ok(WorkspaceSummary {
		keymap_path: inputs.keymap_path,
		script_count: inputs.script_paths.len(),
		keymap_entries: entries.len(),
		ignored_scripts,
	})
}

fn run_info(args: &HtkCli, format: OutputFormat) -> AnyEmptyResult {
	let root = resolve_root(args);
	let config_path = HtkConfig::resolve_path(&root);
	let settings = Settings::load(&root, SettingsOverrides::default())?;
	let summary = summarize_workspace(&root, &settings);
	let placeholder_value = |kind: PlaceholderKind| {
		settings
			.placeholder_values
			.value(kind)
			.map(ToString::to_string)
	};

	if format == OutputFormat::Json {
		let (workspace, error) = match &summary {
			Ok(summary) => {
				(
					json!({
						"keymapPath": make_relative(&summary.keymap_path, &root),
						"scripts": summary.script_count,
						"keymapEntries": summary.keymap_entries,
						"ignoredScripts": summary
							.ignored_scripts
							.iter()
							.map(|path| make_relative(path, &root))
							.collect::<Vec<_>>(),
					}),
					None,
				)
			}
			Err(e) => (serde_json::Value::Null, Some(e.to_string())),
		};
		let output = json!({
			"root": root.display().to_string(),
			"configPath": config_path.as_ref().map(|path| make_relative(path, &root)),
			"outputPath": settings.output_path.as_ref().map(|path| make_relative(path, &root)),
			"appendTimestamp": settings.append_timestamp,
			"failOnMissingPlaceholders": settings.fail_on_missing_placeholders,
			"accounts": {
				"live": placeholder_value(PlaceholderKind::Live),
				"simulated": placeholder_value(PlaceholderKind::Simulated),
			},
			"workspace": workspace,
			"error": error,
		});
		println!("{}", serde_json::to_string_pretty(&output)?);
		return Ok(());
	}

	println!("{}", colored!("htk info", bold));

	print_section("Workspace");
	print_field("Root", root.display());
	print_field(
		"Resolved config",
		config_path.as_ref().map_or_else(
			|| "(none)".to_string(),
			|path| make_relative(path, &root),
		),
	);
	print_field(
		"Output path",
		settings.output_path.as_ref().map_or_else(
			|| "(not set)".to_string(),
			|path| make_relative(path, &root),
		),
	);
	print_field(
		"Append timestamp",
		if settings.append_timestamp { "yes" } else { "no" },
	);

	print_section("Scripts");
	match &summary {
		Ok(summary) => {
			print_field("Keymap", make_relative(&summary.keymap_path, &root));
			print_field("Scripts discovered", summary.script_count);
			print_field("Keymap entries", summary.keymap_entries);
			print_field("Ignored scripts", summary.ignored_scripts.len());
			for path in &summary.ignored_scripts {
				println!("  - {}", make_relative(path, &root));
			}
		}
		Err(e) => {
			print_field("Workspace error", colored!(e.message(), red));
		}
	}

	print_section("Placeholders");
	for kind in PlaceholderKind::ALL {
		let value = placeholder_value(kind).unwrap_or_else(|| "(not set)".to_string());
		print_field(&format!("{} ({})", kind.label(), kind.token()), value);
	}
	print_field(
		"Fail on missing",
		if settings.fail_on_missing_placeholders {
			"yes"
		} else {
			"no"
		},
	);

	Ok(())
}
