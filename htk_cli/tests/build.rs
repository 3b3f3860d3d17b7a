mod common;

use clap::Parser;
use htk_cli::Commands;
use htk_cli::HtkCli;
use htk_cli::OutputFormat;
use htk_core::AnyEmptyResult;
use predicates::prelude::PredicateBooleanExt;
use rstest::rstest;
use serde_json::Value;

#[test]
fn build_writes_the_hotkey_file() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	common::write_workspace(tmp.path())?;

	common::htk_cmd()
		.arg("build")
		.arg("--path")
		.arg(tmp.path())
		.assert()
		.success()
		.stdout(predicates::str::contains("Built 2 hotkey(s)"))
		.stdout(predicates::str::contains("Hotkey.htk"));

	let output = std::fs::read_to_string(tmp.path().join("build/Hotkey.htk"))?;
	similar_asserts::assert_eq!(output, common::HOTKEY_FILE);

	Ok(())
}

#[test]
fn build_output_flag_overrides_config() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	common::write_workspace(tmp.path())?;

	common::htk_cmd()
		.arg("build")
		.arg("--path")
		.arg(tmp.path())
		.arg("--output")
		.arg("out/Custom.htk")
		.assert()
		.success();

	assert!(tmp.path().join("out/Custom.htk").exists());
	assert!(!tmp.path().join("build/Hotkey.htk").exists());

	Ok(())
}

#[test]
fn build_without_output_path_fails() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	common::write_workspace(tmp.path())?;
	std::fs::remove_file(tmp.path().join("htk.toml"))?;

	common::htk_cmd()
		.arg("build")
		.arg("--path")
		.arg(tmp.path())
		.assert()
		.code(2)
		.stderr(predicates::str::contains("Output path is required"));

	Ok(())
}

#[test]
fn build_reports_missing_keymap() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	common::write_file(tmp.path(), "hotkeys/buy.das", "CXL ALL")?;

	common::htk_cmd()
		.arg("build")
		.arg("--path")
		.arg(tmp.path())
		.arg("--output")
		.arg("Hotkey.htk")
		.assert()
		.code(2)
		.stderr(predicates::str::contains("keymap.yaml"));

	assert!(!tmp.path().join("Hotkey.htk").exists());

	Ok(())
}

#[test]
fn declining_the_overwrite_prompt_keeps_the_old_file() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	common::write_workspace(tmp.path())?;
	let output = common::write_file(tmp.path(), "build/Hotkey.htk", "old contents")?;

	common::htk_cmd()
		.arg("build")
		.arg("--path")
		.arg(tmp.path())
		.write_stdin("n\n")
		.assert()
		.code(1)
		.stderr(predicates::str::contains("Overwrite?"))
		.stdout(predicates::str::contains("Build canceled"));

	assert_eq!(std::fs::read_to_string(&output)?, "old contents");

	Ok(())
}

#[test]
fn end_of_input_declines_the_overwrite_prompt() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	common::write_workspace(tmp.path())?;
	let output = common::write_file(tmp.path(), "build/Hotkey.htk", "old contents")?;

	common::htk_cmd()
		.arg("build")
		.arg("--path")
		.arg(tmp.path())
		.write_stdin("")
		.assert()
		.code(1);

	assert_eq!(std::fs::read_to_string(&output)?, "old contents");

	Ok(())
}

#[rstest]
#[case::short("y\n")]
#[case::long("yes\n")]
#[case::uppercase("Y\n")]
fn accepting_the_overwrite_prompt_rebuilds(#[case] answer: &str) -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	common::write_workspace(tmp.path())?;
	let output = common::write_file(tmp.path(), "build/Hotkey.htk", "old contents")?;

	common::htk_cmd()
		.arg("build")
		.arg("--path")
		.arg(tmp.path())
		.write_stdin(answer)
		.assert()
		.success();

	assert_eq!(std::fs::read_to_string(&output)?, common::HOTKEY_FILE);

	Ok(())
}

#[test]
fn force_overwrites_without_asking() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	common::write_workspace(tmp.path())?;
	let output = common::write_file(tmp.path(), "build/Hotkey.htk", "old contents")?;

	common::htk_cmd()
		.arg("build")
		.arg("--path")
		.arg(tmp.path())
		.arg("--force")
		.write_stdin("")
		.assert()
		.success()
		.stderr(predicates::str::contains("Overwrite?").not());

	assert_eq!(std::fs::read_to_string(&output)?, common::HOTKEY_FILE);

	Ok(())
}

#[test]
fn account_flags_fill_placeholders() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	common::write_workspace(tmp.path())?;
	common::write_file(tmp.path(), "hotkeys/buy.das", "ROUTE %%LIVE%%")?;

	common::htk_cmd()
		.arg("build")
		.arg("--path")
		.arg(tmp.path())
		.arg("--live-account")
		.arg("U1234567")
		.assert()
		.success();

	let output = std::fs::read_to_string(tmp.path().join("build/Hotkey.htk"))?;
	assert!(output.starts_with("Ctrl+B:Buy:~ 14:ROUTE U1234567\r\n"));

	Ok(())
}

#[test]
fn missing_placeholder_values_warn_by_default() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	common::write_workspace(tmp.path())?;
	common::write_file(tmp.path(), "hotkeys/buy.das", "ROUTE %%LIVE%%")?;

	common::htk_cmd()
		.arg("build")
		.arg("--path")
		.arg(tmp.path())
		.assert()
		.success()
		.stderr(predicates::str::contains("warning:"))
		.stderr(predicates::str::contains("%%LIVE%%"));

	let output = std::fs::read_to_string(tmp.path().join("build/Hotkey.htk"))?;
	assert!(output.contains("%%LIVE%%"));

	Ok(())
}

#[test]
fn strict_placeholders_fail_the_build() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	common::write_workspace(tmp.path())?;
	common::write_file(tmp.path(), "hotkeys/buy.das", "ROUTE %%LIVE%%")?;

	common::htk_cmd()
		.arg("build")
		.arg("--path")
		.arg(tmp.path())
		.arg("--strict-placeholders")
		.assert()
		.code(2);

	assert!(!tmp.path().join("build/Hotkey.htk").exists());

	Ok(())
}

#[test]
fn timestamp_flag_renames_the_output() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	common::write_workspace(tmp.path())?;

	common::htk_cmd()
		.arg("build")
		.arg("--path")
		.arg(tmp.path())
		.arg("--timestamp")
		.assert()
		.success();

	let names = std::fs::read_dir(tmp.path().join("build"))?
		.filter_map(Result::ok)
		.map(|entry| entry.file_name().to_string_lossy().into_owned())
		.collect::<Vec<_>>();
	assert_eq!(names.len(), 1);
	assert!(names[0].starts_with("Hotkey-"));
	assert!(names[0].ends_with(".htk"));
	// Hotkey-YYYYMMDD-HHMMSS.htk
	assert_eq!(names[0].len(), "Hotkey-20240131-093005.htk".len());

	Ok(())
}

#[test]
fn build_json_lists_every_hotkey() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	common::write_workspace(tmp.path())?;
	common::write_file(tmp.path(), "hotkeys/unused.das", "CXL ALL")?;

	let output = common::htk_cmd()
		.arg("build")
		.arg("--path")
		.arg(tmp.path())
		.arg("--format")
		.arg("json")
		.output()?;
	assert!(output.status.success());

	let json: Value = serde_json::from_slice(&output.stdout)?;
	assert_eq!(json["ok"], Value::Bool(true));
	assert_eq!(json["outputPath"], "build/Hotkey.htk");

	let hotkeys = json["hotkeys"].as_array().ok_or("hotkeys should be an array")?;
	assert_eq!(hotkeys.len(), 2);
	assert_eq!(hotkeys[0]["id"], "buy");
	assert_eq!(hotkeys[0]["key"], "Ctrl+B");
	assert_eq!(hotkeys[0]["scriptLength"], 10);
	assert_eq!(hotkeys[1]["label"], "Sell");

	let warnings = json["warnings"].as_array().ok_or("warnings should be an array")?;
	assert_eq!(warnings.len(), 1);
	assert_eq!(warnings[0]["code"], "UNREFERENCED_SCRIPT");

	Ok(())
}

#[test]
fn build_arguments_parse() -> AnyEmptyResult {
	let cli = HtkCli::try_parse_from([
		"htk",
		"build",
		"--output",
		"out.htk",
		"--force",
		"--live-account",
		"U1",
		"--format",
		"json",
	])?;

	let Some(Commands::Build(build)) = cli.command else {
		return Err("expected the build subcommand".into());
	};
	assert_eq!(build.output.as_deref(), Some(std::path::Path::new("out.htk")));
	assert!(build.force);
	assert!(!build.watch);
	assert_eq!(build.live_account.as_deref(), Some("U1"));
	assert_eq!(build.simulated_account, None);
	assert_eq!(build.format, OutputFormat::Json);

	Ok(())
}

#[test]
fn no_subcommand_exits_with_usage_hint() {
	common::htk_cmd()
		.assert()
		.code(1)
		.stderr(predicates::str::contains("htk --help"));
}
