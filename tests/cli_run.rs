// tests/cli_run.rs

#![cfg(unix)]

mod common;

use clap::Parser;
use common::init_tracing;
use procctl::cli::CliArgs;
use procctl::types::RunResult;
use procctl::{EXIT_HANG, EXIT_START_FAILED, exit_code_for, run};

fn run_cli(args: &[&str]) -> i32 {
    let mut argv = vec!["procctl"];
    argv.extend_from_slice(args);
    run(CliArgs::try_parse_from(argv).unwrap()).unwrap()
}

#[test]
fn run_returns_the_child_exit_code() {
    init_tracing();
    assert_eq!(run_cli(&["run", "--backend", "direct", "--", "/bin/sh", "-c", "exit 7"]), 7);
    assert_eq!(run_cli(&["run", "--", "/bin/sh", "-c", "exit 0"]), 0);
}

#[test]
fn success_codes_change_the_result_but_not_the_code() {
    init_tracing();
    let code = run_cli(&["run", "--success-code", "3", "--", "/bin/sh", "-c", "exit 3"]);
    assert_eq!(code, 3);
}

#[test]
fn missing_program_maps_to_127() {
    init_tracing();
    assert_eq!(run_cli(&["run", "--", "/nonexistent/procctl-tool"]), EXIT_START_FAILED);
}

#[test]
fn dry_run_does_not_execute() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let marker = dir.path().join("marker");
    let marker_arg = marker.to_string_lossy().into_owned();
    assert_eq!(run_cli(&["run", "--dry-run", "--", "touch", &marker_arg]), 0);
    assert!(!marker.exists());
}

#[test]
fn which_finds_sh_on_an_explicit_path() {
    assert_eq!(run_cli(&["which", "sh", "--path", "/bin:/usr/bin"]), 0);
    assert_eq!(run_cli(&["which", "procctl-no-such-tool", "--path", "/bin"]), 1);
}

#[test]
fn results_map_to_exit_codes() {
    assert_eq!(exit_code_for(RunResult::FinishedWithError, 4), 4);
    assert_eq!(exit_code_for(RunResult::Hang, 0), EXIT_HANG);
    assert_eq!(exit_code_for(RunResult::StartFailed, 255), EXIT_START_FAILED);
    assert_eq!(exit_code_for(RunResult::TerminatedAbnormally, 9), 1);
}
