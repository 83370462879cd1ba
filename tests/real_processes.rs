// tests/real_processes.rs
//
// End-to-end runs of small shell commands through the direct and launcher
// backends.

#![cfg(unix)]

mod common;

use std::io::Write;
use std::time::{Duration, Instant};

use common::{Collected, init_tracing, sh};
use procctl::command::{CommandLine, Environment};
use procctl::controller::Process;
use procctl::types::{
    ChannelMode, EventLoopMode, ExitStatus, ProcessImpl, ProcessMode, ProcessState, RunResult,
};
use tempfile::{NamedTempFile, tempdir};

const BACKENDS: [ProcessImpl; 2] = [ProcessImpl::Direct, ProcessImpl::Launcher];

fn process_with(backend: ProcessImpl, command: CommandLine) -> Process {
    let mut process = Process::new();
    process.set_process_impl(backend);
    process.set_command(command);
    process
}

#[test]
fn captures_streams_and_exit_code() {
    init_tracing();
    for backend in BACKENDS {
        let mut process = process_with(backend, sh("printf 'out\\n'; printf 'err\\n' >&2; exit 3"));
        let result = process.run_blocking(EventLoopMode::NoEventLoop).unwrap();

        assert_eq!(result, RunResult::FinishedWithError, "{backend:?}");
        assert_eq!(process.exit_code(), 3, "{backend:?}");
        assert_eq!(process.exit_status(), ExitStatus::NormalExit);
        assert_eq!(process.std_out(), "out\n", "{backend:?}");
        assert_eq!(process.std_err(), "err\n", "{backend:?}");
        assert_eq!(process.state(), ProcessState::NotRunning);
    }
}

#[test]
fn missing_program_fails_to_start() {
    init_tracing();
    for backend in BACKENDS {
        let mut process = process_with(backend, CommandLine::new("/nonexistent/procctl-tool"));
        let result = process.run_blocking(EventLoopMode::NoEventLoop).unwrap();

        assert_eq!(result, RunResult::StartFailed, "{backend:?}");
        assert_eq!(process.exit_code(), 255);
        assert!(
            process.error_string().contains("does not exist or is not executable"),
            "{}",
            process.error_string()
        );
        assert!(process.exit_message().contains("could not be started"));
    }
}

#[test]
fn program_is_found_on_path() {
    init_tracing();
    for backend in BACKENDS {
        let mut process = process_with(backend, CommandLine::with_args("echo", ["found"]));
        let result = process.run_blocking(EventLoopMode::NoEventLoop).unwrap();
        assert_eq!(result, RunResult::FinishedWithSuccess, "{backend:?}");
        assert_eq!(process.std_out(), "found\n");
    }
}

#[test]
fn merged_mode_delivers_stderr_on_stdout() {
    init_tracing();
    for backend in BACKENDS {
        let mut process = process_with(backend, sh("printf a; printf b >&2"));
        process.set_process_channel_mode(ChannelMode::Merged);
        process.run_blocking(EventLoopMode::NoEventLoop).unwrap();

        let out = process.std_out();
        assert_eq!(out.len(), 2, "{backend:?}: {out:?}");
        assert!(out.contains('a') && out.contains('b'));
        assert_eq!(process.std_err(), "");
    }
}

#[test]
fn write_data_is_fed_to_stdin() {
    init_tracing();
    for backend in BACKENDS {
        let mut process = process_with(backend, CommandLine::new("cat"));
        process.set_write_data(b"ping\n".to_vec());
        let result = process.run_blocking(EventLoopMode::NoEventLoop).unwrap();
        assert_eq!(result, RunResult::FinishedWithSuccess, "{backend:?}");
        assert_eq!(process.std_out(), "ping\n");
    }
}

#[test]
fn large_write_data_is_echoed_back_in_full() {
    init_tracing();
    let payload = vec![b'x'; 1 << 20];
    for backend in BACKENDS {
        let mut process = process_with(backend, CommandLine::new("cat"));
        process.set_write_data(payload.clone());
        process.set_timeout_s(10);

        let result = process.run_blocking(EventLoopMode::NoEventLoop).unwrap();

        assert_eq!(result, RunResult::FinishedWithSuccess, "{backend:?}");
        assert_eq!(process.raw_std_out().len(), payload.len(), "{backend:?}");
        assert_eq!(process.state(), ProcessState::NotRunning);
    }
}

#[test]
fn stop_interrupts_a_blocked_write() {
    init_tracing();
    for backend in BACKENDS {
        let mut process = process_with(backend, CommandLine::with_args("sleep", ["30"]));
        process.set_process_mode(ProcessMode::Writer);
        process.start();
        assert!(process.wait_for_started(Some(Duration::from_secs(5))), "{backend:?}");

        // Far more than a pipe holds; `sleep` never reads it.
        assert_eq!(process.write(&vec![b'x'; 1 << 20]).unwrap(), 1 << 20);

        assert!(process.stop_process(), "{backend:?}");
        assert_eq!(process.state(), ProcessState::NotRunning, "{backend:?}");
    }
}

#[test]
fn writer_mode_accepts_writes_until_closed() {
    init_tracing();
    for backend in BACKENDS {
        let mut process = process_with(backend, CommandLine::new("cat"));
        process.set_process_mode(ProcessMode::Writer);
        process.start();
        assert!(process.wait_for_started(Some(Duration::from_secs(5))), "{backend:?}");

        assert_eq!(process.write(b"one ").unwrap(), 4);
        assert_eq!(process.write(b"two").unwrap(), 3);
        process.close_write_channel();

        assert!(process.wait_for_finished(Some(Duration::from_secs(5))), "{backend:?}");
        assert_eq!(process.std_out(), "one two");
        assert_eq!(process.result(), RunResult::FinishedWithSuccess);
    }
}

#[test]
fn standard_input_file_is_used() {
    init_tracing();
    let mut input = NamedTempFile::new().unwrap();
    write!(input, "from file").unwrap();

    let mut process = process_with(ProcessImpl::Direct, CommandLine::new("cat"));
    process.set_standard_input_file(input.path());
    process.run_blocking(EventLoopMode::NoEventLoop).unwrap();
    assert_eq!(process.std_out(), "from file");
}

#[test]
fn explicit_environment_replaces_inherited_one() {
    init_tracing();
    for backend in BACKENDS {
        let mut process = process_with(backend, sh("printf '%s|%s' \"$GREETING\" \"$HOME\""));
        process.set_environment([("GREETING", "hi")].into_iter().collect::<Environment>());
        process.run_blocking(EventLoopMode::NoEventLoop).unwrap();
        assert_eq!(process.std_out(), "hi|", "{backend:?}");
    }
}

#[test]
fn working_directory_is_applied() {
    init_tracing();
    let dir = tempdir().unwrap();
    let expected = dir.path().canonicalize().unwrap();
    for backend in BACKENDS {
        let mut process = process_with(backend, sh("pwd -P"));
        process.set_working_directory(dir.path());
        process.run_blocking(EventLoopMode::NoEventLoop).unwrap();
        assert_eq!(process.std_out().trim_end(), expected.to_string_lossy(), "{backend:?}");
    }
}

#[test]
fn killed_by_signal_is_abnormal() {
    init_tracing();
    for backend in BACKENDS {
        let mut process = process_with(backend, sh("kill -9 $$"));
        let result = process.run_blocking(EventLoopMode::NoEventLoop).unwrap();
        assert_eq!(result, RunResult::TerminatedAbnormally, "{backend:?}");
        assert_eq!(process.exit_status(), ExitStatus::CrashExit);
        assert!(process.exit_message().contains("terminated abnormally"));
    }
}

#[test]
fn silent_process_is_stopped_as_hang() {
    init_tracing();
    for mode in [EventLoopMode::NoEventLoop, EventLoopMode::WithEventLoop] {
        let mut process = process_with(ProcessImpl::Direct, sh("exec sleep 30"));
        process.set_timeout_s(2);

        let started = Instant::now();
        let result = process.run_blocking(mode).unwrap();

        assert_eq!(result, RunResult::Hang, "{mode}");
        assert!(started.elapsed() < Duration::from_secs(15), "{mode}");
        assert_eq!(process.state(), ProcessState::NotRunning, "{mode}");
    }
}

#[test]
fn hang_escalates_to_kill_when_terminate_is_ignored() {
    init_tracing();
    for backend in BACKENDS {
        for mode in [EventLoopMode::NoEventLoop, EventLoopMode::WithEventLoop] {
            let dir = tempdir().unwrap();
            let marker = dir.path().join("terminated");
            let script = format!(
                "trap 'echo term >> {}' TERM; while :; do sleep 0.1 </dev/null >/dev/null 2>&1; done",
                marker.display()
            );
            let mut process = process_with(backend, sh(&script));
            process.set_timeout_s(2);

            let result = process.run_blocking(mode).unwrap();

            assert_eq!(result, RunResult::Hang, "{backend:?} {mode}");
            assert_eq!(process.state(), ProcessState::NotRunning, "{backend:?} {mode}");
            assert_eq!(process.exit_status(), ExitStatus::CrashExit, "{backend:?} {mode}");
            assert_eq!(process.exit_code(), 9, "{backend:?} {mode}");
            // The shell survived SIGTERM, so SIGKILL came after it.
            let seen = std::fs::read_to_string(&marker).unwrap_or_default();
            assert!(seen.contains("term"), "{backend:?} {mode}: {seen:?}");
        }
    }
}

#[test]
fn launcher_stops_hanging_process() {
    init_tracing();
    let mut process = process_with(ProcessImpl::Launcher, sh("exec sleep 30"));
    process.set_timeout_s(2);
    let result = process.run_blocking(EventLoopMode::WithEventLoop).unwrap();
    assert_eq!(result, RunResult::Hang);
}

#[test]
fn steady_output_keeps_process_alive() {
    init_tracing();
    let mut process = process_with(
        ProcessImpl::Direct,
        sh("for i in 1 2 3 4; do echo $i; sleep 1; done"),
    );
    process.set_timeout_s(2);
    let result = process.run_blocking(EventLoopMode::WithEventLoop).unwrap();
    assert_eq!(result, RunResult::FinishedWithSuccess);
    assert_eq!(process.std_out(), "1\n2\n3\n4\n");
}

#[test]
fn declined_prompt_keeps_waiting() {
    init_tracing();
    let asked = Collected::default();
    let mut record = asked.callback();

    let mut process = process_with(ProcessImpl::Direct, sh("sleep 4; echo late"));
    process.set_timeout_s(2);
    process.set_time_out_message_box_enabled(true);
    process.set_timeout_prompt(Box::new(move |cmd| {
        record(&cmd.to_user_output());
        false
    }));

    let result = process.run_blocking(EventLoopMode::WithEventLoop).unwrap();
    assert_eq!(result, RunResult::FinishedWithSuccess);
    assert_eq!(process.std_out(), "late\n");
    assert_eq!(asked.items().len(), 1);
}

#[test]
fn low_priority_runs_the_child_niced() {
    init_tracing();
    let mut process = process_with(ProcessImpl::Direct, sh("nice"));
    process.set_low_priority();
    let result = process.run_blocking(EventLoopMode::NoEventLoop).unwrap();

    assert_eq!(result, RunResult::FinishedWithSuccess);
    let niceness: i32 = process.std_out().trim().parse().unwrap();
    assert!(niceness >= 10, "niceness {niceness}");
}

#[test]
fn line_callback_streams_real_output() {
    init_tracing();
    for backend in BACKENDS {
        let lines = Collected::default();
        let mut process = process_with(backend, sh("printf 'a\\nb\\r\\nc'"));
        process.set_std_out_line_callback(lines.callback());
        process.run_blocking(EventLoopMode::WithEventLoop).unwrap();
        assert_eq!(lines.items(), vec!["a\n", "b\n", "c"], "{backend:?}");
    }
}

#[test]
fn pid_is_known_while_running() {
    init_tracing();
    for backend in BACKENDS {
        let mut process = process_with(backend, sh("exec sleep 5"));
        process.start();
        assert!(process.wait_for_started(Some(Duration::from_secs(5))));
        assert!(process.process_id().is_some(), "{backend:?}");

        assert!(process.stop_process(), "{backend:?}");
        assert_eq!(process.process_id(), None);
        assert_eq!(process.result(), RunResult::TerminatedAbnormally);
    }
}

#[test]
fn ready_read_wakes_on_output() {
    init_tracing();
    let mut process = process_with(ProcessImpl::Direct, sh("echo first; sleep 5"));
    process.start();
    assert!(process.wait_for_ready_read(Some(Duration::from_secs(5))));
    assert_eq!(process.read_all_standard_output(), b"first\n");
    process.kill();
    process.wait_for_finished(Some(Duration::from_secs(5)));
}
