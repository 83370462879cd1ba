// src/backend/terminal.rs

//! Runs the command inside a terminal emulator.
//!
//! The terminal executes a small wrapper script from a private temp
//! directory. The script records the command's pid and its exit code in a
//! status file, which a supervisor task polls to produce the usual
//! `Started` / `Finished` messages. The command's stdio belongs to the
//! terminal window, so no output is ever captured.
//!
//! Status file lines:
//! - `pid N`: the command is running as process N
//! - `exit N`: the command exited with code N
//! - `crash N`: the command was killed by signal N

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use crossbeam::channel::Sender;
use tempfile::TempDir;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::backend::{
    BackendCore, BackendMessage, ChildControl, ChildController, ChildRequest, MessageSink,
    ProcessBackend, spawn_child,
};
use crate::command::{CommandLine, OsType, join_args, quote_arg};
use crate::errors::{ProcctlError, Result};
use crate::runtime::io_runtime;
use crate::setup::ProcessSetupData;
use crate::types::{ChannelMode, ExitStatus, ProcessErrorKind, ProcessMode, ProcessState, TerminalMode};

const STATUS_POLL_INTERVAL: Duration = Duration::from_millis(50);
/// Polls without a live command or exit record before giving up once the
/// terminal itself is gone.
const EXIT_GRACE_TICKS: u32 = 3;
const TERMINAL_KILL_DELAY: Duration = Duration::from_secs(1);
const KEEP_OPEN_PROMPT: &str = "Press <RETURN> to close this window...";

#[derive(Debug, Default)]
pub struct TerminalBackend {
    core: BackendCore,
    terminal: Option<ChildController>,
    inferior_pid: Arc<AtomicI64>,
}

impl TerminalBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Terminate and kill both map here: kill the command, then close the
    /// terminal, forcing it after a delay.
    fn stop(&mut self) {
        if self.core.state() == ProcessState::NotRunning {
            return;
        }
        kill_inferior(self.inferior_pid.load(Ordering::SeqCst));

        let Some(terminal) = &self.terminal else {
            return;
        };
        terminal.send(ChildControl::Terminate);
        let control = terminal.control_sender();
        match io_runtime() {
            Ok(rt) => {
                rt.spawn(async move {
                    tokio::time::sleep(TERMINAL_KILL_DELAY).await;
                    let _ = control.send(ChildControl::Kill);
                });
            }
            Err(e) => warn!(error = %e, "cannot schedule terminal kill"),
        }
    }

    fn fail(&self, message: String) {
        self.core
            .report_error(ProcessErrorKind::FailedToStart, message);
    }
}

impl ProcessBackend for TerminalBackend {
    fn core(&self) -> &BackendCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut BackendCore {
        &mut self.core
    }

    fn kind(&self) -> &'static str {
        "terminal"
    }

    fn do_start(&mut self, program: PathBuf, arguments: Vec<String>) {
        let runtime = match io_runtime() {
            Ok(rt) => rt,
            Err(e) => return self.fail(format!("Cannot start the process I/O runtime: {e}")),
        };
        let dir = match tempfile::Builder::new().prefix("procctl-terminal-").tempdir() {
            Ok(dir) => dir,
            Err(e) => return self.fail(format!("Cannot create a temporary directory: {e}")),
        };

        let os = OsType::host();
        let setup = self.core.setup();
        let status_path = dir.path().join("status");
        let script_path = dir.path().join(if os.is_windows() { "run.bat" } else { "run.sh" });
        let script = render_script(os, setup, &program, &arguments, &status_path);
        if let Err(e) = std::fs::write(&script_path, script) {
            return self.fail(format!("Cannot write the terminal wrapper script: {e}"));
        }

        let terminal_cmd = terminal_command_line(os, setup, &script_path);
        info!(terminal = %terminal_cmd, "starting process in terminal");

        let request = ChildRequest {
            program: terminal_cmd.executable().to_path_buf(),
            arguments: terminal_cmd.arguments().to_vec(),
            setup: terminal_setup(setup),
        };
        let (terminal_tx, terminal_rx) = mpsc::unbounded_channel();
        let sink: MessageSink = Arc::new(move |msg| {
            let _ = terminal_tx.send(msg);
        });

        self.terminal = Some(spawn_child(runtime.handle(), request, sink));
        runtime.spawn(supervise(
            terminal_rx,
            self.core.sender(),
            status_path,
            self.inferior_pid.clone(),
            dir,
        ));
    }

    fn terminate(&mut self) {
        self.stop();
    }

    fn kill(&mut self) {
        self.stop();
    }

    fn close(&mut self) {
        self.stop();
    }

    fn write(&mut self, _data: &[u8]) -> Result<usize> {
        warn!("writing to a process running in a terminal is not supported");
        Err(ProcctlError::Unsupported("terminal"))
    }

    fn read_all_standard_output(&mut self) -> Vec<u8> {
        debug!("output of a process running in a terminal is not captured");
        Vec::new()
    }

    fn read_all_standard_error(&mut self) -> Vec<u8> {
        debug!("output of a process running in a terminal is not captured");
        Vec::new()
    }
}

impl Drop for TerminalBackend {
    fn drop(&mut self) {
        if self.core.state() != ProcessState::NotRunning {
            kill_inferior(self.inferior_pid.load(Ordering::SeqCst));
        }
    }
}

/// Setup used for the terminal emulator process itself.
fn terminal_setup(setup: &ProcessSetupData) -> ProcessSetupData {
    let mut terminal = setup.clone();
    terminal.environment.unset("TERM");
    terminal.process_mode = ProcessMode::Reader;
    terminal.process_channel_mode = ChannelMode::Separate;
    terminal.write_data.clear();
    terminal.standard_input_file = None;
    terminal
}

fn terminal_command_line(os: OsType, setup: &ProcessSetupData, script: &Path) -> CommandLine {
    let script = script.to_string_lossy().into_owned();
    let inner = if os.is_windows() {
        CommandLine::with_args("cmd", ["/c".to_string(), script])
    } else {
        CommandLine::with_args("/bin/sh", [script])
    };

    let terminal = &setup.terminal;
    let mut cmd = CommandLine::with_args(&terminal.command, terminal.execute_args.iter().cloned());
    if terminal.needs_quotes {
        cmd.add_arg(inner.to_string_for(os));
    } else {
        cmd.add_command_line_as_args(&inner);
    }
    cmd
}

fn render_script(
    os: OsType,
    setup: &ProcessSetupData,
    program: &Path,
    arguments: &[String],
    status: &Path,
) -> String {
    let program = program.to_string_lossy();
    let status = status.to_string_lossy();
    let keep_open = setup.terminal_mode == TerminalMode::KeepOpen;
    let mut script = String::new();

    if os.is_windows() {
        script.push_str("@echo off\r\n");
        if let Some(dir) = &setup.working_directory {
            script.push_str(&format!("cd /d {}\r\n", quote_arg(&dir.to_string_lossy(), os)));
        }
        script.push_str(&quote_arg(&program, os));
        if !arguments.is_empty() {
            script.push(' ');
            script.push_str(&join_args(arguments, os));
        }
        script.push_str("\r\n");
        script.push_str(&format!("echo exit %ERRORLEVEL%>> {}\r\n", quote_arg(&status, os)));
        if keep_open {
            script.push_str("pause\r\n");
        }
        return script;
    }

    let status = quote_arg(&status, os);
    if let Some(dir) = &setup.working_directory {
        script.push_str(&format!("cd {} || exit 127\n", quote_arg(&dir.to_string_lossy(), os)));
    }
    // The inner shell records its own pid and then becomes the command.
    script.push_str(&format!(
        "/bin/sh -c 'echo \"pid $$\" > \"$0\"; exec \"$@\"' {status} {}",
        quote_arg(&program, os)
    ));
    if !arguments.is_empty() {
        script.push(' ');
        script.push_str(&join_args(arguments, os));
    }
    script.push('\n');
    script.push_str("rc=$?\n");
    script.push_str(&format!(
        "if [ \"$rc\" -gt 128 ]; then echo \"crash $((rc - 128))\" >> {status}; \
         else echo \"exit $rc\" >> {status}; fi\n"
    ));
    if keep_open {
        script.push_str(&format!("printf '%s' {}\n", quote_arg(KEEP_OPEN_PROMPT, os)));
        script.push_str("read _ignored\n");
    }
    script
}

#[derive(Debug, Default, PartialEq, Eq)]
struct StubStatus {
    pid: Option<i64>,
    exit: Option<(i32, ExitStatus)>,
}

fn parse_status(text: &str) -> StubStatus {
    let mut status = StubStatus::default();
    for line in text.lines() {
        let mut parts = line.split_whitespace();
        let (Some(key), Some(value)) = (parts.next(), parts.next()) else {
            continue;
        };
        match key {
            "pid" => status.pid = value.parse().ok(),
            "exit" => status.exit = value.parse().ok().map(|c| (c, ExitStatus::NormalExit)),
            "crash" => status.exit = value.parse().ok().map(|c| (c, ExitStatus::CrashExit)),
            _ => {}
        }
    }
    status
}

async fn read_status(path: &Path) -> StubStatus {
    tokio::fs::read_to_string(path)
        .await
        .map(|text| parse_status(&text))
        .unwrap_or_default()
}

async fn supervise(
    mut terminal_rx: mpsc::UnboundedReceiver<BackendMessage>,
    outer: Sender<BackendMessage>,
    status_path: PathBuf,
    inferior: Arc<AtomicI64>,
    _dir: TempDir,
) {
    let mut ticker = tokio::time::interval(STATUS_POLL_INTERVAL);
    let mut started = false;
    let mut terminal_done = false;
    let mut grace_ticks = 0u32;

    loop {
        tokio::select! {
            msg = terminal_rx.recv(), if !terminal_done => match msg {
                Some(BackendMessage::Error { error: ProcessErrorKind::FailedToStart, message }) => {
                    let _ = outer.send(BackendMessage::Error {
                        error: ProcessErrorKind::FailedToStart,
                        message: format!("Cannot start the terminal emulator: {message}"),
                    });
                    return;
                }
                Some(BackendMessage::Finished { exit_code, .. }) => {
                    debug!(exit_code, "terminal emulator exited");
                    terminal_done = true;
                }
                None => terminal_done = true,
                Some(_) => {}
            },
            _ = ticker.tick() => {
                let status = read_status(&status_path).await;
                if !started {
                    if let Some(pid) = status.pid {
                        inferior.store(pid, Ordering::SeqCst);
                        started = true;
                        let _ = outer.send(BackendMessage::Started { pid: u32::try_from(pid).ok() });
                    }
                }
                if let Some((exit_code, exit_status)) = status.exit {
                    if !started {
                        let _ = outer.send(BackendMessage::Started { pid: None });
                    }
                    let _ = outer.send(BackendMessage::Finished { exit_code, exit_status });
                    return;
                }
                if !terminal_done {
                    continue;
                }
                if started && inferior_alive(inferior.load(Ordering::SeqCst)) {
                    grace_ticks = 0;
                    continue;
                }
                grace_ticks += 1;
                if grace_ticks < EXIT_GRACE_TICKS {
                    continue;
                }
                if started {
                    let _ = outer.send(BackendMessage::Finished {
                        exit_code: -1,
                        exit_status: ExitStatus::CrashExit,
                    });
                } else {
                    let _ = outer.send(BackendMessage::Error {
                        error: ProcessErrorKind::FailedToStart,
                        message: "The terminal closed before the command started.".to_string(),
                    });
                }
                return;
            }
        }
    }
}

#[cfg(unix)]
fn inferior_alive(pid: i64) -> bool {
    use nix::sys::signal::kill;
    use nix::unistd::Pid;
    pid > 0 && kill(Pid::from_raw(pid as i32), None).is_ok()
}

#[cfg(not(unix))]
fn inferior_alive(_pid: i64) -> bool {
    false
}

#[cfg(unix)]
fn kill_inferior(pid: i64) {
    use nix::sys::signal::{Signal, kill};
    use nix::unistd::Pid;
    if pid > 0 {
        if let Err(e) = kill(Pid::from_raw(pid as i32), Signal::SIGKILL) {
            debug!(pid, error = %e, "killing terminal command failed");
        }
    }
}

#[cfg(not(unix))]
fn kill_inferior(_pid: i64) {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::setup::TerminalCommand;

    #[test]
    fn status_lines_are_parsed() {
        assert_eq!(parse_status(""), StubStatus::default());
        assert_eq!(
            parse_status("pid 123\n"),
            StubStatus { pid: Some(123), exit: None }
        );
        assert_eq!(
            parse_status("pid 123\nexit 4\n"),
            StubStatus { pid: Some(123), exit: Some((4, ExitStatus::NormalExit)) }
        );
        assert_eq!(
            parse_status("pid 9\ncrash 15\n").exit,
            Some((15, ExitStatus::CrashExit))
        );
    }

    #[test]
    fn unix_script_records_pid_and_exit() {
        let mut setup = ProcessSetupData::default();
        setup.working_directory = Some(PathBuf::from("/tmp/work dir"));
        let script = render_script(
            OsType::Linux,
            &setup,
            Path::new("/bin/echo"),
            &["a b".to_string()],
            Path::new("/tmp/s/status"),
        );
        assert!(script.starts_with("cd '/tmp/work dir' || exit 127\n"));
        assert!(script.contains("/tmp/s/status /bin/echo 'a b'\n"));
        assert!(script.contains("echo \"exit $rc\" >> /tmp/s/status"));
        assert!(!script.contains("RETURN"));
    }

    #[test]
    fn keep_open_script_prompts() {
        let mut setup = ProcessSetupData::default();
        setup.terminal_mode = TerminalMode::KeepOpen;
        let script = render_script(
            OsType::Linux,
            &setup,
            Path::new("/bin/true"),
            &[],
            Path::new("/tmp/status"),
        );
        assert!(script.contains("Press <RETURN> to close this window..."));
        assert!(script.contains("read _ignored"));
    }

    #[test]
    fn terminal_command_wraps_script() {
        let mut setup = ProcessSetupData::default();
        setup.terminal = TerminalCommand {
            command: "xterm".to_string(),
            execute_args: vec!["-e".to_string()],
            needs_quotes: false,
        };
        let cmd = terminal_command_line(OsType::Linux, &setup, Path::new("/tmp/x/run.sh"));
        assert_eq!(cmd.executable(), Path::new("xterm"));
        assert_eq!(cmd.arguments(), &["-e", "/bin/sh", "/tmp/x/run.sh"]);

        setup.terminal.needs_quotes = true;
        let cmd = terminal_command_line(OsType::Linux, &setup, Path::new("/tmp/x/run.sh"));
        assert_eq!(cmd.arguments(), &["-e", "/bin/sh /tmp/x/run.sh"]);
    }

    #[test]
    fn terminal_environment_drops_term() {
        let mut setup = ProcessSetupData::default();
        setup.environment.set("TERM", "xterm-256color");
        setup.environment.set("HOME", "/home/u");
        setup.write_data = b"ignored".to_vec();
        let terminal = terminal_setup(&setup);
        assert!(!terminal.environment.contains("TERM"));
        assert_eq!(terminal.environment.value("HOME"), Some("/home/u"));
        assert!(terminal.write_data.is_empty());
    }
}
