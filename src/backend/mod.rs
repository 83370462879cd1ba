// src/backend/mod.rs

//! Process backends.
//!
//! A backend owns one OS (or launcher-hosted) process for one run. All
//! variants report through the same `BackendMessage` stream, which
//! `BackendCore` turns into state changes and `ProcessEvent`s, so the
//! controller's handling is identical for every variant.
//!
//! - `DirectChildBackend` spawns and supervises the child itself.
//! - `TerminalBackend` runs the command inside a terminal emulator.
//! - `LauncherBackend` delegates to the launcher service.

mod child;
mod direct;
mod launcher;
mod terminal;

use std::path::{Path, PathBuf};
use std::time::Duration;

use crossbeam::channel::{Receiver, RecvTimeoutError, Sender, unbounded};
use tracing::{debug, warn};

use crate::errors::Result;
use crate::locate::{is_executable_file, locate_binary};
use crate::setup::ProcessSetupData;
use crate::types::{Channel, ExitStatus, ProcessErrorKind, ProcessState};

pub(crate) use child::{ChildController, ChildControl, ChildRequest, MessageSink, spawn_child};
pub use direct::DirectChildBackend;
pub use launcher::LauncherBackend;
pub use terminal::TerminalBackend;

/// Raw notification emitted by a running backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendMessage {
    Started { pid: Option<u32> },
    Output { channel: Channel, data: Vec<u8> },
    Error { error: ProcessErrorKind, message: String },
    Finished { exit_code: i32, exit_status: ExitStatus },
}

/// Lifecycle notification seen by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessEvent {
    Started,
    ReadyReadStandardOutput,
    ReadyReadStandardError,
    ErrorOccurred(ProcessErrorKind),
    Finished,
}

/// Bookkeeping shared by all backend variants: the setup of the current
/// run, the message channel, and the last known state.
#[derive(Debug)]
pub struct BackendCore {
    setup: ProcessSetupData,
    tx: Sender<BackendMessage>,
    rx: Receiver<BackendMessage>,
    state: ProcessState,
    exit_code: i32,
    exit_status: ExitStatus,
    error: Option<ProcessErrorKind>,
    error_string: String,
    pid: Option<u32>,
    stdout: Vec<u8>,
    stderr: Vec<u8>,
}

impl Default for BackendCore {
    fn default() -> Self {
        Self::new()
    }
}

impl BackendCore {
    pub fn new() -> Self {
        let (tx, rx) = unbounded();
        Self {
            setup: ProcessSetupData::default(),
            tx,
            rx,
            state: ProcessState::NotRunning,
            exit_code: 0,
            exit_status: ExitStatus::NormalExit,
            error: None,
            error_string: String::new(),
            pid: None,
            stdout: Vec::new(),
            stderr: Vec::new(),
        }
    }

    pub fn begin_run(&mut self, setup: ProcessSetupData) {
        self.setup = setup;
        self.state = ProcessState::Starting;
        self.exit_code = 0;
        self.exit_status = ExitStatus::NormalExit;
        self.error = None;
        self.error_string.clear();
        self.pid = None;
        self.stdout.clear();
        self.stderr.clear();
    }

    pub fn setup(&self) -> &ProcessSetupData {
        &self.setup
    }

    /// Sender side of the message channel, for driver tasks.
    pub fn sender(&self) -> Sender<BackendMessage> {
        self.tx.clone()
    }

    /// Queue an error for the controller. The state follows when the
    /// message is consumed.
    pub fn report_error(&self, error: ProcessErrorKind, message: impl Into<String>) {
        let _ = self.tx.send(BackendMessage::Error {
            error,
            message: message.into(),
        });
    }

    /// Receive the next message and apply it. `None` waits indefinitely.
    /// Returns `None` when nothing arrived in time.
    pub fn next_event(&mut self, timeout: Option<Duration>) -> Option<ProcessEvent> {
        let msg = match timeout {
            Some(t) => match self.rx.recv_timeout(t) {
                Ok(msg) => msg,
                Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => return None,
            },
            None => self.rx.recv().ok()?,
        };
        Some(self.apply(msg))
    }

    fn apply(&mut self, msg: BackendMessage) -> ProcessEvent {
        match msg {
            BackendMessage::Started { pid } => {
                self.state = ProcessState::Running;
                self.pid = pid;
                ProcessEvent::Started
            }
            BackendMessage::Output { channel, data } => match channel {
                Channel::Stdout => {
                    self.stdout.extend_from_slice(&data);
                    ProcessEvent::ReadyReadStandardOutput
                }
                Channel::Stderr => {
                    self.stderr.extend_from_slice(&data);
                    ProcessEvent::ReadyReadStandardError
                }
            },
            BackendMessage::Error { error, message } => {
                debug!(%error, %message, "backend error");
                if error == ProcessErrorKind::FailedToStart {
                    self.state = ProcessState::NotRunning;
                }
                self.error = Some(error);
                self.error_string = message;
                ProcessEvent::ErrorOccurred(error)
            }
            BackendMessage::Finished {
                exit_code,
                exit_status,
            } => {
                self.state = ProcessState::NotRunning;
                self.exit_code = exit_code;
                self.exit_status = exit_status;
                self.pid = None;
                ProcessEvent::Finished
            }
        }
    }

    pub fn take_output(&mut self, channel: Channel) -> Vec<u8> {
        match channel {
            Channel::Stdout => std::mem::take(&mut self.stdout),
            Channel::Stderr => std::mem::take(&mut self.stderr),
        }
    }

    pub fn state(&self) -> ProcessState {
        self.state
    }

    pub fn exit_code(&self) -> i32 {
        self.exit_code
    }

    pub fn exit_status(&self) -> ExitStatus {
        self.exit_status
    }

    pub fn error(&self) -> Option<ProcessErrorKind> {
        self.error
    }

    pub fn error_string(&self) -> &str {
        &self.error_string
    }

    pub fn process_id(&self) -> Option<u32> {
        self.pid
    }
}

/// The process-control contract every backend variant implements.
///
/// Implementors provide the variant-specific operations; `start` performs
/// the shared resolution step first and only calls `do_start` when the
/// executable exists.
pub trait ProcessBackend: Send {
    fn core(&self) -> &BackendCore;
    fn core_mut(&mut self) -> &mut BackendCore;

    /// Short name used in logs and errors.
    fn kind(&self) -> &'static str;

    /// Launch `program` (already resolved) with `arguments`.
    fn do_start(&mut self, program: PathBuf, arguments: Vec<String>);

    fn terminate(&mut self);
    fn kill(&mut self);
    fn close(&mut self);
    fn write(&mut self, data: &[u8]) -> Result<usize>;

    fn close_write_channel(&mut self) {}

    fn start(&mut self, setup: ProcessSetupData) {
        self.core_mut().begin_run(setup);
        match prepare_start(self.core().setup()) {
            Ok(program) => {
                let arguments = self.core().setup().command_line.arguments().to_vec();
                debug!(backend = self.kind(), program = %program.display(), "starting backend");
                self.do_start(program, arguments);
            }
            Err(message) => {
                warn!(backend = self.kind(), %message, "not starting process");
                self.core_mut()
                    .report_error(ProcessErrorKind::FailedToStart, message);
            }
        }
    }

    fn read_all_standard_output(&mut self) -> Vec<u8> {
        self.core_mut().take_output(Channel::Stdout)
    }

    fn read_all_standard_error(&mut self) -> Vec<u8> {
        self.core_mut().take_output(Channel::Stderr)
    }

    fn next_event(&mut self, timeout: Option<Duration>) -> Option<ProcessEvent> {
        self.core_mut().next_event(timeout)
    }

    fn state(&self) -> ProcessState {
        self.core().state()
    }

    fn exit_code(&self) -> i32 {
        self.core().exit_code()
    }

    fn exit_status(&self) -> ExitStatus {
        self.core().exit_status()
    }

    fn error(&self) -> Option<ProcessErrorKind> {
        self.core().error()
    }

    fn error_string(&self) -> &str {
        self.core().error_string()
    }

    fn process_id(&self) -> Option<u32> {
        self.core().process_id()
    }
}

/// Resolve the executable of `setup` to a path that exists and is
/// executable, or return the user-facing failure message.
pub fn prepare_start(setup: &ProcessSetupData) -> std::result::Result<PathBuf, String> {
    let exe = setup.command_line.executable();
    if exe.as_os_str().is_empty() {
        return Err("No executable specified.".to_string());
    }
    resolve_program(exe, setup).ok_or_else(|| {
        format!(
            "The program \"{}\" does not exist or is not executable.",
            exe.display()
        )
    })
}

fn resolve_program(exe: &Path, setup: &ProcessSetupData) -> Option<PathBuf> {
    if exe.is_absolute() {
        return is_executable_file(exe).then(|| exe.to_path_buf());
    }

    let base = match &setup.working_directory {
        Some(dir) => dir.clone(),
        None => std::env::current_dir().ok()?,
    };
    let from_working_dir = base.join(exe);
    if is_executable_file(&from_working_dir) {
        return Some(from_working_dir);
    }

    let name = exe.to_str()?;
    match setup.environment.path() {
        Some(path) => locate_binary(path, name),
        None => crate::locate::locate_binary_in_env(name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::CommandLine;

    #[test]
    fn core_tracks_state_through_messages() {
        let mut core = BackendCore::new();
        core.begin_run(ProcessSetupData::default());
        assert_eq!(core.state(), ProcessState::Starting);

        let tx = core.sender();
        tx.send(BackendMessage::Started { pid: Some(42) }).unwrap();
        tx.send(BackendMessage::Output {
            channel: Channel::Stderr,
            data: b"warn".to_vec(),
        })
        .unwrap();
        tx.send(BackendMessage::Finished {
            exit_code: 3,
            exit_status: ExitStatus::NormalExit,
        })
        .unwrap();

        let timeout = Some(Duration::from_millis(100));
        assert_eq!(core.next_event(timeout), Some(ProcessEvent::Started));
        assert_eq!(core.process_id(), Some(42));
        assert_eq!(core.state(), ProcessState::Running);
        assert_eq!(
            core.next_event(timeout),
            Some(ProcessEvent::ReadyReadStandardError)
        );
        assert_eq!(core.take_output(Channel::Stderr), b"warn");
        assert_eq!(core.next_event(timeout), Some(ProcessEvent::Finished));
        assert_eq!(core.state(), ProcessState::NotRunning);
        assert_eq!(core.exit_code(), 3);
        assert_eq!(core.next_event(Some(Duration::from_millis(10))), None);
    }

    #[test]
    fn failed_start_returns_to_not_running() {
        let mut core = BackendCore::new();
        core.begin_run(ProcessSetupData::default());
        core.report_error(ProcessErrorKind::FailedToStart, "nope");
        assert_eq!(
            core.next_event(Some(Duration::from_millis(100))),
            Some(ProcessEvent::ErrorOccurred(ProcessErrorKind::FailedToStart))
        );
        assert_eq!(core.state(), ProcessState::NotRunning);
        assert_eq!(core.error_string(), "nope");
    }

    #[test]
    fn missing_program_is_rejected_before_start() {
        let mut setup = ProcessSetupData::default();
        setup.command_line = CommandLine::new("procctl-no-such-binary-xyz");
        let err = prepare_start(&setup).unwrap_err();
        assert_eq!(
            err,
            "The program \"procctl-no-such-binary-xyz\" does not exist or is not executable."
        );
    }

    #[test]
    fn empty_program_is_rejected() {
        let setup = ProcessSetupData::default();
        assert!(prepare_start(&setup).is_err());
    }
}
