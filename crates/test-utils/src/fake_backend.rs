use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use procctl::backend::{BackendCore, BackendMessage, ProcessBackend};
use procctl::errors::Result;
use procctl::setup::ProcessSetupData;
use procctl::types::{Channel, ExitStatus, ProcessErrorKind, ProcessState};

/// Operations the controller performed on a `FakeBackend`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FakeCall {
    Start {
        program: PathBuf,
        arguments: Vec<String>,
    },
    Write(Vec<u8>),
    CloseWriteChannel,
    Terminate,
    Kill,
    Close,
}

/// A backend that replays scripted messages instead of running anything.
///
/// - `on_start` messages are queued when the run starts.
/// - `on_terminate` / `on_kill` are queued when the controller asks for it
///   and the fake is still running.
/// - every call is recorded in a shared log, see [`FakeBackend::calls`].
pub struct FakeBackend {
    core: BackendCore,
    on_start: Vec<BackendMessage>,
    on_terminate: Vec<BackendMessage>,
    on_kill: Vec<BackendMessage>,
    calls: Arc<Mutex<Vec<FakeCall>>>,
}

impl Default for FakeBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeBackend {
    /// Nothing scripted on start; a kill finishes with a crash.
    pub fn new() -> Self {
        Self {
            core: BackendCore::new(),
            on_start: Vec::new(),
            on_terminate: Vec::new(),
            on_kill: vec![crashed()],
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Starts, writes `stdout` and `stderr`, exits normally with `exit_code`.
    pub fn finishing_with(exit_code: i32, stdout: &[u8], stderr: &[u8]) -> Self {
        let mut script = vec![BackendMessage::Started { pid: Some(4242) }];
        if !stdout.is_empty() {
            script.push(output(Channel::Stdout, stdout));
        }
        if !stderr.is_empty() {
            script.push(output(Channel::Stderr, stderr));
        }
        script.push(BackendMessage::Finished {
            exit_code,
            exit_status: ExitStatus::NormalExit,
        });
        Self::new().on_start(script)
    }

    /// Starts and then stays silent. Ignores terminate; dies on kill.
    pub fn hanging() -> Self {
        Self::new().on_start(vec![BackendMessage::Started { pid: Some(4242) }])
    }

    /// Starts, then crashes on its own.
    pub fn crashing() -> Self {
        Self::new().on_start(vec![
            BackendMessage::Started { pid: Some(4242) },
            BackendMessage::Error {
                error: ProcessErrorKind::Crashed,
                message: "The process crashed.".to_string(),
            },
            crashed(),
        ])
    }

    /// Reports a start failure with `message`.
    pub fn failing_to_start(message: &str) -> Self {
        Self::new().on_start(vec![BackendMessage::Error {
            error: ProcessErrorKind::FailedToStart,
            message: message.to_string(),
        }])
    }

    pub fn on_start(mut self, script: Vec<BackendMessage>) -> Self {
        self.on_start = script;
        self
    }

    pub fn on_terminate(mut self, script: Vec<BackendMessage>) -> Self {
        self.on_terminate = script;
        self
    }

    pub fn on_kill(mut self, script: Vec<BackendMessage>) -> Self {
        self.on_kill = script;
        self
    }

    /// Shared call log; stays valid after the fake is moved into a `Process`.
    pub fn calls(&self) -> Arc<Mutex<Vec<FakeCall>>> {
        Arc::clone(&self.calls)
    }

    fn record(&self, call: FakeCall) {
        self.calls.lock().unwrap().push(call);
    }

    fn replay(&self, script: &[BackendMessage]) {
        let tx = self.core.sender();
        for msg in script {
            let _ = tx.send(msg.clone());
        }
    }
}

pub fn output(channel: Channel, data: &[u8]) -> BackendMessage {
    BackendMessage::Output {
        channel,
        data: data.to_vec(),
    }
}

fn crashed() -> BackendMessage {
    BackendMessage::Finished {
        exit_code: 9,
        exit_status: ExitStatus::CrashExit,
    }
}

impl ProcessBackend for FakeBackend {
    fn core(&self) -> &BackendCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut BackendCore {
        &mut self.core
    }

    fn kind(&self) -> &'static str {
        "fake"
    }

    /// No executable lookup: the scripted run starts whatever it is given.
    fn start(&mut self, setup: ProcessSetupData) {
        let program = setup.command_line.executable().to_path_buf();
        let arguments = setup.command_line.arguments().to_vec();
        self.core.begin_run(setup);
        self.do_start(program, arguments);
    }

    fn do_start(&mut self, program: PathBuf, arguments: Vec<String>) {
        self.record(FakeCall::Start { program, arguments });
        self.replay(&self.on_start);
    }

    fn terminate(&mut self) {
        self.record(FakeCall::Terminate);
        if self.core.state() != ProcessState::NotRunning {
            self.replay(&self.on_terminate);
        }
    }

    fn kill(&mut self) {
        self.record(FakeCall::Kill);
        if self.core.state() != ProcessState::NotRunning {
            self.replay(&self.on_kill);
        }
    }

    fn close(&mut self) {
        self.record(FakeCall::Close);
        if self.core.state() != ProcessState::NotRunning {
            self.replay(&self.on_kill);
        }
    }

    fn close_write_channel(&mut self) {
        self.record(FakeCall::CloseWriteChannel);
    }

    fn write(&mut self, data: &[u8]) -> Result<usize> {
        self.record(FakeCall::Write(data.to_vec()));
        Ok(data.len())
    }
}
