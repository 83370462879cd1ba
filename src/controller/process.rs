// src/controller/process.rs

//! The process controller.
//!
//! `Process` owns the setup of the next run and at most one backend. The
//! backend reports asynchronously over its message channel; the controller
//! consumes those messages only on the caller's thread, inside the `wait_*`
//! calls, `process_events`, `read_data_from_process` and `run_blocking`.
//! This keeps every state change on one logical thread without locks.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use encoding_rs::{Encoding, UTF_8};
use tracing::{debug, info, trace, warn};

use crate::backend::{
    DirectChildBackend, LauncherBackend, ProcessBackend, ProcessEvent, TerminalBackend,
};
use crate::channel::{ChannelBuffer, OutputCallback};
use crate::command::{CommandLine, Environment, OsType, join_args, needs_device};
use crate::controller::device::DeviceProcessHooks;
use crate::controller::exit::{ExitCodeInterpreter, exit_message, interpret_exit_code};
use crate::controller::hang::{HANG_TICK_INTERVAL, HangCheck, HangMonitor};
use crate::controller::observers::{ErrorNotify, Notify, Observers};
use crate::diagnostics::{self, START_STATS, WAIT_FOR_STARTED_STATS};
use crate::errors::{ProcctlError, Result};
use crate::setup::{ProcessSetupData, TerminalCommand};
use crate::types::{
    ChannelMode, EventLoopMode, ExitStatus, ProcessErrorKind, ProcessImpl, ProcessMode,
    ProcessState, RunResult, TerminalMode,
};

const STOP_WAIT: Duration = Duration::from_millis(300);
const HANG_KILL_WAIT: Duration = Duration::from_secs(1);

static PROCESS_NUMBER: AtomicU64 = AtomicU64::new(0);

/// Decides whether the user wants a hanging process stopped. Returning
/// `false` keeps waiting.
pub type TimeoutPrompt = Box<dyn FnMut(&CommandLine) -> bool + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StartFailure {
    NoFailure,
    WrongCommand,
    Other,
}

pub struct Process {
    setup: ProcessSetupData,
    backend: Option<Box<dyn ProcessBackend>>,
    device_hooks: Option<Arc<dyn DeviceProcessHooks>>,
    encoding: &'static Encoding,
    stdout: ChannelBuffer,
    stderr: ChannelBuffer,
    result: RunResult,
    start_failure: StartFailure,
    exit_code_interpreter: Option<ExitCodeInterpreter>,
    hang: HangMonitor,
    timeout_prompt: Option<TimeoutPrompt>,
    timeout_prompt_enabled: bool,
    observers: Observers,
    run_finished: bool,
    finished_seen: bool,
    ready_reads: u64,
    in_blocking_run: bool,
    blocking_type: Option<EventLoopMode>,
    process_number: u64,
    run_started: Option<Instant>,
}

impl Default for Process {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Process {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Process")
            .field("command", &self.setup.command_line)
            .field("state", &self.state())
            .field("result", &self.result)
            .field("exit_code", &self.exit_code())
            .field("stdout_bytes", &self.stdout.raw_data().len())
            .field("stderr_bytes", &self.stderr.raw_data().len())
            .finish()
    }
}

impl Process {
    pub fn new() -> Self {
        Self {
            setup: ProcessSetupData::default(),
            backend: None,
            device_hooks: None,
            encoding: UTF_8,
            stdout: ChannelBuffer::new(UTF_8),
            stderr: ChannelBuffer::new(UTF_8),
            result: RunResult::StartFailed,
            start_failure: StartFailure::NoFailure,
            exit_code_interpreter: None,
            hang: HangMonitor::new(),
            timeout_prompt: None,
            timeout_prompt_enabled: false,
            observers: Observers::default(),
            run_finished: false,
            finished_seen: false,
            ready_reads: 0,
            in_blocking_run: false,
            blocking_type: None,
            process_number: 0,
            run_started: None,
        }
    }

    pub fn with_device_hooks(hooks: Arc<dyn DeviceProcessHooks>) -> Self {
        let mut process = Self::new();
        process.device_hooks = Some(hooks);
        process
    }

    pub fn set_device_hooks(&mut self, hooks: Option<Arc<dyn DeviceProcessHooks>>) {
        self.device_hooks = hooks;
    }

    // ---- configuration ----

    pub fn setup(&self) -> &ProcessSetupData {
        &self.setup
    }

    pub fn set_command(&mut self, command: CommandLine) {
        self.setup.command_line = command;
    }

    pub fn command_line(&self) -> &CommandLine {
        &self.setup.command_line
    }

    pub fn set_working_directory(&mut self, dir: impl Into<PathBuf>) {
        self.setup.working_directory = Some(dir.into());
    }

    pub fn working_directory(&self) -> Option<&Path> {
        self.setup.working_directory.as_deref()
    }

    pub fn set_environment(&mut self, env: Environment) {
        self.setup.environment = env;
        self.setup.have_environment = true;
    }

    /// Go back to inheriting the calling process's environment.
    pub fn unset_environment(&mut self) {
        self.setup.environment = Environment::new();
        self.setup.have_environment = false;
    }

    pub fn environment(&self) -> &Environment {
        &self.setup.environment
    }

    pub fn has_environment(&self) -> bool {
        self.setup.have_environment
    }

    pub fn set_remote_environment(&mut self, env: Environment) {
        self.setup.remote_environment = env;
    }

    pub fn remote_environment(&self) -> &Environment {
        &self.setup.remote_environment
    }

    pub fn set_process_impl(&mut self, process_impl: ProcessImpl) {
        self.setup.process_impl = process_impl;
    }

    pub fn set_process_mode(&mut self, mode: ProcessMode) {
        self.setup.process_mode = mode;
    }

    pub fn process_mode(&self) -> ProcessMode {
        self.setup.process_mode
    }

    pub fn set_terminal_mode(&mut self, mode: TerminalMode) {
        self.setup.terminal_mode = mode;
    }

    pub fn terminal_mode(&self) -> TerminalMode {
        self.setup.terminal_mode
    }

    pub fn uses_terminal(&self) -> bool {
        self.setup.terminal_mode != TerminalMode::Off
    }

    pub fn set_terminal_command(&mut self, terminal: TerminalCommand) {
        self.setup.terminal = terminal;
    }

    pub fn set_process_channel_mode(&mut self, mode: ChannelMode) {
        self.setup.process_channel_mode = mode;
    }

    pub fn process_channel_mode(&self) -> ChannelMode {
        self.setup.process_channel_mode
    }

    /// Bytes fed to stdin right after start.
    pub fn set_write_data(&mut self, data: impl Into<Vec<u8>>) {
        self.setup.write_data = data.into();
    }

    pub fn set_standard_input_file(&mut self, path: impl Into<PathBuf>) {
        self.setup.standard_input_file = Some(path.into());
    }

    pub fn set_extra_data(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.setup.extra_data.insert(key.into(), value.into());
    }

    pub fn extra_data(&self, key: &str) -> Option<&str> {
        self.setup.extra_data.get(key).map(String::as_str)
    }

    pub fn set_low_priority(&mut self) {
        self.setup.low_priority = true;
    }

    pub fn set_disable_unix_terminal(&mut self) {
        self.setup.unix_terminal_disabled = true;
    }

    pub fn set_run_as_root(&mut self, on: bool) {
        self.setup.run_as_root = on;
    }

    pub fn is_run_as_root(&self) -> bool {
        self.setup.run_as_root
    }

    pub fn set_elevation_command(&mut self, elevation: CommandLine) {
        self.setup.elevation = elevation;
    }

    pub fn set_codec(&mut self, encoding: &'static Encoding) {
        self.encoding = encoding;
        self.stdout.set_encoding(encoding);
        self.stderr.set_encoding(encoding);
    }

    pub fn codec(&self) -> &'static Encoding {
        self.encoding
    }

    pub fn set_timeout_s(&mut self, timeout_s: i64) {
        self.hang.set_timeout_s(timeout_s);
    }

    pub fn hang_monitor(&self) -> &HangMonitor {
        &self.hang
    }

    pub fn set_timeout_prompt(&mut self, prompt: TimeoutPrompt) {
        self.timeout_prompt = Some(prompt);
    }

    /// Ask before stopping a hanging process instead of stopping it outright.
    pub fn set_time_out_message_box_enabled(&mut self, enabled: bool) {
        self.timeout_prompt_enabled = enabled;
    }

    pub fn set_exit_code_interpreter(&mut self, interpreter: ExitCodeInterpreter) {
        self.exit_code_interpreter = Some(interpreter);
    }

    pub fn set_std_out_callback(&mut self, callback: OutputCallback) {
        self.stdout.set_block_callback(callback);
    }

    pub fn set_std_out_line_callback(&mut self, callback: OutputCallback) {
        self.stdout.set_line_callback(callback);
    }

    pub fn set_std_err_callback(&mut self, callback: OutputCallback) {
        self.stderr.set_block_callback(callback);
    }

    pub fn set_std_err_line_callback(&mut self, callback: OutputCallback) {
        self.stderr.set_line_callback(callback);
    }

    // ---- observers ----

    pub fn on_started(&mut self, cb: Notify) {
        self.observers.started.push(cb);
    }

    pub fn on_finished(&mut self, cb: Notify) {
        self.observers.finished.push(cb);
    }

    pub fn on_error_occurred(&mut self, cb: ErrorNotify) {
        self.observers.error.push(cb);
    }

    pub fn on_ready_read_standard_output(&mut self, cb: Notify) {
        self.observers.ready_read_stdout.push(cb);
    }

    pub fn on_ready_read_standard_error(&mut self, cb: Notify) {
        self.observers.ready_read_stderr.push(cb);
    }

    // ---- starting ----

    /// Start a run with a backend chosen from the setup.
    ///
    /// Terminal mode always uses the terminal backend. Device executables go
    /// through the device hooks. Everything else uses the configured
    /// backend, where `ProcessImpl::Default` means the launcher unless
    /// `PROCCTL_USE_DIRECT_PROCESS` is set.
    pub fn start(&mut self) {
        if self.is_active() {
            warn!(command = %self.setup.command_line, "process already running; start ignored");
            return;
        }

        if self.uses_terminal() {
            self.start_with_backend(Box::new(TerminalBackend::new()));
            return;
        }

        let exe = self.setup.command_line.executable().to_path_buf();
        if needs_device(&exe) {
            match self.device_hooks.clone() {
                Some(hooks) => match hooks.create_backend(&exe) {
                    Some(backend) => self.start_with_backend(backend),
                    None => {
                        self.clear_for_run();
                        hooks.start_process(self);
                    }
                },
                None => {
                    self.clear_for_run();
                    self.report_start_failure(format!(
                        "Cannot start \"{}\": no device support available.",
                        exe.display()
                    ));
                }
            }
            return;
        }

        let backend: Box<dyn ProcessBackend> = match self.effective_process_impl() {
            ProcessImpl::Direct => Box::new(DirectChildBackend::new()),
            ProcessImpl::Launcher | ProcessImpl::Default => Box::new(LauncherBackend::new()),
        };
        self.start_with_backend(backend);
    }

    /// Start a run on `backend`, replacing any previous backend.
    pub fn start_with_backend(&mut self, mut backend: Box<dyn ProcessBackend>) {
        if self.is_active() {
            warn!(command = %self.setup.command_line, "process already running; start ignored");
            return;
        }

        self.clear_for_run();
        self.setup.error_string.clear();

        let mut setup = self.setup.clone();
        setup.command_line = self.full_command_line();
        setup.environment = self.full_environment();

        debug!(
            process = self.process_number,
            backend = backend.kind(),
            blocking = ?self.blocking_type,
            command = %setup.command_line,
            "process starting"
        );

        diagnostics::measure("start", &START_STATS, || backend.start(setup));
        self.backend = Some(backend);
    }

    fn effective_process_impl(&self) -> ProcessImpl {
        match self.setup.process_impl {
            ProcessImpl::Default if std::env::var_os("PROCCTL_USE_DIRECT_PROCESS").is_some() => {
                ProcessImpl::Direct
            }
            ProcessImpl::Default => ProcessImpl::Launcher,
            other => other,
        }
    }

    fn clear_for_run(&mut self) {
        self.process_number = PROCESS_NUMBER.fetch_add(1, Ordering::Relaxed) + 1;
        self.run_started = Some(Instant::now());
        self.hang.reset();
        self.stdout.clear_for_run();
        self.stderr.clear_for_run();
        self.result = RunResult::StartFailed;
        self.start_failure = StartFailure::NoFailure;
        self.run_finished = false;
        self.finished_seen = false;
    }

    /// The command actually executed: wrapped in the elevation command when
    /// running as root on a non-Windows host.
    pub fn full_command_line(&self) -> CommandLine {
        if self.setup.run_as_root && !OsType::host().is_windows() {
            self.setup.command_line.wrapped_in(&self.setup.elevation)
        } else {
            self.setup.command_line.clone()
        }
    }

    /// The environment actually passed: the explicit one if set, else the
    /// calling process's environment.
    pub fn full_environment(&self) -> Environment {
        if self.setup.have_environment {
            if self.setup.environment.is_empty() {
                warn!(
                    command = %self.setup.command_line,
                    "starting process with an explicitly empty environment"
                );
            }
            self.setup.environment.clone()
        } else {
            Environment::system()
        }
    }

    /// Latch a start failure that happened before any backend could run,
    /// for example inside a device hook.
    pub fn report_start_failure(&mut self, message: impl Into<String>) {
        let message = message.into();
        warn!(command = %self.setup.command_line, %message, "process start failed");
        self.setup.error_string = message;
        if self.result != RunResult::Hang {
            self.result = RunResult::StartFailed;
        }
        self.start_failure = StartFailure::Other;
        self.run_finished = true;
        self.observers.notify_error(ProcessErrorKind::FailedToStart);
    }

    // ---- control ----

    pub fn terminate(&mut self) {
        if let Some(backend) = self.backend.as_mut() {
            backend.terminate();
        }
    }

    pub fn kill(&mut self) {
        if let Some(backend) = self.backend.as_mut() {
            backend.kill();
        }
    }

    pub fn close(&mut self) {
        if let Some(backend) = self.backend.as_mut() {
            backend.close();
        }
    }

    pub fn close_write_channel(&mut self) {
        if let Some(backend) = self.backend.as_mut() {
            backend.close_write_channel();
        }
    }

    /// Write to the child's stdin. Only valid in writer mode with an active
    /// backend.
    pub fn write(&mut self, data: &[u8]) -> Result<usize> {
        if self.setup.process_mode != ProcessMode::Writer {
            warn!(command = %self.setup.command_line, "write() called on a process in reader mode");
            return Err(ProcctlError::NotWriter);
        }
        let backend = self.backend.as_mut().ok_or(ProcctlError::NoActiveProcess)?;
        backend.write(data)
    }

    /// Terminate, wait briefly, then kill. Returns whether the process is no
    /// longer running.
    pub fn stop_process(&mut self) -> bool {
        if self.state() == ProcessState::NotRunning {
            return true;
        }
        self.terminate();
        if self.wait_for_finished(Some(STOP_WAIT)) {
            return true;
        }
        self.kill();
        self.wait_for_finished(Some(STOP_WAIT));
        self.state() == ProcessState::NotRunning
    }

    // ---- waiting ----

    /// Dispatch every event that is already queued, without blocking.
    pub fn process_events(&mut self) {
        while let Some(event) = self.backend.as_mut().and_then(|b| b.next_event(Some(Duration::ZERO))) {
            self.dispatch(event);
        }
    }

    /// Wait until the process left the starting state. True if it runs.
    pub fn wait_for_started(&mut self, timeout: Option<Duration>) -> bool {
        if self.backend.is_none() {
            return false;
        }
        diagnostics::measure("wait_for_started", &WAIT_FOR_STARTED_STATS, || {
            self.pump_until(timeout, |p| p.state() != ProcessState::Starting)
        });
        self.state() == ProcessState::Running
    }

    /// Wait for at least one new chunk of output.
    pub fn wait_for_ready_read(&mut self, timeout: Option<Duration>) -> bool {
        if self.state() == ProcessState::NotRunning {
            return false;
        }
        let before = self.ready_reads;
        self.pump_until(timeout, |p| {
            p.ready_reads > before || p.state() == ProcessState::NotRunning
        });
        self.ready_reads > before
    }

    /// Wait for the finished notification. False on timeout, on a failed
    /// start, or when no process is running.
    pub fn wait_for_finished(&mut self, timeout: Option<Duration>) -> bool {
        if self.state() == ProcessState::NotRunning {
            return false;
        }
        self.pump_until(timeout, |p| {
            p.finished_seen || p.state() == ProcessState::NotRunning
        });
        self.finished_seen
    }

    fn pump_until(&mut self, timeout: Option<Duration>, done: impl Fn(&Self) -> bool) -> bool {
        let deadline = timeout.map(|t| Instant::now() + t);
        loop {
            if done(self) {
                return true;
            }
            let remaining = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return false;
                    }
                    Some(deadline - now)
                }
                None => None,
            };
            let Some(backend) = self.backend.as_mut() else {
                return false;
            };
            match backend.next_event(remaining) {
                Some(event) => self.dispatch(event),
                None if deadline.is_some() => continue,
                None => return false,
            }
        }
    }

    // ---- event handling ----

    fn dispatch(&mut self, event: ProcessEvent) {
        match event {
            ProcessEvent::Started => {
                self.hang.reset();
                debug!(process = self.process_number, pid = ?self.process_id(), "process running");
                Observers::notify(&mut self.observers.started);
            }
            ProcessEvent::ReadyReadStandardOutput => {
                self.hang.reset();
                self.ready_reads += 1;
                if let Some(backend) = self.backend.as_mut() {
                    let data = backend.read_all_standard_output();
                    self.stdout.append(&data);
                }
                Observers::notify(&mut self.observers.ready_read_stdout);
            }
            ProcessEvent::ReadyReadStandardError => {
                self.hang.reset();
                self.ready_reads += 1;
                if let Some(backend) = self.backend.as_mut() {
                    let data = backend.read_all_standard_error();
                    self.stderr.append(&data);
                }
                Observers::notify(&mut self.observers.ready_read_stderr);
            }
            ProcessEvent::Finished => self.handle_finished(),
            ProcessEvent::ErrorOccurred(error) => self.handle_error(error),
        }
    }

    fn handle_finished(&mut self) {
        self.hang.reset();
        let (exit_code, exit_status) = match self.backend.as_ref() {
            Some(backend) => (backend.exit_code(), backend.exit_status()),
            None => (0, ExitStatus::NormalExit),
        };

        match exit_status {
            ExitStatus::NormalExit => {
                self.result = interpret_exit_code(exit_code, self.exit_code_interpreter.as_ref());
            }
            ExitStatus::CrashExit => {
                // A hang that led to the kill stays a hang.
                if self.result != RunResult::Hang {
                    self.result = RunResult::TerminatedAbnormally;
                }
            }
        }

        self.run_finished = true;
        self.finished_seen = true;
        self.stdout.handle_rest();
        self.stderr.handle_rest();
        self.log_finished(exit_code);
        Observers::notify(&mut self.observers.finished);
    }

    fn handle_error(&mut self, error: ProcessErrorKind) {
        self.hang.reset();
        if error == ProcessErrorKind::FailedToStart {
            if self.result != RunResult::Hang {
                self.result = RunResult::StartFailed;
            }
            self.start_failure = StartFailure::WrongCommand;
            self.run_finished = true;
            info!(
                process = self.process_number,
                error = self.error_string(),
                "process failed to start"
            );
        } else {
            self.start_failure = StartFailure::Other;
            if self.state() == ProcessState::NotRunning && !self.run_finished {
                if self.result != RunResult::Hang {
                    self.result = RunResult::TerminatedAbnormally;
                }
                self.run_finished = true;
            }
        }
        self.observers.notify_error(error);
    }

    fn log_finished(&self, exit_code: i32) {
        let elapsed_ms = self
            .run_started
            .map(|t| u64::try_from(t.elapsed().as_millis()).unwrap_or(u64::MAX))
            .unwrap_or_default();
        debug!(
            process = self.process_number,
            result = %self.result,
            exit_code,
            stdout_bytes = self.stdout.raw_data().len(),
            stderr_bytes = self.stderr.raw_data().len(),
            elapsed_ms,
            "process finished"
        );
        if !self.stdout.raw_data().is_empty() {
            trace!(target: "procctl::process::stdout", process = self.process_number, "{}", self.std_out());
        }
        if !self.stderr.raw_data().is_empty() {
            trace!(target: "procctl::process::stderr", process = self.process_number, "{}", self.std_err());
        }
    }

    fn handle_hang_tick(&mut self) {
        if !self.is_active() {
            return;
        }
        if self.hang.tick() == HangCheck::Alive {
            trace!(process = self.process_number, count = self.hang.count(), "hang tick");
            return;
        }

        warn!(
            process = self.process_number,
            command = %self.setup.command_line,
            "no activity within the timeout; process considered hanging"
        );
        self.hang.set_waiting_for_user(true);
        let stop = !self.timeout_prompt_enabled || self.ask_to_kill();
        self.hang.set_waiting_for_user(false);
        if stop {
            self.stop_process();
            self.result = RunResult::Hang;
        } else {
            self.hang.reset();
        }
    }

    fn ask_to_kill(&mut self) -> bool {
        match self.timeout_prompt.as_mut() {
            Some(prompt) => prompt(&self.setup.command_line),
            None => true,
        }
    }

    // ---- synchronous helpers ----

    /// Drain output until the process finishes or goes quiet.
    ///
    /// Each round waits up to `timeout_s` seconds (unbounded if not
    /// positive) for the process to finish, then collects new output. A
    /// round that produced output is followed by another one. A quiet round
    /// ends the loop unless `allow_prompt` is set and the timeout prompt
    /// answers "keep waiting". Returns whether the process finished.
    pub fn read_data_from_process(
        &mut self,
        timeout_s: i64,
        mut stdout: Option<&mut Vec<u8>>,
        mut stderr: Option<&mut Vec<u8>>,
        allow_prompt: bool,
    ) -> bool {
        if self.state() != ProcessState::Running {
            warn!("read_data_from_process: process in non-running state passed in");
            return false;
        }
        let timeout = u64::try_from(timeout_s)
            .ok()
            .filter(|s| *s > 0)
            .map(Duration::from_secs);

        loop {
            let finished =
                self.wait_for_finished(timeout) || self.state() == ProcessState::NotRunning;

            let mut has_data = false;
            let new_out = self.read_all_standard_output();
            if !new_out.is_empty() {
                has_data = true;
                if let Some(buf) = stdout.as_deref_mut() {
                    buf.extend_from_slice(&new_out);
                }
            }
            let new_err = self.read_all_standard_error();
            if !new_err.is_empty() {
                has_data = true;
                if let Some(buf) = stderr.as_deref_mut() {
                    buf.extend_from_slice(&new_err);
                }
            }

            if finished {
                return true;
            }
            if has_data {
                continue;
            }
            let keep_waiting = allow_prompt && !self.ask_to_kill();
            if !keep_waiting {
                return false;
            }
        }
    }

    /// Start the process and block until it produced a result.
    ///
    /// Fails only when called while another blocking run on this controller
    /// is still suspended.
    pub fn run_blocking(&mut self, mode: EventLoopMode) -> Result<RunResult> {
        if self.in_blocking_run {
            return Err(ProcctlError::BlockingRunActive);
        }
        self.in_blocking_run = true;
        self.run_blocking_inner(mode);
        self.in_blocking_run = false;
        Ok(self.result)
    }

    fn run_blocking_inner(&mut self, mode: EventLoopMode) {
        if needs_device(self.setup.command_line.executable()) {
            self.start();
            self.wait_for_finished(None);
            return;
        }

        self.blocking_type = Some(mode);
        self.start();
        self.blocking_type = None;

        match mode {
            EventLoopMode::WithEventLoop => {
                if self.start_failure == StartFailure::NoFailure {
                    self.run_event_loop();
                    self.drain_backend();
                }
            }
            EventLoopMode::NoEventLoop => {
                let timeout = self.hang.timeout();
                if !self.wait_for_started(timeout) {
                    self.result = RunResult::StartFailed;
                    return;
                }
                if !self.wait_for_finished(timeout) {
                    self.result = RunResult::Hang;
                    self.terminate();
                    if !self.wait_for_finished(Some(HANG_KILL_WAIT)) {
                        self.kill();
                        self.wait_for_finished(Some(HANG_KILL_WAIT));
                    }
                }
                if self.state() != ProcessState::NotRunning {
                    return;
                }
                self.drain_backend();
            }
        }
    }

    /// Pump events on this thread until the run ends, ticking the hang
    /// monitor once per interval.
    fn run_event_loop(&mut self) {
        let mut next_tick = Instant::now() + HANG_TICK_INTERVAL;
        while !self.run_finished && self.is_active() {
            let now = Instant::now();
            if now >= next_tick {
                self.handle_hang_tick();
                next_tick += HANG_TICK_INTERVAL;
                continue;
            }
            let Some(backend) = self.backend.as_mut() else {
                break;
            };
            if let Some(event) = backend.next_event(Some(next_tick - now)) {
                self.dispatch(event);
            }
        }
    }

    fn drain_backend(&mut self) {
        self.process_events();
        if let Some(backend) = self.backend.as_mut() {
            let out = backend.read_all_standard_output();
            let err = backend.read_all_standard_error();
            self.stdout.append(&out);
            self.stderr.append(&err);
        }
    }

    // ---- state and results ----

    pub fn state(&self) -> ProcessState {
        self.backend
            .as_ref()
            .map(|b| b.state())
            .unwrap_or(ProcessState::NotRunning)
    }

    fn is_active(&self) -> bool {
        self.state() != ProcessState::NotRunning
    }

    pub fn result(&self) -> RunResult {
        self.result
    }

    pub fn set_result(&mut self, result: RunResult) {
        self.result = result;
    }

    /// 255 after a start failure, like a process that could not be found.
    pub fn exit_code(&self) -> i32 {
        if self.start_failure == StartFailure::WrongCommand {
            return 255;
        }
        self.backend.as_ref().map(|b| b.exit_code()).unwrap_or(0)
    }

    pub fn exit_status(&self) -> ExitStatus {
        self.backend
            .as_ref()
            .map(|b| b.exit_status())
            .unwrap_or_default()
    }

    pub fn error(&self) -> Option<ProcessErrorKind> {
        self.backend.as_ref().and_then(|b| b.error())
    }

    pub fn error_string(&self) -> &str {
        match self.backend.as_ref().map(|b| b.error_string()) {
            Some(s) if !s.is_empty() => s,
            _ => &self.setup.error_string,
        }
    }

    pub fn process_id(&self) -> Option<u32> {
        self.backend.as_ref().and_then(|b| b.process_id())
    }

    pub fn exit_message(&self) -> String {
        exit_message(
            &self.setup.command_line,
            self.result,
            self.exit_code(),
            self.hang.max_count(),
        )
    }

    // ---- output ----

    pub fn std_out(&self) -> String {
        self.stdout.text()
    }

    pub fn std_err(&self) -> String {
        self.stderr.text()
    }

    /// stdout and stderr joined, with a newline between them if needed.
    pub fn all_output(&self) -> String {
        let out = self.std_out();
        let err = self.std_err();
        if !out.is_empty() && !err.is_empty() {
            let mut all = out;
            if !all.ends_with('\n') {
                all.push('\n');
            }
            all.push_str(&err);
            return all;
        }
        if out.is_empty() { err } else { out }
    }

    pub fn all_raw_output(&self) -> Vec<u8> {
        let out = self.stdout.raw_data();
        let err = self.stderr.raw_data();
        if !out.is_empty() && !err.is_empty() {
            let mut all = out.to_vec();
            if all.last() != Some(&b'\n') {
                all.push(b'\n');
            }
            all.extend_from_slice(err);
            return all;
        }
        if out.is_empty() { err.to_vec() } else { out.to_vec() }
    }

    pub fn raw_std_out(&self) -> &[u8] {
        self.stdout.raw_data()
    }

    /// Take the retained stdout bytes.
    pub fn read_all_standard_output(&mut self) -> Vec<u8> {
        self.process_events();
        self.stdout.take_raw_data()
    }

    /// Take the retained stderr bytes.
    pub fn read_all_standard_error(&mut self) -> Vec<u8> {
        self.process_events();
        self.stderr.take_raw_data()
    }

    // ---- misc ----

    /// A shell command reproducing this run outside the controller.
    pub fn to_standalone_command_line(&self) -> String {
        let mut parts = vec!["/usr/bin/env".to_string()];
        if let Some(dir) = &self.setup.working_directory {
            parts.push("-C".to_string());
            parts.push(dir.to_string_lossy().into_owned());
        }
        parts.push("-i".to_string());
        parts.extend(self.setup.environment.to_string_list());
        parts.push(
            self.setup
                .command_line
                .executable()
                .to_string_lossy()
                .into_owned(),
        );
        parts.extend(self.setup.command_line.arguments().iter().cloned());
        join_args(&parts, OsType::Linux)
    }

    /// Environment a binary would see by default: the device's for device
    /// paths, else the calling process's.
    pub fn system_environment_for_binary(&self, executable: &Path) -> Environment {
        if needs_device(executable) {
            if let Some(hooks) = &self.device_hooks {
                return hooks.system_environment_for_binary(executable);
            }
        }
        Environment::system()
    }
}
