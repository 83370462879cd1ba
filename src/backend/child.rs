// src/backend/child.rs

//! Async driver for one OS child process.
//!
//! The driver runs on the I/O runtime, pumps the child's pipes into
//! `BackendMessage::Output` chunks, executes control requests, and finishes
//! with exactly one `Finished` (or a `FailedToStart` error if the spawn
//! fails). All reader output is forwarded before `Finished`.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStdin, Command};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::backend::BackendMessage;
use crate::setup::ProcessSetupData;
use crate::types::{Channel, ChannelMode, ExitStatus, ProcessErrorKind, ProcessMode};

const READ_CHUNK: usize = 8192;
const READER_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

pub(crate) type MessageSink = Arc<dyn Fn(BackendMessage) + Send + Sync>;

#[derive(Debug)]
pub(crate) enum ChildControl {
    Write(Vec<u8>),
    CloseWriteChannel,
    Terminate,
    Kill,
}

#[derive(Debug, Clone)]
pub(crate) struct ChildRequest {
    pub program: PathBuf,
    pub arguments: Vec<String>,
    pub setup: ProcessSetupData,
}

/// Handle to a spawned driver.
///
/// Dropping the handle closes the control channel, which the driver treats
/// as a kill request.
#[derive(Debug)]
pub(crate) struct ChildController {
    control: mpsc::UnboundedSender<ChildControl>,
    handle: JoinHandle<()>,
}

impl ChildController {
    /// Returns false when the driver has already finished.
    pub fn send(&self, control: ChildControl) -> bool {
        self.control.send(control).is_ok()
    }

    pub fn control_sender(&self) -> mpsc::UnboundedSender<ChildControl> {
        self.control.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

pub(crate) fn spawn_child(handle: &Handle, request: ChildRequest, sink: MessageSink) -> ChildController {
    let (control, control_rx) = mpsc::unbounded_channel();
    let handle = handle.spawn(run_child(request, control_rx, sink));
    ChildController { control, handle }
}

async fn run_child(
    request: ChildRequest,
    mut control_rx: mpsc::UnboundedReceiver<ChildControl>,
    sink: MessageSink,
) {
    let program = request.program.display().to_string();

    let mut child = match build_command(&request).and_then(|mut cmd| cmd.spawn()) {
        Ok(child) => child,
        Err(e) => {
            error!(%program, error = %e, "failed to spawn process");
            sink(BackendMessage::Error {
                error: ProcessErrorKind::FailedToStart,
                message: format!("Failed to start \"{program}\": {e}"),
            });
            return;
        }
    };

    let pid = child.id();
    info!(%program, ?pid, "process started");
    sink(BackendMessage::Started { pid });

    let setup = &request.setup;
    let stderr_channel = if setup.process_channel_mode == ChannelMode::Merged {
        Channel::Stdout
    } else {
        Channel::Stderr
    };
    let mut readers = Vec::new();
    if let Some(out) = child.stdout.take() {
        readers.push(tokio::spawn(pump(out, Channel::Stdout, sink.clone())));
    }
    if let Some(err) = child.stderr.take() {
        readers.push(tokio::spawn(pump(err, stderr_channel, sink.clone())));
    }

    // Readers must be draining before anything is written, or a child that
    // echoes its input blocks on a full stdout pipe.
    let mut stdin = child.stdin.take().map(|pipe| StdinWriter::spawn(pipe, sink.clone()));
    if !setup.write_data.is_empty() {
        queue_write(&stdin, setup.write_data.clone(), &sink);
    }
    if setup.process_mode == ProcessMode::Reader {
        if let Some(writer) = stdin.as_mut() {
            writer.close();
        }
    }

    let mut stop_requested = false;
    let mut control_open = true;
    let status = loop {
        tokio::select! {
            status = child.wait() => break status,
            control = control_rx.recv(), if control_open => match control {
                Some(ChildControl::Write(data)) => queue_write(&stdin, data, &sink),
                Some(ChildControl::CloseWriteChannel) => {
                    debug!(%program, "closing write channel");
                    if let Some(writer) = stdin.as_mut() {
                        writer.close();
                    }
                }
                Some(ChildControl::Terminate) => {
                    stop_requested = true;
                    abort_writer(&mut stdin);
                    terminate_child(&mut child);
                }
                Some(ChildControl::Kill) => {
                    stop_requested = true;
                    abort_writer(&mut stdin);
                    kill_child(&mut child);
                }
                None => {
                    debug!(%program, "control channel closed; killing process");
                    control_open = false;
                    stop_requested = true;
                    abort_writer(&mut stdin);
                    kill_child(&mut child);
                }
            }
        }
    };
    abort_writer(&mut stdin);

    for mut reader in readers {
        if tokio::time::timeout(READER_DRAIN_TIMEOUT, &mut reader).await.is_err() {
            warn!(%program, "output pipe still open after exit; abandoning reader");
            reader.abort();
        }
    }

    let (exit_code, exit_status) = match status {
        Ok(status) => classify_exit(status, stop_requested),
        Err(e) => {
            error!(%program, error = %e, "waiting for process failed");
            sink(BackendMessage::Error {
                error: ProcessErrorKind::UnknownError,
                message: format!("Waiting for \"{program}\" failed: {e}"),
            });
            (-1, ExitStatus::CrashExit)
        }
    };

    if exit_status == ExitStatus::CrashExit {
        sink(BackendMessage::Error {
            error: ProcessErrorKind::Crashed,
            message: "The process crashed.".to_string(),
        });
    }

    info!(%program, exit_code, ?exit_status, "process exited");
    sink(BackendMessage::Finished {
        exit_code,
        exit_status,
    });
}

fn build_command(request: &ChildRequest) -> std::io::Result<Command> {
    let setup = &request.setup;

    #[cfg(windows)]
    let mut cmd = {
        use crate::command::{OsType, join_args};
        let mut cmd = Command::new(&request.program);
        if !request.arguments.is_empty() {
            cmd.raw_arg(join_args(&request.arguments, OsType::Windows));
        }
        cmd
    };
    #[cfg(not(windows))]
    let mut cmd = {
        let mut cmd = match low_priority_wrapper(setup) {
            Some(nice) => {
                let mut cmd = Command::new(nice);
                cmd.args(["-n", "10"]).arg(&request.program);
                cmd
            }
            None => Command::new(&request.program),
        };
        cmd.args(&request.arguments);
        cmd
    };

    if let Some(dir) = &setup.working_directory {
        cmd.current_dir(dir);
    }
    cmd.env_clear();
    cmd.envs(setup.environment.iter());

    let stdin = match &setup.standard_input_file {
        Some(path) => Stdio::from(std::fs::File::open(path)?),
        None if setup.needs_stdin_pipe() => Stdio::piped(),
        None => Stdio::null(),
    };
    cmd.stdin(stdin);

    if setup.process_channel_mode == ChannelMode::Forwarded {
        cmd.stdout(Stdio::inherit()).stderr(Stdio::inherit());
    } else {
        cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
    }

    cmd.kill_on_drop(true);
    apply_platform_options(&mut cmd, setup);
    Ok(cmd)
}

/// `nice` runs the target at reduced priority and then execs it, so the
/// pid stays that of the target.
#[cfg(not(windows))]
fn low_priority_wrapper(setup: &ProcessSetupData) -> Option<PathBuf> {
    if !setup.low_priority {
        return None;
    }
    let nice = crate::locate::locate_binary_in_env("nice");
    if nice.is_none() {
        warn!("`nice` not found on PATH; running at normal priority");
    }
    nice
}

#[cfg(unix)]
fn apply_platform_options(cmd: &mut Command, setup: &ProcessSetupData) {
    if !setup.unix_terminal_disabled {
        return;
    }
    // SAFETY: setsid(2) is async-signal-safe and the closure allocates nothing.
    unsafe {
        cmd.pre_exec(|| {
            nix::unistd::setsid().map_err(std::io::Error::from)?;
            Ok(())
        });
    }
}

#[cfg(windows)]
fn apply_platform_options(cmd: &mut Command, setup: &ProcessSetupData) {
    const BELOW_NORMAL_PRIORITY_CLASS: u32 = 0x0000_4000;
    if setup.low_priority {
        cmd.creation_flags(BELOW_NORMAL_PRIORITY_CLASS);
    }
}

/// Feeds the child's stdin from its own task so that a full pipe never
/// stalls the driver loop.
///
/// Closing the sender lets queued data flush before the pipe is dropped.
/// Aborting drops the pipe at once, discarding whatever is still queued.
struct StdinWriter {
    tx: Option<mpsc::UnboundedSender<Vec<u8>>>,
    task: JoinHandle<()>,
}

impl StdinWriter {
    fn spawn(mut pipe: ChildStdin, sink: MessageSink) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Vec<u8>>();
        let task = tokio::spawn(async move {
            while let Some(data) = rx.recv().await {
                if let Err(e) = pipe.write_all(&data).await {
                    warn!(error = %e, "writing to process stdin failed");
                    sink(BackendMessage::Error {
                        error: ProcessErrorKind::WriteError,
                        message: format!("Writing to the process failed: {e}"),
                    });
                    return;
                }
            }
        });
        Self { tx: Some(tx), task }
    }

    fn close(&mut self) {
        self.tx = None;
    }
}

fn queue_write(stdin: &Option<StdinWriter>, data: Vec<u8>, sink: &MessageSink) {
    let sent = stdin
        .as_ref()
        .and_then(|writer| writer.tx.as_ref())
        .is_some_and(|tx| tx.send(data).is_ok());
    if !sent {
        warn!("write requested but stdin is not open");
        sink(BackendMessage::Error {
            error: ProcessErrorKind::WriteError,
            message: "The write channel is closed.".to_string(),
        });
    }
}

fn abort_writer(stdin: &mut Option<StdinWriter>) {
    if let Some(writer) = stdin.take() {
        writer.task.abort();
    }
}

async fn pump<R: AsyncRead + Unpin>(mut reader: R, channel: Channel, sink: MessageSink) {
    let mut buf = vec![0u8; READ_CHUNK];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => sink(BackendMessage::Output {
                channel,
                data: buf[..n].to_vec(),
            }),
            Err(e) => {
                warn!(?channel, error = %e, "reading process output failed");
                sink(BackendMessage::Error {
                    error: ProcessErrorKind::ReadError,
                    message: format!("Reading from the process failed: {e}"),
                });
                break;
            }
        }
    }
}

#[cfg(unix)]
fn terminate_child(child: &mut Child) {
    use nix::sys::signal::{Signal, kill};
    use nix::unistd::Pid;

    let Some(pid) = child.id() else {
        return;
    };
    if let Err(e) = kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
        debug!(pid, error = %e, "SIGTERM failed");
    }
}

#[cfg(not(unix))]
fn terminate_child(child: &mut Child) {
    kill_child(child);
}

fn kill_child(child: &mut Child) {
    if let Err(e) = child.start_kill() {
        debug!(error = %e, "kill failed; process probably already exited");
    }
}

fn classify_exit(status: std::process::ExitStatus, stop_requested: bool) -> (i32, ExitStatus) {
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return (signal, ExitStatus::CrashExit);
        }
    }
    let code = status.code().unwrap_or(-1);
    if stop_requested && cfg!(not(unix)) {
        (code, ExitStatus::CrashExit)
    } else {
        (code, ExitStatus::NormalExit)
    }
}
