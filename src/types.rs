// src/types.rs

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// Which backend strategy creates the OS process.
///
/// - `Default`: decided at start time. `PROCCTL_USE_DIRECT_PROCESS` selects
///   `Direct`, otherwise `Launcher` is used.
/// - `Direct`: the child is spawned and supervised directly.
/// - `Launcher`: the launcher service spawns the child on our behalf and
///   relays its events back through a token-keyed handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessImpl {
    #[default]
    Default,
    Direct,
    Launcher,
}

impl FromStr for ProcessImpl {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "default" => Ok(ProcessImpl::Default),
            "direct" => Ok(ProcessImpl::Direct),
            "launcher" => Ok(ProcessImpl::Launcher),
            other => Err(format!(
                "invalid backend: {other} (expected \"default\", \"direct\" or \"launcher\")"
            )),
        }
    }
}

/// Whether the process runs inside a visible terminal emulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TerminalMode {
    #[default]
    Off,
    /// Run in a terminal; the window closes when the command ends.
    Run,
    /// Run in a terminal and wait for <RETURN> before closing the window.
    KeepOpen,
}

impl FromStr for TerminalMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "off" => Ok(TerminalMode::Off),
            "run" | "on" => Ok(TerminalMode::Run),
            "keep-open" | "keep_open" => Ok(TerminalMode::KeepOpen),
            other => Err(format!(
                "invalid terminal mode: {other} (expected \"off\", \"run\" or \"keep-open\")"
            )),
        }
    }
}

/// Whether stdin stays open for `write()` after start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProcessMode {
    #[default]
    Reader,
    Writer,
}

/// How stdout and stderr of the child are routed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelMode {
    /// Two pipes, two channel buffers.
    #[default]
    Separate,
    /// stderr data is delivered on the stdout channel.
    Merged,
    /// Both streams are inherited from the calling process.
    Forwarded,
}

impl FromStr for ChannelMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "separate" => Ok(ChannelMode::Separate),
            "merged" => Ok(ChannelMode::Merged),
            "forwarded" => Ok(ChannelMode::Forwarded),
            other => Err(format!(
                "invalid channel mode: {other} (expected \"separate\", \"merged\" or \"forwarded\")"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProcessState {
    #[default]
    NotRunning,
    Starting,
    Running,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExitStatus {
    #[default]
    NormalExit,
    CrashExit,
}

/// OS-level error classification carried by `ErrorOccurred` notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessErrorKind {
    FailedToStart,
    Crashed,
    Timedout,
    WriteError,
    ReadError,
    UnknownError,
}

impl fmt::Display for ProcessErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProcessErrorKind::FailedToStart => "failed to start",
            ProcessErrorKind::Crashed => "crashed",
            ProcessErrorKind::Timedout => "timed out",
            ProcessErrorKind::WriteError => "write error",
            ProcessErrorKind::ReadError => "read error",
            ProcessErrorKind::UnknownError => "unknown error",
        };
        f.write_str(s)
    }
}

/// Terminal classification of one run.
///
/// Unless an exit code interpreter is installed, `FinishedWithSuccess`
/// corresponds to exit code 0 and `FinishedWithError` to any other code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunResult {
    FinishedWithSuccess,
    FinishedWithError,
    /// Killed or crashed without a prior hang.
    TerminatedAbnormally,
    #[default]
    StartFailed,
    /// No activity within the timeout; the process was stopped.
    Hang,
}

impl fmt::Display for RunResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunResult::FinishedWithSuccess => "finished with success",
            RunResult::FinishedWithError => "finished with error",
            RunResult::TerminatedAbnormally => "terminated abnormally",
            RunResult::StartFailed => "start failed",
            RunResult::Hang => "hang",
        };
        f.write_str(s)
    }
}

/// How `Process::run_blocking` waits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EventLoopMode {
    /// Bounded `wait_for_started` + `wait_for_finished`.
    #[default]
    NoEventLoop,
    /// Pump events on the calling thread with a one-second hang tick.
    WithEventLoop,
}

impl fmt::Display for EventLoopMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventLoopMode::NoEventLoop => f.write_str("blocking without event loop"),
            EventLoopMode::WithEventLoop => f.write_str("blocking with event loop"),
        }
    }
}

/// One of the two standard output streams of a child.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Stdout,
    Stderr,
}
