// src/config/model.rs

use encoding_rs::Encoding;
use serde::Deserialize;

use crate::command::CommandLine;
use crate::controller::Process;
use crate::setup::TerminalCommand;
use crate::types::{ChannelMode, EventLoopMode, ProcessImpl};

/// Configuration as read from a TOML file, before validation.
///
/// ```toml
/// [process]
/// timeout_s = 30
/// backend = "direct"
/// codec = "windows-1252"
/// channel_mode = "merged"
/// event_loop = true
///
/// [terminal]
/// command = "xterm"
/// execute_args = ["-e"]
///
/// [elevation]
/// command = "doas"
/// args = []
/// ```
///
/// All sections are optional and have reasonable defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub process: ProcessSection,

    /// Terminal emulator override. Without it the host default (or
    /// `PROCCTL_TERMINAL`) is used.
    #[serde(default)]
    pub terminal: Option<TerminalSection>,

    #[serde(default)]
    pub elevation: ElevationSection,
}

/// `[process]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ProcessSection {
    /// Seconds without activity before a process counts as hanging.
    /// Zero or negative disables the watchdog.
    #[serde(default = "default_timeout_s")]
    pub timeout_s: i64,

    #[serde(default)]
    pub backend: ProcessImpl,

    /// Encoding label understood by `encoding_rs` (`utf-8`, `latin1`, ...).
    #[serde(default = "default_codec")]
    pub codec: String,

    #[serde(default)]
    pub channel_mode: ChannelMode,

    /// Block with an event loop instead of plain bounded waits.
    #[serde(default)]
    pub event_loop: bool,

    /// Ask on the terminal before stopping a hanging process.
    #[serde(default)]
    pub timeout_prompt: bool,
}

fn default_timeout_s() -> i64 {
    10
}

fn default_codec() -> String {
    "utf-8".to_string()
}

impl Default for ProcessSection {
    fn default() -> Self {
        Self {
            timeout_s: default_timeout_s(),
            backend: ProcessImpl::Default,
            codec: default_codec(),
            channel_mode: ChannelMode::Separate,
            event_loop: false,
            timeout_prompt: false,
        }
    }
}

/// `[terminal]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct TerminalSection {
    pub command: String,

    #[serde(default)]
    pub execute_args: Vec<String>,

    #[serde(default)]
    pub needs_quotes: bool,
}

/// `[elevation]` section: the prefix used for run-as-root.
#[derive(Debug, Clone, Deserialize)]
pub struct ElevationSection {
    #[serde(default = "default_elevation_command")]
    pub command: String,

    #[serde(default = "default_elevation_args")]
    pub args: Vec<String>,
}

fn default_elevation_command() -> String {
    "sudo".to_string()
}

fn default_elevation_args() -> Vec<String> {
    vec!["-A".to_string()]
}

impl Default for ElevationSection {
    fn default() -> Self {
        Self {
            command: default_elevation_command(),
            args: default_elevation_args(),
        }
    }
}

/// Validated configuration.
///
/// Built from a `RawConfigFile` through `TryFrom`, which resolves the codec
/// label and checks the command sections.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub process: ProcessSection,
    pub codec: &'static Encoding,
    pub terminal: Option<TerminalCommand>,
    pub elevation: CommandLine,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        process: ProcessSection,
        codec: &'static Encoding,
        terminal: Option<TerminalCommand>,
        elevation: CommandLine,
    ) -> Self {
        Self {
            process,
            codec,
            terminal,
            elevation,
        }
    }

    pub fn event_loop_mode(&self) -> EventLoopMode {
        if self.process.event_loop {
            EventLoopMode::WithEventLoop
        } else {
            EventLoopMode::NoEventLoop
        }
    }

    /// Copy the configured defaults into `process`.
    pub fn apply_to(&self, process: &mut Process) {
        process.set_timeout_s(self.process.timeout_s);
        process.set_process_impl(self.process.backend);
        process.set_codec(self.codec);
        process.set_process_channel_mode(self.process.channel_mode);
        process.set_time_out_message_box_enabled(self.process.timeout_prompt);
        process.set_elevation_command(self.elevation.clone());
        if let Some(terminal) = &self.terminal {
            process.set_terminal_command(terminal.clone());
        }
    }
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self::new_unchecked(
            ProcessSection::default(),
            encoding_rs::UTF_8,
            None,
            CommandLine::with_args(default_elevation_command(), default_elevation_args()),
        )
    }
}
