// src/setup.rs

//! Per-run configuration owned by the controller and copied into a backend
//! when it starts.

use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::command::{CommandLine, Environment, OsType};
use crate::types::{ChannelMode, ProcessImpl, ProcessMode, TerminalMode};

/// How to open a terminal emulator that runs a given command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminalCommand {
    pub command: String,
    /// Arguments placed between the terminal and the command it should run
    /// (for example `-e`).
    pub execute_args: Vec<String>,
    /// Pass the wrapped command as one quoted string instead of separate
    /// arguments.
    pub needs_quotes: bool,
}

impl TerminalCommand {
    /// Terminal for the host, overridable through `PROCCTL_TERMINAL`
    /// (`"command arg..."`, split with shell rules).
    pub fn host_default() -> Self {
        if let Some(custom) = std::env::var("PROCCTL_TERMINAL")
            .ok()
            .and_then(|s| shell_words::split(&s).ok())
            .filter(|parts| !parts.is_empty())
        {
            let mut parts = custom.into_iter();
            let command = parts.next().unwrap_or_default();
            return Self {
                command,
                execute_args: parts.collect(),
                needs_quotes: false,
            };
        }

        match OsType::host() {
            OsType::Windows => Self {
                command: "cmd".to_string(),
                execute_args: vec!["/c".into(), "start".into(), "/wait".into()],
                needs_quotes: false,
            },
            OsType::Mac => Self {
                command: "xterm".to_string(),
                execute_args: vec!["-e".into()],
                needs_quotes: false,
            },
            OsType::Linux | OsType::OtherUnix => Self {
                command: "x-terminal-emulator".to_string(),
                execute_args: vec!["-e".into()],
                needs_quotes: false,
            },
        }
    }
}

impl Default for TerminalCommand {
    fn default() -> Self {
        Self::host_default()
    }
}

/// Everything a backend needs to start one process.
#[derive(Debug, Clone)]
pub struct ProcessSetupData {
    pub process_impl: ProcessImpl,
    pub terminal_mode: TerminalMode,
    pub process_mode: ProcessMode,
    pub command_line: CommandLine,
    pub working_directory: Option<PathBuf>,
    /// Effective environment. Filled by the controller at start.
    pub environment: Environment,
    /// Whether `environment` was set explicitly rather than inherited.
    pub have_environment: bool,
    /// Environment for device targets, handed to device hooks as is.
    pub remote_environment: Environment,
    pub process_channel_mode: ChannelMode,
    /// Bytes written to stdin right after start.
    pub write_data: Vec<u8>,
    pub standard_input_file: Option<PathBuf>,
    pub extra_data: BTreeMap<String, String>,
    pub low_priority: bool,
    /// Start the child in its own session so it has no controlling terminal.
    pub unix_terminal_disabled: bool,
    pub run_as_root: bool,
    pub elevation: CommandLine,
    pub terminal: TerminalCommand,
    pub error_string: String,
}

impl Default for ProcessSetupData {
    fn default() -> Self {
        Self {
            process_impl: ProcessImpl::Default,
            terminal_mode: TerminalMode::Off,
            process_mode: ProcessMode::Reader,
            command_line: CommandLine::default(),
            working_directory: None,
            environment: Environment::new(),
            have_environment: false,
            remote_environment: Environment::new(),
            process_channel_mode: ChannelMode::Separate,
            write_data: Vec::new(),
            standard_input_file: None,
            extra_data: BTreeMap::new(),
            low_priority: false,
            unix_terminal_disabled: false,
            run_as_root: false,
            elevation: CommandLine::with_args("sudo", ["-A"]),
            terminal: TerminalCommand::host_default(),
            error_string: String::new(),
        }
    }
}

impl ProcessSetupData {
    /// Whether stdin must be a pipe.
    pub fn needs_stdin_pipe(&self) -> bool {
        self.standard_input_file.is_none()
            && (self.process_mode == ProcessMode::Writer || !self.write_data.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_describe_a_plain_reader() {
        let setup = ProcessSetupData::default();
        assert_eq!(setup.process_mode, ProcessMode::Reader);
        assert_eq!(setup.terminal_mode, TerminalMode::Off);
        assert_eq!(setup.elevation.executable(), std::path::Path::new("sudo"));
        assert!(!setup.needs_stdin_pipe());
    }

    #[test]
    fn stdin_pipe_for_writer_or_payload() {
        let mut setup = ProcessSetupData::default();
        setup.write_data = b"input".to_vec();
        assert!(setup.needs_stdin_pipe());

        setup.write_data.clear();
        setup.process_mode = ProcessMode::Writer;
        assert!(setup.needs_stdin_pipe());

        setup.standard_input_file = Some(PathBuf::from("/dev/null"));
        assert!(!setup.needs_stdin_pipe());
    }
}
