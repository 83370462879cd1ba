// src/command/command_line.rs

use std::fmt;
use std::path::{Path, PathBuf};

use crate::command::args::{join_args, quote_arg, split_args};
use crate::command::os::OsType;
use crate::errors::{ProcctlError, Result};

/// An executable plus its argument vector.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandLine {
    executable: PathBuf,
    arguments: Vec<String>,
}

impl CommandLine {
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
            arguments: Vec::new(),
        }
    }

    pub fn with_args<I, S>(executable: impl Into<PathBuf>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut cmd = Self::new(executable);
        cmd.add_args(args);
        cmd
    }

    /// Parse a whole command line typed by a user, using the host conventions.
    pub fn from_user_input(input: &str) -> Result<Self> {
        let mut parts = split_args(input, OsType::host())?.into_iter();
        let exe = parts
            .next()
            .ok_or_else(|| ProcctlError::CommandLine("empty command line".to_string()))?;
        Ok(Self::with_args(exe, parts))
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }

    pub fn set_executable(&mut self, executable: impl Into<PathBuf>) {
        self.executable = executable.into();
    }

    pub fn arguments(&self) -> &[String] {
        &self.arguments
    }

    pub fn add_arg(&mut self, arg: impl Into<String>) {
        self.arguments.push(arg.into());
    }

    pub fn add_args<I, S>(&mut self, args: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.arguments.extend(args.into_iter().map(Into::into));
    }

    /// Split `args` with the conventions of `os` and append the pieces.
    pub fn add_args_from_string(&mut self, args: &str, os: OsType) -> Result<()> {
        let split = split_args(args, os)?;
        self.arguments.extend(split);
        Ok(())
    }

    /// Append `other` (executable first) as plain arguments. Used to wrap a
    /// command in an elevation or terminal command.
    pub fn add_command_line_as_args(&mut self, other: &CommandLine) {
        self.arguments
            .push(other.executable.to_string_lossy().into_owned());
        self.arguments.extend(other.arguments.iter().cloned());
    }

    /// Returns `prefix` followed by this command as its arguments.
    pub fn wrapped_in(&self, prefix: &CommandLine) -> CommandLine {
        let mut wrapped = prefix.clone();
        wrapped.add_command_line_as_args(self);
        wrapped
    }

    pub fn is_empty(&self) -> bool {
        self.executable.as_os_str().is_empty()
    }

    /// Quoted form for display, using the host conventions.
    pub fn to_user_output(&self) -> String {
        self.to_string_for(OsType::host())
    }

    pub fn to_string_for(&self, os: OsType) -> String {
        let exe = self.executable.to_string_lossy();
        let mut out = quote_arg(&exe, os).into_owned();
        if !self.arguments.is_empty() {
            out.push(' ');
            out.push_str(&join_args(&self.arguments, os));
        }
        out
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_user_output())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_input_is_split_into_executable_and_args() {
        let cmd = CommandLine::from_user_input("ls -la 'my dir'").unwrap();
        assert_eq!(cmd.executable(), Path::new("ls"));
        assert_eq!(cmd.arguments(), &["-la".to_string(), "my dir".to_string()]);
    }

    #[test]
    fn empty_user_input_is_rejected() {
        assert!(CommandLine::from_user_input("   ").is_err());
    }

    #[test]
    fn wrapping_prefixes_the_elevation_command() {
        let inner = CommandLine::with_args("/usr/bin/id", ["-u"]);
        let sudo = CommandLine::with_args("sudo", ["-A"]);
        let wrapped = inner.wrapped_in(&sudo);
        assert_eq!(wrapped.executable(), Path::new("sudo"));
        assert_eq!(wrapped.arguments(), &["-A", "/usr/bin/id", "-u"]);
    }

    #[test]
    fn user_output_quotes_per_os() {
        let cmd = CommandLine::with_args("/bin/echo", ["hello world", "x"]);
        assert_eq!(cmd.to_string_for(OsType::Linux), "/bin/echo 'hello world' x");
        assert_eq!(cmd.to_string_for(OsType::Windows), "/bin/echo \"hello world\" x");
    }

    #[test]
    fn args_from_string_append() {
        let mut cmd = CommandLine::new("git");
        cmd.add_args_from_string("commit -m \"a message\"", OsType::Linux)
            .unwrap();
        assert_eq!(cmd.arguments(), &["commit", "-m", "a message"]);
    }
}
