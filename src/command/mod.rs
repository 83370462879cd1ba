// src/command/mod.rs

//! Command lines, environments and the per-OS rules for building them.

pub mod args;
pub mod command_line;
pub mod environment;
pub mod os;

use std::path::Path;

pub use args::{join_args, quote_arg, split_args};
pub use command_line::CommandLine;
pub use environment::Environment;
pub use os::OsType;

/// True when `executable` names a file on another device (`scheme://...`)
/// and must be started through a device hook.
pub fn needs_device(executable: &Path) -> bool {
    executable.to_string_lossy().contains("://")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_paths_are_detected() {
        assert!(needs_device(Path::new("ssh://host/usr/bin/ls")));
        assert!(!needs_device(Path::new("/usr/bin/ls")));
        assert!(!needs_device(Path::new("ls")));
    }
}
