// src/command/os.rs

/// Operating system family a command line is built for.
///
/// Argument quoting, path list separators and executable probing all depend
/// on this, and a command may target a different OS than the host (for
/// example through a device hook).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OsType {
    Windows,
    Linux,
    Mac,
    OtherUnix,
}

impl OsType {
    pub fn host() -> Self {
        if cfg!(windows) {
            OsType::Windows
        } else if cfg!(target_os = "macos") {
            OsType::Mac
        } else if cfg!(target_os = "linux") {
            OsType::Linux
        } else {
            OsType::OtherUnix
        }
    }

    pub fn is_windows(self) -> bool {
        self == OsType::Windows
    }

    pub fn is_any_unix(self) -> bool {
        !self.is_windows()
    }

    pub fn path_list_separator(self) -> char {
        if self.is_windows() { ';' } else { ':' }
    }
}
