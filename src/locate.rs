// src/locate.rs

//! OS-aware executable lookup.

use std::path::{Path, PathBuf};

use tracing::trace;

use crate::command::OsType;

const WINDOWS_SUFFIXES: [&str; 4] = [".cmd", ".bat", ".exe", ".com"];

/// Find `binary` in `path_list` (a `PATH`-style list using the host
/// separator).
///
/// - An absolute `binary` is checked in place and returned unchanged when it
///   is an executable file.
/// - On Windows the current directory is searched before the list.
/// - Each list entry is tried in order; empty entries are ignored.
///
/// Windows probes `.cmd`, `.bat`, `.exe` and `.com` suffixes in that order
/// and macOS looks inside `<binary>.app/Contents/MacOS/`, unless the name
/// already carries a three letter extension.
pub fn locate_binary(path_list: &str, binary: &str) -> Option<PathBuf> {
    let os = OsType::host();
    let candidate = Path::new(binary);

    if candidate.is_absolute() {
        let dir = candidate.parent()?;
        let name = candidate.file_name()?.to_str()?;
        return check_binary(os, dir, name);
    }

    if os.is_windows() {
        if let Ok(cwd) = std::env::current_dir() {
            if let Some(found) = check_binary(os, &cwd, binary) {
                return Some(found);
            }
        }
    }

    let found = path_list
        .split(os.path_list_separator())
        .filter(|entry| !entry.is_empty())
        .find_map(|entry| check_binary(os, Path::new(entry), binary));

    trace!(binary, found = ?found, "locate_binary");
    found
}

/// `locate_binary` against the calling process's `PATH`.
pub fn locate_binary_in_env(binary: &str) -> Option<PathBuf> {
    let path = std::env::var("PATH").unwrap_or_default();
    locate_binary(&path, binary)
}

fn check_binary(os: OsType, dir: &Path, binary: &str) -> Option<PathBuf> {
    let direct = dir.join(binary);
    if is_executable_file(&direct) {
        return Some(direct);
    }

    if os.is_any_unix() && os != OsType::Mac {
        return None;
    }
    if has_three_letter_extension(binary) {
        return None;
    }

    match os {
        OsType::Windows => WINDOWS_SUFFIXES
            .iter()
            .map(|suffix| dir.join(format!("{binary}{suffix}")))
            .find(|p| is_executable_file(p)),
        OsType::Mac => {
            let app = dir.join(format!("{binary}.app"));
            if !app.is_dir() {
                return None;
            }
            let inner = app.join("Contents").join("MacOS").join(binary);
            is_executable_file(&inner).then_some(inner)
        }
        OsType::Linux | OsType::OtherUnix => None,
    }
}

fn has_three_letter_extension(binary: &str) -> bool {
    match binary.rfind('.') {
        Some(idx) => idx + 4 == binary.len(),
        None => false,
    }
}

pub(crate) fn is_executable_file(path: &Path) -> bool {
    let Ok(meta) = std::fs::metadata(path) else {
        return false;
    };
    if !meta.is_file() {
        return false;
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        meta.permissions().mode() & 0o111 != 0
    }
    #[cfg(not(unix))]
    {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    fn make_executable(dir: &Path, name: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.join(name);
        std::fs::write(&path, "#!/bin/sh\nexit 0\n").unwrap();
        let mut perms = std::fs::metadata(&path).unwrap().permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&path, perms).unwrap();
        path
    }

    #[test]
    fn extension_detection() {
        assert!(has_three_letter_extension("tool.exe"));
        assert!(!has_three_letter_extension("tool"));
        assert!(!has_three_letter_extension("tool.py"));
        assert!(!has_three_letter_extension("archive.tar.gz"));
    }

    #[cfg(unix)]
    #[test]
    fn absolute_path_is_returned_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let exe = make_executable(dir.path(), "tool");
        let found = locate_binary("", exe.to_str().unwrap());
        assert_eq!(found, Some(exe));
    }

    #[cfg(unix)]
    #[test]
    fn first_matching_path_entry_wins() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        let empty = tempfile::tempdir().unwrap();
        make_executable(second.path(), "tool");
        let expected = make_executable(first.path(), "tool");

        let list = format!(
            "{}:{}:{}",
            empty.path().display(),
            first.path().display(),
            second.path().display()
        );
        assert_eq!(locate_binary(&list, "tool"), Some(expected));
    }

    #[cfg(unix)]
    #[test]
    fn non_executable_files_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("data"), "x").unwrap();
        let list = dir.path().display().to_string();
        assert_eq!(locate_binary(&list, "data"), None);
    }

    #[test]
    fn missing_binary_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let list = dir.path().display().to_string();
        assert_eq!(locate_binary(&list, "definitely-not-here"), None);
    }
}
