// src/command/environment.rs

use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::command::os::OsType;
use crate::locate::locate_binary;

/// Environment variables passed to a child process.
///
/// Keys are case-sensitive on every OS. The map is ordered so that
/// `to_string_list` and standalone command lines are deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Environment {
    vars: BTreeMap<String, String>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the calling process environment. Variables that are not
    /// valid Unicode are skipped.
    pub fn system() -> Self {
        Self {
            vars: std::env::vars().collect(),
        }
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(key.into(), value.into());
    }

    pub fn unset(&mut self, key: &str) {
        self.vars.remove(key);
    }

    pub fn value(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.vars.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// `KEY=value` entries, sorted by key.
    pub fn to_string_list(&self) -> Vec<String> {
        self.vars.iter().map(|(k, v)| format!("{k}={v}")).collect()
    }

    /// The `PATH` entry, if any.
    pub fn path(&self) -> Option<&str> {
        self.value("PATH")
    }

    /// Prepend `dir` to `PATH` using the host separator.
    pub fn prepend_or_set_path(&mut self, dir: &str) {
        let sep = OsType::host().path_list_separator();
        let new_path = match self.path() {
            Some(existing) if !existing.is_empty() => format!("{dir}{sep}{existing}"),
            _ => dir.to_string(),
        };
        self.set("PATH", new_path);
    }

    /// Resolve `name` against this environment's `PATH`.
    pub fn search_in_path(&self, name: &str) -> Option<PathBuf> {
        locate_binary(self.path().unwrap_or_default(), name)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Environment {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            vars: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_case_sensitive() {
        let mut env = Environment::new();
        env.set("Path", "a");
        env.set("PATH", "b");
        assert_eq!(env.len(), 2);
        assert_eq!(env.path(), Some("b"));
    }

    #[test]
    fn string_list_is_sorted() {
        let env: Environment = [("B", "2"), ("A", "1")].into_iter().collect();
        assert_eq!(env.to_string_list(), vec!["A=1", "B=2"]);
    }

    #[test]
    fn prepend_path_creates_or_extends() {
        let mut env = Environment::new();
        env.prepend_or_set_path("/opt/bin");
        assert_eq!(env.path(), Some("/opt/bin"));
        env.prepend_or_set_path("/first");
        let sep = OsType::host().path_list_separator();
        assert_eq!(env.path(), Some(format!("/first{sep}/opt/bin").as_str()));
    }
}
