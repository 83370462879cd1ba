#![allow(dead_code)]

use std::sync::{Arc, Mutex};

pub use procctl_test_utils::init_tracing;
use procctl_test_utils::FakeCall;

use procctl::command::CommandLine;

/// `/bin/sh -c <script>`.
pub fn sh(script: &str) -> CommandLine {
    CommandLine::with_args("/bin/sh", ["-c", script])
}

/// Snapshot of a fake backend's call log.
pub fn calls(log: &Arc<Mutex<Vec<FakeCall>>>) -> Vec<FakeCall> {
    log.lock().unwrap().clone()
}

/// Collects callback output for later inspection.
#[derive(Clone, Default)]
pub struct Collected(Arc<Mutex<Vec<String>>>);

impl Collected {
    pub fn callback(&self) -> Box<dyn FnMut(&str) + Send> {
        let inner = Arc::clone(&self.0);
        Box::new(move |text| inner.lock().unwrap().push(text.to_string()))
    }

    pub fn items(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn joined(&self) -> String {
        self.items().concat()
    }
}
