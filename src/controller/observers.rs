// src/controller/observers.rs

use crate::types::ProcessErrorKind;

pub type Notify = Box<dyn FnMut() + Send>;
pub type ErrorNotify = Box<dyn FnMut(ProcessErrorKind) + Send>;

/// Registered notification callbacks, invoked in registration order.
#[derive(Default)]
pub(crate) struct Observers {
    pub started: Vec<Notify>,
    pub finished: Vec<Notify>,
    pub error: Vec<ErrorNotify>,
    pub ready_read_stdout: Vec<Notify>,
    pub ready_read_stderr: Vec<Notify>,
}

impl Observers {
    pub fn notify(callbacks: &mut [Notify]) {
        for cb in callbacks.iter_mut() {
            cb();
        }
    }

    pub fn notify_error(&mut self, error: ProcessErrorKind) {
        for cb in self.error.iter_mut() {
            cb(error);
        }
    }
}

impl std::fmt::Debug for Observers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Observers")
            .field("started", &self.started.len())
            .field("finished", &self.finished.len())
            .field("error", &self.error.len())
            .field("ready_read_stdout", &self.ready_read_stdout.len())
            .field("ready_read_stderr", &self.ready_read_stderr.len())
            .finish()
    }
}
