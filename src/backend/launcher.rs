// src/backend/launcher.rs

use std::path::PathBuf;

use tracing::debug;

use crate::backend::{BackendCore, ChildRequest, ProcessBackend};
use crate::errors::{ProcctlError, Result};
use crate::launcher::{CallerHandle, LauncherInterface};
use crate::types::{ProcessErrorKind, ProcessState};

/// Forwards every operation to the launcher service through a per-run
/// caller handle.
#[derive(Debug, Default)]
pub struct LauncherBackend {
    core: BackendCore,
    handle: Option<CallerHandle>,
}

impl LauncherBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Token of the current run, if one was started.
    pub fn token(&self) -> Option<u64> {
        self.handle.as_ref().map(CallerHandle::token)
    }

    fn with_handle(&self, op: &str, f: impl FnOnce(&CallerHandle) -> Result<()>) {
        if self.core.state() == ProcessState::NotRunning {
            return;
        }
        if let Some(handle) = &self.handle {
            if let Err(e) = f(handle) {
                debug!(token = handle.token(), op, error = %e, "launcher request failed");
            }
        }
    }
}

impl ProcessBackend for LauncherBackend {
    fn core(&self) -> &BackendCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut BackendCore {
        &mut self.core
    }

    fn kind(&self) -> &'static str {
        "launcher"
    }

    fn do_start(&mut self, program: PathBuf, arguments: Vec<String>) {
        let interface = match LauncherInterface::instance() {
            Ok(interface) => interface,
            Err(e) => {
                self.core.report_error(
                    ProcessErrorKind::FailedToStart,
                    format!("The process launcher is not available: {e}"),
                );
                return;
            }
        };

        // A new run never shares the previous run's token.
        self.handle = None;
        let token = LauncherInterface::next_token();
        let handle = interface.register_handle(token, self.core.sender());
        let request = ChildRequest {
            program,
            arguments,
            setup: self.core.setup().clone(),
        };
        if let Err(e) = handle.start(request) {
            self.core.report_error(
                ProcessErrorKind::FailedToStart,
                format!("The process launcher is not running: {e}"),
            );
        }
        self.handle = Some(handle);
    }

    fn terminate(&mut self) {
        self.with_handle("terminate", CallerHandle::terminate);
    }

    fn kill(&mut self) {
        self.with_handle("kill", CallerHandle::kill);
    }

    fn close(&mut self) {
        self.with_handle("cancel", CallerHandle::cancel);
    }

    fn close_write_channel(&mut self) {
        self.with_handle("close write channel", CallerHandle::close_write_channel);
    }

    fn write(&mut self, data: &[u8]) -> Result<usize> {
        if self.core.state() != ProcessState::Running {
            return Err(ProcctlError::NoActiveProcess);
        }
        let handle = self.handle.as_ref().ok_or(ProcctlError::NoActiveProcess)?;
        handle.write(data)?;
        Ok(data.len())
    }
}
