// src/backend/direct.rs

use std::path::PathBuf;
use std::sync::Arc;

use tracing::debug;

use crate::backend::{
    BackendCore, ChildControl, ChildController, ChildRequest, MessageSink, ProcessBackend,
    spawn_child,
};
use crate::errors::{ProcctlError, Result};
use crate::runtime::io_runtime;
use crate::types::{ProcessErrorKind, ProcessState};

/// Spawns the child directly and talks to its pipes.
#[derive(Debug, Default)]
pub struct DirectChildBackend {
    core: BackendCore,
    child: Option<ChildController>,
}

impl DirectChildBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn control(&self, control: ChildControl) {
        if self.core.state() == ProcessState::NotRunning {
            return;
        }
        if let Some(child) = &self.child {
            if !child.send(control) {
                debug!("process driver already gone");
            }
        }
    }
}

impl ProcessBackend for DirectChildBackend {
    fn core(&self) -> &BackendCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut BackendCore {
        &mut self.core
    }

    fn kind(&self) -> &'static str {
        "direct"
    }

    fn do_start(&mut self, program: PathBuf, arguments: Vec<String>) {
        let runtime = match io_runtime() {
            Ok(rt) => rt,
            Err(e) => {
                self.core.report_error(
                    ProcessErrorKind::FailedToStart,
                    format!("Cannot start the process I/O runtime: {e}"),
                );
                return;
            }
        };

        let tx = self.core.sender();
        let sink: MessageSink = Arc::new(move |msg| {
            let _ = tx.send(msg);
        });
        let request = ChildRequest {
            program,
            arguments,
            setup: self.core.setup().clone(),
        };
        self.child = Some(spawn_child(runtime.handle(), request, sink));
    }

    fn terminate(&mut self) {
        self.control(ChildControl::Terminate);
    }

    fn kill(&mut self) {
        self.control(ChildControl::Kill);
    }

    fn close(&mut self) {
        self.control(ChildControl::CloseWriteChannel);
        self.control(ChildControl::Kill);
    }

    fn close_write_channel(&mut self) {
        self.control(ChildControl::CloseWriteChannel);
    }

    fn write(&mut self, data: &[u8]) -> Result<usize> {
        if self.core.state() != ProcessState::Running {
            return Err(ProcctlError::NoActiveProcess);
        }
        let child = self.child.as_ref().ok_or(ProcctlError::NoActiveProcess)?;
        if child.send(ChildControl::Write(data.to_vec())) {
            Ok(data.len())
        } else {
            Err(ProcctlError::ChannelClosed)
        }
    }
}
