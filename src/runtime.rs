// src/runtime.rs

//! Shared Tokio runtime hosting child I/O and the launcher service.
//!
//! The controller API is synchronous; all asynchronous work is spawned here
//! and reports back over channels.

use std::io;

use once_cell::sync::OnceCell;
use tokio::runtime::{Builder, Runtime};
use tracing::debug;

static IO_RUNTIME: OnceCell<Runtime> = OnceCell::new();

pub fn io_runtime() -> io::Result<&'static Runtime> {
    IO_RUNTIME.get_or_try_init(|| {
        debug!("building process I/O runtime");
        Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("procctl-io")
            .enable_all()
            .build()
    })
}
