// src/controller/mod.rs

//! The synchronous process controller and its helpers.

pub mod device;
pub mod exit;
pub mod hang;
mod observers;
pub mod process;

pub use device::DeviceProcessHooks;
pub use exit::{ExitCodeInterpreter, exit_message, interpret_exit_code};
pub use hang::{DEFAULT_MAX_HANG_TICKS, HANG_TICK_INTERVAL, HangCheck, HangMonitor};
pub use observers::{ErrorNotify, Notify};
pub use process::{Process, TimeoutPrompt};
