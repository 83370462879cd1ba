// src/controller/device.rs

use std::path::Path;

use crate::backend::ProcessBackend;
use crate::command::Environment;
use crate::controller::Process;

/// Capability for starting executables that live on another device
/// (paths of the form `scheme://...`).
///
/// Passed to `Process::with_device_hooks`. When a command needs a device,
/// the controller first asks `create_backend`; if that declines, the whole
/// start is handed to `start_process`.
pub trait DeviceProcessHooks: Send + Sync {
    fn create_backend(&self, _executable: &Path) -> Option<Box<dyn ProcessBackend>> {
        None
    }

    fn start_process(&self, process: &mut Process) {
        let exe = process.command_line().executable().display().to_string();
        process.report_start_failure(format!("Cannot start \"{exe}\": no device support."));
    }

    fn system_environment_for_binary(&self, _executable: &Path) -> Environment {
        Environment::new()
    }
}
