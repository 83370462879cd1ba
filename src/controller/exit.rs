// src/controller/exit.rs

//! Exit code classification and user-facing exit messages.

use crate::command::CommandLine;
use crate::types::RunResult;

/// Caller-supplied mapping from exit code to result.
pub type ExitCodeInterpreter = Box<dyn Fn(i32) -> RunResult + Send>;

pub fn interpret_exit_code(exit_code: i32, interpreter: Option<&ExitCodeInterpreter>) -> RunResult {
    match interpreter {
        Some(interpret) => interpret(exit_code),
        None if exit_code == 0 => RunResult::FinishedWithSuccess,
        None => RunResult::FinishedWithError,
    }
}

pub fn exit_message(
    command: &CommandLine,
    result: RunResult,
    exit_code: i32,
    hang_timeout_s: Option<u32>,
) -> String {
    let cmd = command.to_user_output();
    match result {
        RunResult::FinishedWithSuccess => format!("The command \"{cmd}\" finished successfully."),
        RunResult::FinishedWithError => {
            format!("The command \"{cmd}\" terminated with exit code {exit_code}.")
        }
        RunResult::TerminatedAbnormally => format!("The command \"{cmd}\" terminated abnormally."),
        RunResult::StartFailed => format!("The command \"{cmd}\" could not be started."),
        RunResult::Hang => match hang_timeout_s {
            Some(secs) => format!(
                "The command \"{cmd}\" did not respond within the timeout limit ({secs} s)."
            ),
            None => format!("The command \"{cmd}\" did not respond."),
        },
    }
}
