// src/lib.rs

pub mod backend;
pub mod channel;
pub mod cli;
pub mod command;
pub mod config;
pub mod controller;
pub mod diagnostics;
pub mod errors;
pub mod launcher;
pub mod locate;
pub mod logging;
pub mod runtime;
pub mod setup;
pub mod types;

use std::io::{BufRead, Write};

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::cli::{CliArgs, Command, RunArgs, WhichArgs};
use crate::command::{CommandLine, Environment};
use crate::config::ConfigFile;

pub use crate::backend::{ProcessBackend, ProcessEvent};
pub use crate::channel::ChannelBuffer;
pub use crate::command::needs_device;
pub use crate::controller::{DeviceProcessHooks, HangMonitor, Process};
pub use crate::locate::{locate_binary, locate_binary_in_env};
pub use crate::setup::ProcessSetupData;
pub use crate::types::{
    ChannelMode, EventLoopMode, ExitStatus, ProcessErrorKind, ProcessImpl, ProcessMode,
    ProcessState, RunResult, TerminalMode,
};

/// Exit code reported when the command was stopped as hanging.
pub const EXIT_HANG: i32 = 124;
/// Exit code reported when the command could not be started.
pub const EXIT_START_FAILED: i32 = 127;

/// High-level entry point used by `main.rs`. Returns the exit code for the
/// `procctl` process.
pub fn run(args: CliArgs) -> Result<i32> {
    match args.command {
        Command::Which(which) => Ok(run_which(&which)),
        Command::Run(run_args) => {
            let cfg = config::load_or_default(args.config.as_deref())
                .context("loading procctl configuration")?;
            run_command(&cfg, run_args)
        }
    }
}

fn run_which(args: &WhichArgs) -> i32 {
    let found = match &args.path {
        Some(list) => locate_binary(list, &args.name),
        None => locate_binary_in_env(&args.name),
    };
    match found {
        Some(path) => {
            println!("{}", path.display());
            0
        }
        None => {
            eprintln!("{}: not found", args.name);
            1
        }
    }
}

fn run_command(cfg: &ConfigFile, args: RunArgs) -> Result<i32> {
    let mut process = build_process(cfg, &args)?;

    if args.dry_run {
        println!("{}", process.to_standalone_command_line());
        return Ok(0);
    }

    let mode = if args.event_loop {
        EventLoopMode::WithEventLoop
    } else {
        cfg.event_loop_mode()
    };

    let result = process.run_blocking(mode)?;
    if !args.lines {
        print_captured(&process)?;
    }

    let message = process.exit_message();
    match result {
        RunResult::FinishedWithSuccess => debug!("{message}"),
        RunResult::FinishedWithError => info!("{message}"),
        _ => {
            warn!("{message}");
            if !process.error_string().is_empty() {
                warn!(error = process.error_string(), "process error");
            }
        }
    }

    Ok(exit_code_for(result, process.exit_code()))
}

fn build_process(cfg: &ConfigFile, args: &RunArgs) -> Result<Process> {
    let mut process = Process::new();
    cfg.apply_to(&mut process);

    let (exe, rest) = args
        .command
        .split_first()
        .context("no command given")?;
    process.set_command(CommandLine::with_args(exe, rest.iter().cloned()));

    if let Some(timeout) = args.timeout {
        process.set_timeout_s(timeout);
    }
    if let Some(dir) = &args.workdir {
        process.set_working_directory(dir);
    }
    if args.clear_env || !args.env.is_empty() {
        let mut env = if args.clear_env {
            Environment::new()
        } else {
            Environment::system()
        };
        for (key, value) in &args.env {
            env.set(key, value);
        }
        process.set_environment(env);
    }
    if let Some(mode) = args.terminal {
        process.set_terminal_mode(mode);
    }
    if let Some(backend) = args.backend {
        process.set_process_impl(backend);
    }
    if args.merged {
        process.set_process_channel_mode(ChannelMode::Merged);
    }
    if args.root {
        process.set_run_as_root(true);
    }
    if let Some(stdin) = &args.stdin {
        process.set_standard_input_file(stdin);
    }
    if args.low_priority {
        process.set_low_priority();
    }
    if let Some(label) = &args.codec {
        let encoding = encoding_rs::Encoding::for_label(label.as_bytes())
            .with_context(|| format!("unknown encoding '{label}'"))?;
        process.set_codec(encoding);
    }
    if !args.success_codes.is_empty() {
        let codes = args.success_codes.clone();
        process.set_exit_code_interpreter(Box::new(move |code| {
            if codes.contains(&code) {
                RunResult::FinishedWithSuccess
            } else {
                RunResult::FinishedWithError
            }
        }));
    }
    if args.lines {
        process.set_std_out_line_callback(Box::new(|line| {
            print!("{line}");
            let _ = std::io::stdout().flush();
        }));
        process.set_std_err_line_callback(Box::new(|line| eprint!("{line}")));
    }
    process.set_timeout_prompt(Box::new(ask_to_stop));

    Ok(process)
}

fn print_captured(process: &Process) -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    stdout
        .write_all(process.std_out().as_bytes())
        .context("writing captured stdout")?;
    stdout.flush().context("flushing stdout")?;
    eprint!("{}", process.std_err());
    Ok(())
}

/// Ask on the terminal whether a hanging command should be stopped.
fn ask_to_stop(command: &CommandLine) -> bool {
    eprint!(
        "The command \"{}\" is not responding. Stop it? [Y/n] ",
        command.to_user_output()
    );
    let _ = std::io::stderr().flush();
    let mut answer = String::new();
    if std::io::stdin().lock().read_line(&mut answer).is_err() {
        return true;
    }
    !matches!(answer.trim().to_lowercase().as_str(), "n" | "no")
}

/// Map a run result to the exit code of `procctl run`.
pub fn exit_code_for(result: RunResult, child_exit_code: i32) -> i32 {
    match result {
        RunResult::FinishedWithSuccess | RunResult::FinishedWithError => child_exit_code,
        RunResult::Hang => EXIT_HANG,
        RunResult::StartFailed => EXIT_START_FAILED,
        RunResult::TerminatedAbnormally => 1,
    }
}
