// src/errors.rs

//! Crate-wide error aliases and helpers.
//!
//! Process failures (missing binary, crash, hang) are not errors in this
//! sense: they are reported through `ProcessEvent::ErrorOccurred` and the
//! latched `RunResult`. `ProcctlError` covers misuse of the API and
//! configuration problems.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProcctlError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Command line error: {0}")]
    CommandLine(String),

    #[error("Process is not in writer mode")]
    NotWriter,

    #[error("No active process")]
    NoActiveProcess,

    #[error("Operation not supported by the {0} backend")]
    Unsupported(&'static str),

    #[error("A blocking run is already suspended on this process")]
    BlockingRunActive,

    #[error("Process control channel closed")]
    ChannelClosed,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, ProcctlError>;
