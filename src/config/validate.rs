// src/config/validate.rs

use encoding_rs::Encoding;

use crate::command::CommandLine;
use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{ProcctlError, Result};
use crate::setup::TerminalCommand;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = ProcctlError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        let codec = resolve_codec(&raw.process.codec)?;
        let terminal = match raw.terminal {
            Some(section) => {
                ensure_not_blank(&section.command, "[terminal].command")?;
                Some(TerminalCommand {
                    command: section.command,
                    execute_args: section.execute_args,
                    needs_quotes: section.needs_quotes,
                })
            }
            None => None,
        };
        ensure_not_blank(&raw.elevation.command, "[elevation].command")?;
        let elevation = CommandLine::with_args(raw.elevation.command, raw.elevation.args);

        Ok(ConfigFile::new_unchecked(raw.process, codec, terminal, elevation))
    }
}

fn resolve_codec(label: &str) -> Result<&'static Encoding> {
    Encoding::for_label(label.trim().as_bytes()).ok_or_else(|| {
        ProcctlError::ConfigError(format!("[process].codec: unknown encoding '{label}'"))
    })
}

fn ensure_not_blank(value: &str, field: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(ProcctlError::ConfigError(format!(
            "{field} must not be empty"
        )));
    }
    Ok(())
}
