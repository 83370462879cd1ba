// tests/config_loading.rs

use std::io::Write;

use procctl::config::{ConfigFile, load_and_validate, load_or_default};
use procctl::controller::Process;
use procctl::errors::ProcctlError;
use procctl::types::{ChannelMode, EventLoopMode, ProcessImpl};
use tempfile::NamedTempFile;

#[test]
fn full_config_is_applied_to_a_process() {
    let mut file = NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
[process]
timeout_s = 1
backend = "launcher"
codec = "iso-8859-15"
channel_mode = "forwarded"
event_loop = true
timeout_prompt = true

[terminal]
command = "konsole"
execute_args = ["-e"]

[elevation]
command = "pkexec"
args = []
"#
    )
    .unwrap();

    let cfg = load_and_validate(file.path()).unwrap();
    assert_eq!(cfg.event_loop_mode(), EventLoopMode::WithEventLoop);
    assert_eq!(cfg.codec, encoding_rs::ISO_8859_15);

    let mut process = Process::new();
    cfg.apply_to(&mut process);
    // Below the two-tick minimum.
    assert_eq!(process.hang_monitor().max_count(), Some(2));
    assert_eq!(process.codec(), encoding_rs::ISO_8859_15);
    assert_eq!(process.process_channel_mode(), ChannelMode::Forwarded);
    assert_eq!(process.setup().process_impl, ProcessImpl::Launcher);
    assert_eq!(process.setup().terminal.command, "konsole");
    assert_eq!(process.setup().elevation.executable().to_str(), Some("pkexec"));
}

#[test]
fn non_positive_timeout_disables_hang_detection() {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "[process]\ntimeout_s = -1\n").unwrap();

    let cfg = load_and_validate(file.path()).unwrap();
    let mut process = Process::new();
    cfg.apply_to(&mut process);
    assert_eq!(process.hang_monitor().timeout(), None);
}

#[test]
fn malformed_toml_is_a_toml_error() {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "[process\ntimeout_s = 3\n").unwrap();

    match load_and_validate(file.path()) {
        Err(ProcctlError::TomlError(_)) => {}
        other => panic!("expected TomlError, got {other:?}"),
    }
}

#[test]
fn blank_elevation_command_is_a_config_error() {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "[elevation]\ncommand = \"\"\n").unwrap();

    match load_and_validate(file.path()) {
        Err(ProcctlError::ConfigError(msg)) => assert!(msg.contains("[elevation].command")),
        other => panic!("expected ConfigError, got {other:?}"),
    }
}

#[test]
fn explicit_missing_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("Procctl.toml");
    assert!(matches!(
        load_or_default(Some(missing.as_path())),
        Err(ProcctlError::IoError(_))
    ));
}

#[test]
fn defaults_match_an_empty_file() {
    let file = NamedTempFile::new().unwrap();
    let loaded = load_and_validate(file.path()).unwrap();
    let default = ConfigFile::default();
    assert_eq!(loaded.process.timeout_s, default.process.timeout_s);
    assert_eq!(loaded.codec, default.codec);
    assert_eq!(loaded.elevation, default.elevation);
}
