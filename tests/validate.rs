//! Integration tests for the `validate` command.
use iamsim::cli::handle_validate_command;
use iamsim::log::is_logger_initialised;
use iamsim::settings::Settings;
use std::fs;
use std::path::PathBuf;
use tempfile::tempdir;

/// Get the path to the example model.
fn get_model_dir() -> PathBuf {
    PathBuf::from("demos/simple")
}

/// The logger should be running once a model has been validated.
#[test]
fn test_handle_validate_command() {
    unsafe { std::env::set_var("IAMSIM_LOG_LEVEL", "off") };

    assert!(!is_logger_initialised());
    handle_validate_command(&get_model_dir(), Some(Settings::default())).unwrap();
    assert!(is_logger_initialised());

    // An invalid model is reported
    let dir = tempdir().unwrap();
    let model = fs::read_to_string(get_model_dir().join("model.toml"))
        .unwrap()
        .replace("coal = 0.35", "coal = 0.45");
    fs::write(dir.path().join("model.toml"), model).unwrap();
    let err = handle_validate_command(dir.path(), Some(Settings::default())).unwrap_err();
    assert_eq!(err.to_string(), "Failed to validate model.");
}
