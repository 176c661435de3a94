//! File handling for geoflow.
//!
//! This module reads and writes command files, the engine configuration and
//! regression expectation files, and validates the IDs used to name
//! geolayers, tables and blocks.

use std::fs::{self, File};
use std::path::Path;

use log::debug;

use crate::config::{get_config_path, EngineConfig, DEFAULT_CONFIG_PATH};
use crate::error::Error::{EmptyId, IdWithColon, IdWithSpace, NumericId};
use crate::error::{Error, Result};
use crate::regression::ExpectedCase;

fn get_reader(file_description: &str, path: &Path) -> Result<File> {
    File::open(path)
        .map_err(|e| Error::io_error(file_description, &path.display().to_string(), e))
}

/// Checks an ID used for a geolayer, table, property or block name.
///
/// # Errors
///
/// Returns an error if the ID is empty, contains a space or a colon, or is
/// purely numeric.
pub fn validate_id(id: &str) -> Result<()> {
    if id.is_empty() {
        return Err(EmptyId);
    }

    if id.contains(' ') {
        return Err(IdWithSpace(id.to_string()));
    }

    if id.contains(':') {
        return Err(IdWithColon(id.to_string()));
    }

    if id.chars().all(|c| c.is_numeric()) {
        return Err(NumericId(id.to_string()));
    }

    Ok(())
}

/// Reads a command file as text.
///
/// # Errors
///
/// Returns an error if the file cannot be read.
pub fn read_command_file(path: &Path) -> Result<String> {
    fs::read_to_string(path)
        .map_err(|e| Error::io_error("command", &path.display().to_string(), e))
}

/// Writes command-file text to disk.
///
/// # Errors
///
/// Returns an error if the file cannot be created or written to.
pub fn write_command_file(path: &Path, text: &str) -> Result<()> {
    fs::write(path, text).map_err(|e| Error::io_error("command", &path.display().to_string(), e))
}

/// Loads the engine configuration.
///
/// # Arguments
///
/// * `config_path_arg` - Explicit configuration path, or `None` for the default
///
/// # Returns
///
/// The parsed configuration. A missing file at the default location yields
/// the default configuration.
///
/// # Errors
///
/// Returns an error if:
/// - An explicitly named configuration file does not exist
/// - The file cannot be read
/// - The YAML is malformed or doesn't match the expected structure
pub fn get_engine_config(config_path_arg: Option<&str>) -> Result<EngineConfig> {
    let config_path = get_config_path(config_path_arg);
    let path = Path::new(&config_path);

    if !path.exists() && config_path_arg.is_none() {
        debug!("No configuration at {DEFAULT_CONFIG_PATH}, using defaults");
        return Ok(EngineConfig::default());
    }

    let reader = get_reader("config", path)?;

    // An empty file is a valid, all-defaults configuration.
    if fs::metadata(path).map(|m| m.len() == 0).unwrap_or(false) {
        return Ok(EngineConfig::default());
    }

    serde_yaml::from_reader(reader)
        .map_err(|e| Error::yaml_error("reading", "config", &config_path, e))
}

/// Loads regression cases from an expected-results YAML file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed.
///
/// # Examples
///
/// ```no_run
/// use std::path::Path;
/// use geoflow_core::file_handling::get_expected_results;
///
/// let cases = get_expected_results(Path::new("tests/expected.yml"))?;
/// println!("Loaded {} regression cases", cases.len());
/// # Ok::<(), geoflow_core::error::Error>(())
/// ```
pub fn get_expected_results(path: &Path) -> Result<Vec<ExpectedCase>> {
    let reader = get_reader("expected results", path)?;

    serde_yaml::from_reader(reader).map_err(|e| {
        Error::yaml_error(
            "reading",
            "expected results",
            &path.display().to_string(),
            e,
        )
    })
}

/// Writes a report to disk.
///
/// # Errors
///
/// Returns an error if the file cannot be created or written to.
pub fn write_report(path: &Path, text: &str) -> Result<()> {
    fs::write(path, text).map_err(|e| Error::io_error("report", &path.display().to_string(), e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::Status;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_validate_id_valid() {
        assert!(validate_id("valid_id").is_ok());
        assert!(validate_id("Layer1").is_ok());
        assert!(validate_id("my-layer").is_ok());
        assert!(validate_id("_underscore").is_ok());
    }

    #[test]
    fn test_validate_id_empty() {
        let result = validate_id("");
        assert!(matches!(result, Err(EmptyId)));
    }

    #[test]
    fn test_validate_id_with_space() {
        let result = validate_id("has space");
        assert!(matches!(result, Err(IdWithSpace(_))));
    }

    #[test]
    fn test_validate_id_with_colon() {
        let result = validate_id("has:colon");
        assert!(matches!(result, Err(IdWithColon(_))));
    }

    #[test]
    fn test_validate_id_numeric_only() {
        let result = validate_id("123");
        assert!(matches!(result, Err(NumericId(_))));
    }

    #[test]
    fn test_write_and_read_command_file() {
        let temp_file = NamedTempFile::new().unwrap();
        let text = "# header\nExit()\n";

        write_command_file(temp_file.path(), text).unwrap();
        assert_eq!(read_command_file(temp_file.path()).unwrap(), text);
    }

    #[test]
    fn test_read_missing_command_file() {
        let result = read_command_file(Path::new("/nonexistent/file.gp"));
        assert!(matches!(result, Err(Error::Io { .. })));
    }

    #[test]
    fn test_get_engine_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "halt_on_failure: true\nmax_loop_iterations: 10").unwrap();

        let path = temp_file.path().to_str().unwrap();
        let config = get_engine_config(Some(path)).unwrap();
        assert!(config.halt_on_failure);
        assert_eq!(config.max_loop_iterations, 10);
    }

    #[test]
    fn test_get_engine_config_empty_file() {
        let temp_file = NamedTempFile::new().unwrap();
        let path = temp_file.path().to_str().unwrap();
        assert_eq!(get_engine_config(Some(path)).unwrap(), EngineConfig::default());
    }

    #[test]
    fn test_get_engine_config_missing_explicit_file() {
        let result = get_engine_config(Some("/nonexistent/config.yml"));
        assert!(matches!(result, Err(Error::Io { .. })));
    }

    #[test]
    fn test_get_engine_config_invalid_yaml() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "halt_on_failure: [").unwrap();

        let path = temp_file.path().to_str().unwrap();
        let result = get_engine_config(Some(path));
        assert!(matches!(result, Err(Error::Yaml { .. })));
    }

    #[test]
    fn test_get_expected_results() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            "- command_file: a.gp\n  expected_status: Warning\n  commands:\n    - line: 3\n      status: failure\n      message: not found\n- command_file: b.gp"
        )
        .unwrap();

        let cases = get_expected_results(temp_file.path()).unwrap();
        assert_eq!(cases.len(), 2);
        assert_eq!(cases[0].expected_status, Some(Status::Warning));
        assert_eq!(cases[0].commands[0].status, Status::Failure);
        assert_eq!(cases[0].commands[0].message.as_deref(), Some("not found"));
        assert!(cases[1].commands.is_empty());
    }
}
