//! The work behind each `gf` subcommand, kept free of terminal output so it
//! can be tested directly.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, info};

use geoflow_core::command::CommandKind;
use geoflow_core::command_definitions::CommandDefinition;
use geoflow_core::config::EngineConfig;
use geoflow_core::error::{Error, Result};
use geoflow_core::execution::RunResult;
use geoflow_core::file_handling::{get_expected_results, read_command_file, write_report};
use geoflow_core::parser::parse_text;
use geoflow_core::processor::Processor;
use geoflow_core::registry::CommandRegistry;
use geoflow_core::regression::{run_regression, RegressionReport};
use geoflow_core::report::write_run_report;
use geoflow_core::status::Status;

use crate::arguments::{parse_property_assignments, parse_selection};

/// Settings for `gf run`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOptions {
    pub select: Option<String>,
    pub halt_on_failure: bool,
    pub properties: Vec<String>,
    pub report: Option<PathBuf>,
}

/// Load and run a command file.
///
/// Command-line properties are applied after loading, so they can override
/// `WorkingDir` and configured properties.
///
/// # Errors
///
/// Returns an error if the file cannot be read, a property or selection is
/// malformed, or the report cannot be written.
pub fn run_command_file(
    path: &Path,
    options: &RunOptions,
    registry: Arc<CommandRegistry>,
    config: EngineConfig,
) -> Result<RunResult> {
    let properties = parse_property_assignments(&options.properties)?;

    let mut processor = Processor::with_registry(registry, config);
    processor.load_file(path)?;
    for (name, value) in properties {
        debug!("Setting property `{name}` from the command line");
        processor.set_property(&name, value);
    }
    if options.halt_on_failure {
        processor.set_halt_on_failure(true);
    }

    let result = match &options.select {
        Some(selection) => {
            let indices = parse_selection(selection, processor.commands().len())?;
            info!("Running {} selected lines", indices.len());
            processor.run_selected(&indices)
        }
        None => processor.run_all(),
    };

    if let Some(report_path) = &options.report {
        let mut buffer = Vec::new();
        write_run_report(&mut buffer, &result)?;
        write_report(report_path, &String::from_utf8_lossy(&buffer))?;
        info!("Wrote run report to `{}`", report_path.display());
    }

    Ok(result)
}

/// Whether a run should make `gf` exit unsuccessfully.
#[must_use]
pub fn run_failed(result: &RunResult) -> bool {
    result.is_aborted() || result.status == Status::Failure
}

/// Parse a command file without running it and describe every problem.
///
/// # Errors
///
/// Returns an error if the file cannot be read.
pub fn check_command_file(path: &Path, registry: &CommandRegistry) -> Result<Vec<String>> {
    let text = read_command_file(path)?;
    let commands = parse_text(&text, registry);
    let mut problems = Vec::new();

    for command in &commands {
        let line = command.line_number();
        match command.kind() {
            CommandKind::Unknown { suggestion } => {
                let hint = suggestion
                    .as_ref()
                    .map(|s| format!(" (did you mean `{s}`?)"))
                    .unwrap_or_default();
                problems.push(format!("line {line}: unknown command `{}`{hint}", command.name()));
            }
            CommandKind::Malformed { reason } => {
                problems.push(format!("line {line}: {reason}"));
            }
            _ => {}
        }
        problems.extend(
            command
                .parse_warnings()
                .iter()
                .map(|warning| format!("line {line}: {warning}")),
        );
    }

    Ok(problems)
}

/// Definition lookup for `gf list-commands NAME`.
///
/// # Errors
///
/// Returns an error naming the closest registered command if `name` is not
/// registered.
pub fn find_command<'a>(
    registry: &'a CommandRegistry,
    name: &str,
) -> Result<&'a CommandDefinition> {
    registry
        .lookup(name)
        .map(|entry| &**entry.definition())
        .ok_or_else(|| match registry.suggest(name) {
            Some(suggestion) => Error::Misc(format!(
                "Unknown command `{name}`, did you mean `{suggestion}`?"
            )),
            None => Error::UnknownCommand(name.to_string()),
        })
}

/// Run the cases of an expected-results file. Command files resolve
/// against the directory of `expected`.
///
/// # Errors
///
/// Returns an error if the expected-results file cannot be read or parsed.
pub fn run_regression_file(
    expected: &Path,
    registry: &Arc<CommandRegistry>,
    config: &EngineConfig,
) -> Result<RegressionReport> {
    let cases = get_expected_results(expected)?;
    let base_dir = match expected.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    info!(
        "Running {} regression cases from `{}`",
        cases.len(),
        expected.display()
    );
    Ok(run_regression(&cases, &base_dir, registry, config))
}
