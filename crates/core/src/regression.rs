//! Regression runs: command files checked against expected statuses.
//!
//! An expected-results file is a YAML list of cases:
//!
//! ```yaml
//! - command_file: read_layers.gp
//!   expected_status: Warning
//!   commands:
//!     - line: 4
//!       status: Failure
//!       message: does not exist
//! - command_file: subdir/other.gp
//! ```
//!
//! A case without `expected_status` uses the command file's
//! `#@expectedStatus` annotation, or `SUCCESS`. A file annotated
//! `#@enabled False` is skipped.

use std::fmt::{Display, Formatter};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::command::Command;
use crate::config::{resolve_path, EngineConfig};
use crate::error::{Error, Result};
use crate::execution::RunResult;
use crate::parameter::parse_bool;
use crate::processor::Processor;
use crate::registry::CommandRegistry;
use crate::status::Status;

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct ExpectedCommand {
    pub line: usize,
    pub status: Status,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct ExpectedCase {
    pub command_file: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_status: Option<Status>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub commands: Vec<ExpectedCommand>,
}

/// Status a command file declares with `#@expectedStatus`.
#[must_use]
pub fn annotated_expected_status(commands: &[Command]) -> Option<Status> {
    commands
        .iter()
        .filter_map(Command::annotation)
        .find(|(key, _)| key.eq_ignore_ascii_case("expectedStatus"))
        .and_then(|(_, value)| value.parse().ok())
}

/// False when a command file is annotated `#@enabled False`.
#[must_use]
pub fn annotated_enabled(commands: &[Command]) -> bool {
    commands
        .iter()
        .filter_map(Command::annotation)
        .find(|(key, _)| key.eq_ignore_ascii_case("enabled"))
        .and_then(|(_, value)| parse_bool(value))
        .unwrap_or(true)
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum CaseVerdict {
    Pass,
    Fail,
    Skipped,
}

impl Display for CaseVerdict {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.pad(match self {
            CaseVerdict::Pass => "PASS",
            CaseVerdict::Fail => "FAIL",
            CaseVerdict::Skipped => "SKIPPED",
        })
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct CaseOutcome {
    pub command_file: PathBuf,
    pub verdict: CaseVerdict,
    pub expected_status: Status,
    pub actual_status: Status,
    pub problems: Vec<String>,
}

/// Compare a finished run with a case's expectations.
///
/// Returns the problems found; an empty list means the case passes. A
/// status lower than expected is not a problem.
#[must_use]
pub fn check_case(case: &ExpectedCase, expected_status: Status, result: &RunResult) -> Vec<String> {
    let mut problems = Vec::new();

    if let Some(reason) = &result.abort {
        problems.push(format!("Run aborted: {reason}"));
    }

    if result.status.exceeds(expected_status) {
        problems.push(format!(
            "Status {} exceeds expected {expected_status}",
            result.status
        ));
    }

    for expected in &case.commands {
        let Some(outcome) = result.outcome_at_line(expected.line) else {
            problems.push(format!("No command at line {}", expected.line));
            continue;
        };

        if outcome.status.exceeds(expected.status) {
            problems.push(format!(
                "Line {}: status {} exceeds expected {}",
                expected.line, outcome.status, expected.status
            ));
        } else if outcome.status == expected.status {
            if let Some(message) = &expected.message {
                if !outcome.messages.iter().any(|m| m.contains(message.as_str())) {
                    problems.push(format!(
                        "Line {}: no message contains `{message}`",
                        expected.line
                    ));
                }
            }
        }
    }

    problems
}

#[derive(Serialize, Debug, Clone, Default, PartialEq)]
pub struct RegressionReport {
    pub cases: Vec<CaseOutcome>,
}

impl RegressionReport {
    #[must_use]
    pub fn count(&self, verdict: CaseVerdict) -> usize {
        self.cases.iter().filter(|c| c.verdict == verdict).count()
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.count(CaseVerdict::Fail) == 0
    }

    /// Process exit code: 0 when no case failed, 1 otherwise.
    #[must_use]
    pub fn exit_code(&self) -> u8 {
        u8::from(!self.is_success())
    }

    /// # Errors
    ///
    /// Returns an error if writing fails.
    pub fn write_text<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        for case in &self.cases {
            writeln!(
                writer,
                "{:<7} {} (expected {}, actual {})",
                case.verdict,
                case.command_file.display(),
                case.expected_status,
                case.actual_status
            )?;
            for problem in &case.problems {
                writeln!(writer, "        {problem}")?;
            }
        }
        writeln!(
            writer,
            "{} cases: {} passed, {} failed, {} skipped",
            self.cases.len(),
            self.count(CaseVerdict::Pass),
            self.count(CaseVerdict::Fail),
            self.count(CaseVerdict::Skipped)
        )
    }

    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self)
            .map_err(|e| Error::yaml_error("writing", "regression report", "-", e))
    }
}

/// Run every case in order. Relative command-file paths resolve against
/// `base_dir`, normally the directory of the expected-results file.
///
/// A command file that cannot be read fails its case; it does not stop the
/// other cases.
#[must_use]
pub fn run_regression(
    cases: &[ExpectedCase],
    base_dir: &Path,
    registry: &Arc<CommandRegistry>,
    config: &EngineConfig,
) -> RegressionReport {
    let mut report = RegressionReport::default();

    for case in cases {
        let path = resolve_path(base_dir, &case.command_file.to_string_lossy());
        let mut processor = Processor::with_registry(registry.clone(), config.clone());

        if let Err(e) = processor.load_file(&path) {
            warn!("Regression case `{}` could not be loaded: {e}", path.display());
            report.cases.push(CaseOutcome {
                command_file: case.command_file.clone(),
                verdict: CaseVerdict::Fail,
                expected_status: case.expected_status.unwrap_or(Status::Success),
                actual_status: Status::Unknown,
                problems: vec![e.to_string()],
            });
            continue;
        }

        let expected_status = case
            .expected_status
            .or_else(|| annotated_expected_status(processor.commands()))
            .unwrap_or(Status::Success);

        if !annotated_enabled(processor.commands()) {
            info!("Skipping disabled regression case `{}`", path.display());
            report.cases.push(CaseOutcome {
                command_file: case.command_file.clone(),
                verdict: CaseVerdict::Skipped,
                expected_status,
                actual_status: Status::Unknown,
                problems: Vec::new(),
            });
            continue;
        }

        let result = processor.run_all();
        let problems = check_case(case, expected_status, &result);
        let verdict = if problems.is_empty() {
            CaseVerdict::Pass
        } else {
            CaseVerdict::Fail
        };
        info!("Regression case `{}`: {verdict}", path.display());

        report.cases.push(CaseOutcome {
            command_file: case.command_file.clone(),
            verdict,
            expected_status,
            actual_status: result.status,
            problems,
        });
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_text;
    use crate::registry::global;

    fn case(commands: Vec<ExpectedCommand>) -> ExpectedCase {
        ExpectedCase {
            command_file: PathBuf::from("case.gp"),
            expected_status: None,
            commands,
        }
    }

    fn run(text: &str) -> RunResult {
        let mut processor = Processor::new();
        processor.load_text(text);
        processor.run_all()
    }

    #[test]
    fn test_annotations() {
        let commands = parse_text("#@expectedStatus Warning\n#@enabled False\nExit()\n", &global());
        assert_eq!(annotated_expected_status(&commands), Some(Status::Warning));
        assert!(!annotated_enabled(&commands));

        let plain = parse_text("Exit()\n", &global());
        assert_eq!(annotated_expected_status(&plain), None);
        assert!(annotated_enabled(&plain));
    }

    #[test]
    fn test_lower_severity_than_expected_passes() {
        let result = run("Message(Message=\"fine\")\n");
        let expectation = case(vec![ExpectedCommand {
            line: 1,
            status: Status::Warning,
            message: Some("something else".to_string()),
        }]);

        assert!(check_case(&expectation, Status::Warning, &result).is_empty());
    }

    #[test]
    fn test_higher_severity_than_expected_fails() {
        let result = run("Message(Message=\"bad\",CommandStatus=Failure)\n");
        let problems = check_case(&case(Vec::new()), Status::Warning, &result);
        assert_eq!(problems.len(), 1);
        assert!(problems[0].contains("exceeds"));
    }

    #[test]
    fn test_expected_message_checked_at_equal_severity() {
        let result = run("Message(Message=\"layer not found\",CommandStatus=Warning)\n");

        let matching = case(vec![ExpectedCommand {
            line: 1,
            status: Status::Warning,
            message: Some("not found".to_string()),
        }]);
        assert!(check_case(&matching, Status::Warning, &result).is_empty());

        let missing = case(vec![ExpectedCommand {
            line: 1,
            status: Status::Warning,
            message: Some("timeout".to_string()),
        }]);
        assert_eq!(check_case(&missing, Status::Warning, &result).len(), 1);
    }

    #[test]
    fn test_missing_line_is_a_problem() {
        let result = run("Exit()\n");
        let expectation = case(vec![ExpectedCommand {
            line: 9,
            status: Status::Success,
            message: None,
        }]);
        assert_eq!(check_case(&expectation, Status::Success, &result).len(), 1);
    }

    #[test]
    fn test_report_exit_code_and_text() {
        let report = RegressionReport {
            cases: vec![
                CaseOutcome {
                    command_file: PathBuf::from("a.gp"),
                    verdict: CaseVerdict::Pass,
                    expected_status: Status::Success,
                    actual_status: Status::Success,
                    problems: Vec::new(),
                },
                CaseOutcome {
                    command_file: PathBuf::from("b.gp"),
                    verdict: CaseVerdict::Fail,
                    expected_status: Status::Success,
                    actual_status: Status::Failure,
                    problems: vec!["Status FAILURE exceeds expected SUCCESS".to_string()],
                },
            ],
        };

        assert!(!report.is_success());
        assert_eq!(report.exit_code(), 1);

        let mut buffer = Vec::new();
        report.write_text(&mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        assert!(text.contains("FAIL    b.gp (expected SUCCESS, actual FAILURE)"));
        assert!(text.ends_with("2 cases: 1 passed, 1 failed, 0 skipped\n"));

        let yaml = report.to_yaml().unwrap();
        assert!(yaml.contains("verdict: FAIL"));
    }
}
