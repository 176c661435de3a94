//! Command status values and the per-command status record.
//!
//! A [`Status`] is ordered by severity so that aggregating a set of statuses
//! is a plain `max`. Each command owns a [`CommandStatus`] that tracks the
//! validation and run phases separately, along with the log records that
//! explain how the status was reached.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

/// Outcome severity, ordered `Unknown < Success < Warning < Failure`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Status {
    #[default]
    Unknown,
    Success,
    Warning,
    Failure,
}

impl Status {
    pub const ALL: [Status; 4] = [
        Status::Unknown,
        Status::Success,
        Status::Warning,
        Status::Failure,
    ];

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Unknown => "UNKNOWN",
            Status::Success => "SUCCESS",
            Status::Warning => "WARNING",
            Status::Failure => "FAILURE",
        }
    }

    /// Returns true if `self` is more severe than `expected`.
    #[must_use]
    pub fn exceeds(&self, expected: Status) -> bool {
        *self > expected
    }
}

impl Display for Status {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "UNKNOWN" => Ok(Status::Unknown),
            "SUCCESS" => Ok(Status::Success),
            "WARNING" => Ok(Status::Warning),
            "FAILURE" => Ok(Status::Failure),
            other => Err(format!("unknown status `{other}`")),
        }
    }
}

impl<'de> Deserialize<'de> for Status {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

/// Phase of a command's lifecycle a log record belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CommandPhase {
    Validation,
    Run,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandLogRecord {
    pub phase: CommandPhase,
    pub severity: Status,
    pub problem: String,
    pub recommendation: Option<String>,
}

impl Display for CommandLogRecord {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.severity, self.problem)?;
        if let Some(recommendation) = &self.recommendation {
            write!(f, " ({recommendation})")?;
        }
        Ok(())
    }
}

/// Mutable status record owned by a single command.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CommandStatus {
    validation: Status,
    run: Status,
    records: Vec<CommandLogRecord>,
}

impl CommandStatus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.validation = Status::Unknown;
        self.run = Status::Unknown;
        self.records.clear();
    }

    /// Most severe status over both phases.
    #[must_use]
    pub fn overall(&self) -> Status {
        self.validation.max(self.run)
    }

    #[must_use]
    pub fn phase_status(&self, phase: CommandPhase) -> Status {
        match phase {
            CommandPhase::Validation => self.validation,
            CommandPhase::Run => self.run,
        }
    }

    /// Raises the phase status to at least `status`. Never lowers it.
    pub fn promote(&mut self, phase: CommandPhase, status: Status) {
        let slot = match phase {
            CommandPhase::Validation => &mut self.validation,
            CommandPhase::Run => &mut self.run,
        };
        *slot = (*slot).max(status);
    }

    pub fn add_record(
        &mut self,
        phase: CommandPhase,
        severity: Status,
        problem: impl Into<String>,
        recommendation: Option<String>,
    ) {
        self.promote(phase, severity);
        self.records.push(CommandLogRecord {
            phase,
            severity,
            problem: problem.into(),
            recommendation,
        });
    }

    #[must_use]
    pub fn records(&self) -> &[CommandLogRecord] {
        &self.records
    }

    /// Number of `FAILURE` records, used to tell whether a step added one.
    #[must_use]
    pub fn failure_count(&self) -> usize {
        self.records
            .iter()
            .filter(|record| record.severity == Status::Failure)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_ordering() {
        assert!(Status::Failure > Status::Warning);
        assert!(Status::Warning > Status::Success);
        assert!(Status::Success > Status::Unknown);
        assert_eq!(
            Status::ALL.iter().copied().max(),
            Some(Status::Failure)
        );
    }

    #[test]
    fn test_status_parse_is_case_insensitive() {
        assert_eq!("warning".parse::<Status>().unwrap(), Status::Warning);
        assert_eq!(" Failure ".parse::<Status>().unwrap(), Status::Failure);
        assert!("bogus".parse::<Status>().is_err());
    }

    #[test]
    fn test_status_deserialize_from_yaml() {
        let statuses: Vec<Status> = serde_yaml::from_str("[Success, WARNING, failure]").unwrap();
        assert_eq!(
            statuses,
            vec![Status::Success, Status::Warning, Status::Failure]
        );
    }

    #[test]
    fn test_command_status_promotion_never_lowers() {
        let mut status = CommandStatus::new();
        status.promote(CommandPhase::Run, Status::Warning);
        status.promote(CommandPhase::Run, Status::Success);
        assert_eq!(status.phase_status(CommandPhase::Run), Status::Warning);
        assert_eq!(status.overall(), Status::Warning);
    }

    #[test]
    fn test_command_status_records_and_reset() {
        let mut status = CommandStatus::new();
        status.add_record(
            CommandPhase::Validation,
            Status::Failure,
            "InputFile is required",
            Some("Specify the input file".to_string()),
        );
        assert_eq!(status.overall(), Status::Failure);
        assert_eq!(status.failure_count(), 1);
        assert_eq!(
            status.records()[0].to_string(),
            "FAILURE: InputFile is required (Specify the input file)"
        );

        status.reset();
        assert_eq!(status.overall(), Status::Unknown);
        assert!(status.records().is_empty());
    }
}
