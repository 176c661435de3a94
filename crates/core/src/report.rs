//! Run summaries and plain-text run reports.

use std::fmt::{Display, Formatter};
use std::io::Write;

use indexmap::IndexMap;
use serde::Serialize;

use crate::execution::RunResult;
use crate::processor::RunState;
use crate::status::Status;

/// Per-status counts over the executable commands of one run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub state: RunState,
    pub status: Status,
    pub total: usize,
    pub counts: IndexMap<Status, usize>,
}

impl Summary {
    #[must_use]
    pub fn count(&self, status: Status) -> usize {
        self.counts.get(&status).copied().unwrap_or(0)
    }
}

impl Display for Summary {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} commands: {} success, {} warning, {} failure, {} not run. Status {}",
            self.total,
            self.count(Status::Success),
            self.count(Status::Warning),
            self.count(Status::Failure),
            self.count(Status::Unknown),
            self.status
        )?;
        if self.state == RunState::Aborted {
            f.write_str(" (aborted)")?;
        }
        Ok(())
    }
}

/// Count outcomes by status. Blank lines and comments are not counted.
#[must_use]
pub fn summarize(result: &RunResult) -> Summary {
    let mut counts: IndexMap<Status, usize> = Status::ALL.iter().map(|s| (*s, 0)).collect();
    let mut total = 0;

    for outcome in result.outcomes.iter().filter(|o| !o.inert) {
        *counts.entry(outcome.status).or_default() += 1;
        total += 1;
    }

    Summary {
        state: result.state,
        status: result.status,
        total,
        counts,
    }
}

/// Write one line per executable command, its messages indented beneath it,
/// and the summary.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn write_run_report<W: Write>(writer: &mut W, result: &RunResult) -> std::io::Result<()> {
    for outcome in result.outcomes.iter().filter(|o| !o.inert) {
        writeln!(
            writer,
            "{:>4} {:<8} {}",
            outcome.line_number,
            outcome.status.as_str(),
            outcome.text.trim()
        )?;
        for message in &outcome.messages {
            writeln!(writer, "              {message}")?;
        }
    }

    if let Some(reason) = &result.abort {
        writeln!(writer, "Run aborted: {reason}")?;
    }
    writeln!(writer, "{}", summarize(result))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::Processor;

    fn run(text: &str) -> RunResult {
        let mut processor = Processor::new();
        processor.load_text(text);
        processor.run_all()
    }

    #[test]
    fn test_summarize_counts_executable_commands() {
        let result = run(concat!(
            "# comment\n",
            "Message(Message=\"ok\")\n",
            "Message(Message=\"careful\",CommandStatus=Warning)\n",
            "NoSuchCommand()\n",
            "Exit()\n",
            "Message(Message=\"never\")\n",
        ));

        let summary = summarize(&result);
        assert_eq!(summary.total, 5);
        assert_eq!(summary.count(Status::Success), 2);
        assert_eq!(summary.count(Status::Warning), 1);
        assert_eq!(summary.count(Status::Failure), 1);
        assert_eq!(summary.count(Status::Unknown), 1);
        assert_eq!(summary.status, Status::Failure);
        assert!(summary.to_string().starts_with("5 commands: 2 success"));
    }

    #[test]
    fn test_write_run_report() {
        let result = run("Message(Message=\"hello\")\n\nNoSuchCommand()\n");

        let mut buffer = Vec::new();
        write_run_report(&mut buffer, &result).unwrap();
        let text = String::from_utf8(buffer).unwrap();

        assert!(text.contains("   1 SUCCESS  Message(Message=\"hello\")"));
        assert!(text.contains("   3 FAILURE  NoSuchCommand()"));
        assert!(text.contains("Unknown command `NoSuchCommand`"));
        assert!(text.trim_end().ends_with("Status FAILURE"));
    }
}
