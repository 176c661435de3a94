//! Terminal output for run results, check problems and command listings.

use std::io::Write;

use crossterm::queue;
use crossterm::style::Color::{DarkGreen, DarkGrey, DarkYellow, Red, Reset};
use crossterm::style::{Attribute, Color, Print, SetAttribute, SetForegroundColor};
use itertools::Itertools;

use geoflow_core::command_definitions::{CommandDefinition, ParameterDefinition};
use geoflow_core::error::Result;
use geoflow_core::execution::RunResult;
use geoflow_core::report::summarize;
use geoflow_core::status::Status;

/// Foreground color used for a status.
#[must_use]
pub fn status_color(status: Status) -> Color {
    match status {
        Status::Unknown => DarkGrey,
        Status::Success => DarkGreen,
        Status::Warning => DarkYellow,
        Status::Failure => Red,
    }
}

fn print_status<W: Write>(stdout: &mut W, status: Status, use_color: bool) -> Result<()> {
    let label = format!("{:<8}", status.as_str());
    if use_color {
        queue!(
            stdout,
            SetForegroundColor(status_color(status)),
            SetAttribute(Attribute::Bold),
            Print(label),
            SetAttribute(Attribute::Reset),
            SetForegroundColor(Reset),
        )?;
    } else {
        queue!(stdout, Print(label))?;
    }
    Ok(())
}

/// Print one line per executable command with its status and messages,
/// then the run summary.
///
/// # Errors
///
/// Returns an error if writing to `stdout` fails.
pub fn print_run_result<W: Write>(stdout: &mut W, result: &RunResult, use_color: bool) -> Result<()> {
    for outcome in result.outcomes.iter().filter(|o| !o.inert) {
        queue!(stdout, Print(format!("{:>4} ", outcome.line_number)))?;
        print_status(stdout, outcome.status, use_color)?;
        queue!(stdout, Print(format!(" {}\n", outcome.text.trim())))?;

        for message in &outcome.messages {
            queue!(stdout, Print(format!("              {message}\n")))?;
        }
    }

    if let Some(reason) = &result.abort {
        queue!(stdout, Print(format!("Run aborted: {reason}\n")))?;
    }

    let summary = summarize(result);
    queue!(stdout, Print("Status "))?;
    print_status(stdout, summary.status, use_color)?;
    queue!(stdout, Print(format!("\n{summary}\n")))?;

    stdout.flush()?;
    Ok(())
}

/// Print `check` problems, or a confirmation when there are none.
///
/// # Errors
///
/// Returns an error if writing to `stdout` fails.
pub fn print_problems<W: Write>(stdout: &mut W, problems: &[String], use_color: bool) -> Result<()> {
    if problems.is_empty() {
        queue!(stdout, Print("No problems found\n"))?;
    } else {
        for problem in problems {
            print_status(stdout, Status::Failure, use_color)?;
            queue!(stdout, Print(format!(" {problem}\n")))?;
        }
    }
    stdout.flush()?;
    Ok(())
}

fn describe_parameter(parameter: &ParameterDefinition) -> String {
    let mut line = format!(
        "  {:<24} {:<10} {}",
        parameter.name,
        format!("{:?}", parameter.value_type),
        if parameter.required { "required" } else { "optional" }
    );
    if let Some(default) = &parameter.default {
        line.push_str(&format!(" (default: {default})"));
    }
    if !parameter.allowed_values.is_empty() {
        line.push_str(&format!(" [{}]", parameter.allowed_values.iter().join("|")));
    }
    if let Some(description) = &parameter.description {
        line.push_str(&format!(" - {description}"));
    }
    line
}

/// One-line listing per command, sorted by name.
#[must_use]
pub fn format_command_list<'a>(definitions: impl Iterator<Item = &'a CommandDefinition>) -> String {
    definitions
        .sorted_by(|a, b| a.name.cmp(&b.name))
        .map(|definition| format!("{:<32} {}", definition.name, definition.description))
        .join("\n")
}

/// Full description of one command and its parameters.
#[must_use]
pub fn format_command_details(definition: &CommandDefinition) -> String {
    let mut lines = vec![
        definition.name.clone(),
        format!("  {}", definition.description),
    ];
    if definition.parameters.is_empty() {
        lines.push("  (no parameters)".to_string());
    } else {
        lines.push("Parameters:".to_string());
        lines.extend(definition.parameters.iter().map(describe_parameter));
    }
    lines.join("\n")
}
