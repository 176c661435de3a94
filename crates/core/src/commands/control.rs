//! Block and run-control commands.
//!
//! `For`/`EndFor` and `If`/`EndIf` only declare and validate their
//! parameters here; the engine moves the instruction pointer. The helpers
//! [`loop_values`] and [`evaluate_if`] compute what the engine needs.

use std::sync::Arc;

use crate::command::{CommandBehavior, CommandContext};
use crate::command_definitions::{CommandDefinition, ControlRole, ParameterDefinition, ParameterType};
use crate::condition::evaluate_condition;
use crate::error::{Error, Result};
use crate::parameter::{ParameterSet, ValidationProblem, Value};
use crate::processor::Workspace;
use crate::registry::RegistryEntry;

pub(crate) fn entries() -> Vec<RegistryEntry> {
    vec![
        RegistryEntry::new(for_definition(), || Arc::new(For)),
        RegistryEntry::new(
            block_end_definition("EndFor", "End of a For loop", ControlRole::EndFor),
            || Arc::new(BlockEnd),
        ),
        RegistryEntry::new(if_definition(), || Arc::new(If)),
        RegistryEntry::new(
            block_end_definition("EndIf", "End of an If block", ControlRole::EndIf),
            || Arc::new(BlockEnd),
        ),
        RegistryEntry::new(
            CommandDefinition::new("Exit", "Stop the run; later commands are not run"),
            || Arc::new(Exit),
        ),
        RegistryEntry::new(
            CommandDefinition::new("SetErrorPolicy", "Choose whether a failure stops the run")
                .parameter(
                    ParameterDefinition::required("OnFailure", ParameterType::String)
                        .with_allowed_values(&["Continue", "Halt"])
                        .with_description("Continue or Halt after a failing command"),
                ),
            || Arc::new(SetErrorPolicy),
        ),
    ]
}

fn name_parameter() -> ParameterDefinition {
    ParameterDefinition::required("Name", ParameterType::Identifier)
        .with_description("Block name, matched by the closing command")
}

fn for_definition() -> CommandDefinition {
    CommandDefinition::new(
        "For",
        "Repeat the following commands for each value of a sequence, list property or table column",
    )
    .control(ControlRole::For)
    .parameter(name_parameter())
    .parameter(
        ParameterDefinition::optional("IteratorProperty", ParameterType::Identifier)
            .with_description("Property set to the current value (default: Name)"),
    )
    .parameter(ParameterDefinition::optional("SequenceStart", ParameterType::Float))
    .parameter(ParameterDefinition::optional("SequenceEnd", ParameterType::Float))
    .parameter(
        ParameterDefinition::optional("SequenceIncrement", ParameterType::Float)
            .with_description("Step between values (default: 1)"),
    )
    .parameter(
        ParameterDefinition::optional("ListProperty", ParameterType::String)
            .with_description("Property holding a list or comma-separated values"),
    )
    .parameter(ParameterDefinition::optional("TableID", ParameterType::Identifier))
    .parameter(ParameterDefinition::optional("TableColumn", ParameterType::String))
}

fn if_definition() -> CommandDefinition {
    CommandDefinition::new(
        "If",
        "Run the following commands only when every given condition holds",
    )
    .control(ControlRole::If)
    .parameter(name_parameter())
    .parameter(
        ParameterDefinition::optional("Condition", ParameterType::String)
            .with_description("`true`, `false` or `left OP right`"),
    )
    .parameter(
        ParameterDefinition::optional("CompareAsStrings", ParameterType::Boolean)
            .with_default("False"),
    )
    .parameter(ParameterDefinition::optional("GeoLayerExists", ParameterType::Identifier))
    .parameter(ParameterDefinition::optional("PropertyIsDefined", ParameterType::String))
}

fn block_end_definition(name: &str, description: &str, role: ControlRole) -> CommandDefinition {
    CommandDefinition::new(name, description)
        .control(role)
        .parameter(name_parameter())
}

struct For;

impl CommandBehavior for For {
    fn validate(&self, params: &ParameterSet) -> Vec<ValidationProblem> {
        let mut problems = Vec::new();

        let sequence = params.contains("SequenceStart") || params.contains("SequenceEnd");
        let list = params.contains("ListProperty");
        let table = params.contains("TableID") || params.contains("TableColumn");

        match [sequence, list, table].iter().filter(|s| **s).count() {
            0 => problems.push(ValidationProblem::new(
                None,
                "No values to iterate over",
                "Specify SequenceStart and SequenceEnd, ListProperty, or TableID and TableColumn",
            )),
            1 => {}
            _ => problems.push(ValidationProblem::new(
                None,
                "More than one iteration source is specified",
                "Use only one of a sequence, ListProperty, or TableID and TableColumn",
            )),
        }

        if sequence && !(params.contains("SequenceStart") && params.contains("SequenceEnd")) {
            problems.push(ValidationProblem::new(
                None,
                "A sequence needs both SequenceStart and SequenceEnd",
                "Specify SequenceStart and SequenceEnd",
            ));
        }

        if table && !(params.contains("TableID") && params.contains("TableColumn")) {
            problems.push(ValidationProblem::new(
                None,
                "A table loop needs both TableID and TableColumn",
                "Specify TableID and TableColumn",
            ));
        }

        if params.float("SequenceIncrement") == Some(0.0) {
            problems.push(ValidationProblem::new(
                Some("SequenceIncrement"),
                "SequenceIncrement may not be zero",
                "Specify a positive or negative increment",
            ));
        }

        problems
    }

    fn run(&self, _params: &ParameterSet, _ctx: &mut CommandContext<'_>) -> Result<()> {
        Ok(())
    }
}

struct If;

impl CommandBehavior for If {
    fn validate(&self, params: &ParameterSet) -> Vec<ValidationProblem> {
        let given = ["Condition", "GeoLayerExists", "PropertyIsDefined"]
            .iter()
            .any(|name| params.contains(name));

        if given {
            Vec::new()
        } else {
            vec![ValidationProblem::new(
                None,
                "No condition is specified",
                "Specify Condition, GeoLayerExists or PropertyIsDefined",
            )]
        }
    }

    fn run(&self, _params: &ParameterSet, _ctx: &mut CommandContext<'_>) -> Result<()> {
        Ok(())
    }
}

struct BlockEnd;

impl CommandBehavior for BlockEnd {
    fn run(&self, _params: &ParameterSet, _ctx: &mut CommandContext<'_>) -> Result<()> {
        Ok(())
    }
}

struct Exit;

impl CommandBehavior for Exit {
    fn run(&self, _params: &ParameterSet, ctx: &mut CommandContext<'_>) -> Result<()> {
        ctx.request_exit();
        Ok(())
    }
}

struct SetErrorPolicy;

impl CommandBehavior for SetErrorPolicy {
    fn run(&self, params: &ParameterSet, ctx: &mut CommandContext<'_>) -> Result<()> {
        let halt = params.require_str("OnFailure")? == "Halt";
        ctx.set_halt_on_failure(halt);
        Ok(())
    }
}

/// Values a validated `For` iterates over.
///
/// Numeric sequences stop after `limit + 1` values; the engine enforces the
/// iteration limit itself.
///
/// # Errors
///
/// Returns an error if the list property or table does not exist.
pub(crate) fn loop_values(
    params: &ParameterSet,
    workspace: &Workspace,
    limit: usize,
) -> Result<Vec<Value>> {
    if let (Some(start), Some(end)) = (params.float("SequenceStart"), params.float("SequenceEnd")) {
        let increment = params.float("SequenceIncrement").unwrap_or(1.0);
        return Ok(sequence(start, end, increment, limit));
    }

    if let Some(property) = params.str("ListProperty") {
        return match workspace.property(property) {
            None => Err(Error::PropertyNotFound(property.to_string())),
            Some(Value::List(items)) => Ok(items.clone()),
            Some(Value::String(text)) => Ok(text
                .split(',')
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(Value::from)
                .collect()),
            Some(_) => Err(Error::PropertyNotList(property.to_string())),
        };
    }

    let table_id = params.require_str("TableID")?;
    let column = params.require_str("TableColumn")?;
    let table = workspace
        .table(table_id)
        .ok_or_else(|| Error::TableNotFound(table_id.to_string()))?;

    Ok(table
        .column_values(column)?
        .into_iter()
        .map(Value::from)
        .collect())
}

#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn sequence(start: f64, end: f64, increment: f64, limit: usize) -> Vec<Value> {
    let integral = start.fract() == 0.0 && increment.fract() == 0.0;
    let mut values = Vec::new();

    for step in 0..=limit {
        let value = start + increment * step as f64;
        let past_end = if increment > 0.0 { value > end } else { value < end };
        if past_end {
            break;
        }
        values.push(if integral {
            Value::Integer(value as i64)
        } else {
            Value::Float(value)
        });
    }

    values
}

/// Whether every condition given to a validated `If` holds.
///
/// # Errors
///
/// Returns an error if `Condition` cannot be evaluated.
pub(crate) fn evaluate_if(params: &ParameterSet, workspace: &Workspace) -> Result<bool> {
    if let Some(condition) = params.str("Condition") {
        let as_strings = params.boolean("CompareAsStrings").unwrap_or(false);
        if !evaluate_condition(condition, as_strings).map_err(Error::Misc)? {
            return Ok(false);
        }
    }

    if let Some(id) = params.str("GeoLayerExists") {
        if !workspace.has_geolayer(id) {
            return Ok(false);
        }
    }

    if let Some(property) = params.str("PropertyIsDefined") {
        if workspace.property(property).is_none() {
            return Ok(false);
        }
    }

    Ok(true)
}
