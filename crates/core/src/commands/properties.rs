use std::path::PathBuf;
use std::sync::Arc;

use crate::command::{CommandBehavior, CommandContext};
use crate::command_definitions::{CommandDefinition, ParameterDefinition, ParameterType};
use crate::error::{Error, Result};
use crate::parameter::{parse_bool, ParameterSet, ValidationProblem, Value};
use crate::registry::RegistryEntry;

const PROPERTY_TYPES: [&str; 6] = ["String", "Integer", "Float", "Boolean", "Path", "List"];

pub(crate) fn entries() -> Vec<RegistryEntry> {
    vec![
        RegistryEntry::new(
            CommandDefinition::new("SetProperty", "Set a processor property")
                .parameter(ParameterDefinition::required("PropertyName", ParameterType::Identifier))
                .parameter(
                    ParameterDefinition::optional("PropertyType", ParameterType::String)
                        .with_allowed_values(&PROPERTY_TYPES)
                        .with_default("String"),
                )
                .parameter(ParameterDefinition::required("PropertyValue", ParameterType::String)),
            || Arc::new(SetProperty),
        ),
        RegistryEntry::new(
            CommandDefinition::new("Message", "Log a message, optionally with a status")
                .parameter(ParameterDefinition::required("Message", ParameterType::String))
                .parameter(
                    ParameterDefinition::optional("CommandStatus", ParameterType::String)
                        .with_allowed_values(&["Success", "Warning", "Failure"])
                        .with_default("Success"),
                ),
            || Arc::new(Message),
        ),
    ]
}

/// Convert property text to the requested type.
fn typed_value(property_type: &str, text: &str) -> std::result::Result<Value, String> {
    let trimmed = text.trim();
    match property_type {
        "Integer" => trimmed
            .parse::<i64>()
            .map(Value::Integer)
            .map_err(|_| format!("`{trimmed}` is not an integer")),
        "Float" => trimmed
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|_| format!("`{trimmed}` is not a number")),
        "Boolean" => parse_bool(trimmed)
            .map(Value::Boolean)
            .ok_or_else(|| format!("`{trimmed}` is not True or False")),
        "Path" => Ok(Value::Path(PathBuf::from(trimmed))),
        "List" => Ok(Value::List(
            text.split(',')
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(Value::from)
                .collect(),
        )),
        _ => Ok(Value::from(text)),
    }
}

struct SetProperty;

impl SetProperty {
    fn value(params: &ParameterSet) -> std::result::Result<Value, String> {
        let property_type = params.str("PropertyType").unwrap_or("String");
        let text = params.str("PropertyValue").unwrap_or_default();
        typed_value(property_type, text)
    }
}

impl CommandBehavior for SetProperty {
    fn validate(&self, params: &ParameterSet) -> Vec<ValidationProblem> {
        match Self::value(params) {
            Ok(_) => Vec::new(),
            Err(problem) => vec![ValidationProblem::new(
                Some("PropertyValue"),
                problem,
                "Specify a value matching PropertyType",
            )],
        }
    }

    fn run(&self, params: &ParameterSet, ctx: &mut CommandContext<'_>) -> Result<()> {
        let name = params.require_str("PropertyName")?;
        let value = Self::value(params).map_err(Error::Misc)?;
        ctx.workspace.set_property(name, value);
        Ok(())
    }
}

struct Message;

impl CommandBehavior for Message {
    fn run(&self, params: &ParameterSet, ctx: &mut CommandContext<'_>) -> Result<()> {
        let message = params.require_str("Message")?;
        match params.str("CommandStatus") {
            Some("Warning") => ctx.warn(message, None),
            Some("Failure") => ctx.fail(message, None),
            _ => ctx.message(message),
        }
        Ok(())
    }
}
