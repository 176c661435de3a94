//! Typed parameter values and validation against registry metadata.
//!
//! Command files carry untyped text. Before a command runs, its raw values
//! (after `${Property}` expansion) are checked against the command's
//! [`ParameterDefinition`]s and coerced into a [`ParameterSet`] of [`Value`]s.

use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::Serialize;

use crate::command_definitions::{CommandDefinition, ParameterDefinition, ParameterType};
use crate::config::resolve_path;
use crate::error::{Error, Result};
use crate::file_handling::validate_id;

/// A typed value, used both for validated parameters and for processor properties.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Path(PathBuf),
    List(Vec<Value>),
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::String(s) => f.write_str(s),
            Value::Integer(i) => write!(f, "{i}"),
            Value::Float(n) => write!(f, "{n}"),
            Value::Boolean(b) => f.write_str(if *b { "True" } else { "False" }),
            Value::Path(p) => write!(f, "{}", p.display()),
            Value::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
        }
    }
}

impl Value {
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(n) => Some(*n),
            Value::Integer(i) => Some(*i as f64),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            Value::String(s) => parse_bool(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_path(&self) -> Option<&Path> {
        match self {
            Value::Path(p) => Some(p),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Float(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

#[must_use]
pub fn parse_bool(text: &str) -> Option<bool> {
    match text.trim().to_ascii_lowercase().as_str() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

/// Validated, typed parameters for one command execution.
///
/// Optional parameters that were not given and have no default are absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterSet {
    values: IndexMap<String, Value>,
}

impl ParameterSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: &str, value: Value) {
        self.values.insert(name.to_string(), value);
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    #[must_use]
    pub fn str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    #[must_use]
    pub fn integer(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(Value::as_i64)
    }

    #[must_use]
    pub fn float(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(Value::as_f64)
    }

    #[must_use]
    pub fn boolean(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(Value::as_bool)
    }

    #[must_use]
    pub fn path(&self, name: &str) -> Option<&Path> {
        self.get(name).and_then(Value::as_path)
    }

    /// String value of a parameter that validation guarantees to be present.
    ///
    /// # Errors
    ///
    /// Returns an error if the parameter is absent or not a string.
    pub fn require_str(&self, name: &str) -> Result<&str> {
        self.str(name)
            .ok_or_else(|| Error::Misc(format!("Parameter `{name}` is not set")))
    }

    /// Path value of a parameter that validation guarantees to be present.
    ///
    /// # Errors
    ///
    /// Returns an error if the parameter is absent or not a path.
    pub fn require_path(&self, name: &str) -> Result<&Path> {
        self.path(name)
            .ok_or_else(|| Error::Misc(format!("Parameter `{name}` is not set")))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }
}

/// One reason a command's parameters were rejected.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationProblem {
    pub parameter: Option<String>,
    pub problem: String,
    pub recommendation: String,
}

impl ValidationProblem {
    pub fn new(
        parameter: Option<&str>,
        problem: impl Into<String>,
        recommendation: impl Into<String>,
    ) -> Self {
        Self {
            parameter: parameter.map(ToString::to_string),
            problem: problem.into(),
            recommendation: recommendation.into(),
        }
    }
}

pub type ValidationResult = std::result::Result<ParameterSet, Vec<ValidationProblem>>;

/// Checks raw (already expanded) values against a command definition.
///
/// Unknown names, missing required values, disallowed values and values
/// that cannot be coerced to the declared type are all reported; the
/// problem list is returned only if it is non-empty.
pub fn validate_parameters(
    definition: &CommandDefinition,
    raw: &IndexMap<String, String>,
    working_dir: &Path,
) -> ValidationResult {
    let mut problems = Vec::new();

    for name in raw.keys() {
        if definition.find_parameter(name).is_none() {
            let valid = definition
                .parameters
                .iter()
                .map(|p| p.name.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            problems.push(ValidationProblem::new(
                Some(name),
                format!("Unknown parameter `{name}` for command {}", definition.name),
                format!("Specify only valid parameters: {valid}"),
            ));
        }
    }

    let mut parameters = ParameterSet::new();

    for parameter in &definition.parameters {
        let value = raw
            .get(&parameter.name)
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
            .or(parameter.default.as_deref());

        let Some(value) = value else {
            if parameter.required {
                problems.push(ValidationProblem::new(
                    Some(&parameter.name),
                    format!("Required parameter `{}` is missing", parameter.name),
                    format!("Specify a value for {}", parameter.name),
                ));
            }
            continue;
        };

        match coerce(parameter, value, working_dir) {
            Ok(coerced) => parameters.insert(&parameter.name, coerced),
            Err(problem) => problems.push(problem),
        }
    }

    if problems.is_empty() {
        Ok(parameters)
    } else {
        Err(problems)
    }
}

fn coerce(
    parameter: &ParameterDefinition,
    value: &str,
    working_dir: &Path,
) -> std::result::Result<Value, ValidationProblem> {
    let name = parameter.name.as_str();
    let invalid = |problem: String, recommendation: String| {
        ValidationProblem::new(Some(name), problem, recommendation)
    };

    // Free text keeps its whitespace; everything else is a keyword, number or path.
    let value = match parameter.value_type {
        ParameterType::String if parameter.allowed_values.is_empty() => value,
        _ => value.trim(),
    };

    let value = if parameter.allowed_values.is_empty() {
        value
    } else {
        parameter.canonical_allowed_value(value).ok_or_else(|| {
            invalid(
                format!("Value `{value}` is not allowed for {name}"),
                format!("Use one of: {}", parameter.allowed_values.join(", ")),
            )
        })?
    };

    match parameter.value_type {
        ParameterType::String => Ok(Value::String(value.to_string())),
        ParameterType::Integer => value.parse::<i64>().map(Value::Integer).map_err(|_| {
            invalid(
                format!("{name} value `{value}` is not an integer"),
                format!("Specify {name} as an integer"),
            )
        }),
        ParameterType::Float => value.parse::<f64>().map(Value::Float).map_err(|_| {
            invalid(
                format!("{name} value `{value}` is not a number"),
                format!("Specify {name} as a number"),
            )
        }),
        ParameterType::Boolean => parse_bool(value).map(Value::Boolean).ok_or_else(|| {
            invalid(
                format!("{name} value `{value}` is not a boolean"),
                format!("Specify {name} as True or False"),
            )
        }),
        ParameterType::Identifier => match validate_id(value) {
            Ok(()) => Ok(Value::String(value.to_string())),
            Err(e) => Err(invalid(e.to_string(), format!("Specify a valid {name}"))),
        },
        ParameterType::InputFile => {
            let path = resolve_path(working_dir, value);
            if path.is_file() {
                Ok(Value::Path(path))
            } else {
                Err(invalid(
                    format!("{name} `{}` does not exist", path.display()),
                    "Specify an existing input file".to_string(),
                ))
            }
        }
        ParameterType::OutputFile => {
            let path = resolve_path(working_dir, value);
            match path.parent() {
                Some(parent) if !parent.as_os_str().is_empty() && !parent.is_dir() => {
                    Err(invalid(
                        format!(
                            "Folder `{}` for {name} does not exist",
                            parent.display()
                        ),
                        "Create the output folder before running the command".to_string(),
                    ))
                }
                _ => Ok(Value::Path(path)),
            }
        }
        ParameterType::Path => Ok(Value::Path(resolve_path(working_dir, value))),
        ParameterType::Url => {
            if value.starts_with("http://") || value.starts_with("https://") {
                Ok(Value::String(value.to_string()))
            } else {
                Err(invalid(
                    format!("{name} `{value}` is not an http(s) URL"),
                    format!("Specify {name} starting with http:// or https://"),
                ))
            }
        }
    }
}
