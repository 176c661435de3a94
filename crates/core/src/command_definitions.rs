use std::fmt::{Display, Formatter};

use serde::Serialize;

/// Shape a parameter value must have after property expansion.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterType {
    String,
    Integer,
    Float,
    Boolean,
    /// GeoLayer, table or property identifier.
    Identifier,
    /// Path to a file that must already exist.
    InputFile,
    /// Path to a file whose parent folder must already exist.
    OutputFile,
    /// Any path, existence is not checked.
    Path,
    Url,
}

impl Display for ParameterType {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ParameterType::String => "string",
            ParameterType::Integer => "integer",
            ParameterType::Float => "float",
            ParameterType::Boolean => "boolean",
            ParameterType::Identifier => "identifier",
            ParameterType::InputFile => "input file",
            ParameterType::OutputFile => "output file",
            ParameterType::Path => "path",
            ParameterType::Url => "URL",
        };
        formatter.write_str(name)
    }
}

#[derive(Serialize, Debug, Clone)]
pub struct ParameterDefinition {
    pub name: String,
    pub required: bool,
    pub value_type: ParameterType,
    pub default: Option<String>,
    /// Case-insensitive set of accepted values. Empty means unrestricted.
    pub allowed_values: Vec<String>,
    pub description: Option<String>,
}

impl ParameterDefinition {
    #[must_use]
    pub fn required(name: &str, value_type: ParameterType) -> Self {
        Self {
            name: name.to_string(),
            required: true,
            value_type,
            default: None,
            allowed_values: Vec::new(),
            description: None,
        }
    }

    #[must_use]
    pub fn optional(name: &str, value_type: ParameterType) -> Self {
        Self {
            required: false,
            ..Self::required(name, value_type)
        }
    }

    #[must_use]
    pub fn with_default(mut self, default: &str) -> Self {
        self.default = Some(default.to_string());
        self
    }

    #[must_use]
    pub fn with_allowed_values(mut self, values: &[&str]) -> Self {
        self.allowed_values = values.iter().map(ToString::to_string).collect();
        self
    }

    #[must_use]
    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    /// Returns the canonical spelling of `value` if it is in the allowed set.
    #[must_use]
    pub fn canonical_allowed_value(&self, value: &str) -> Option<&str> {
        self.allowed_values
            .iter()
            .find(|allowed| allowed.eq_ignore_ascii_case(value))
            .map(String::as_str)
    }
}

impl Display for ParameterDefinition {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "`{}` ({}", self.name, self.value_type)?;

        if self.required {
            formatter.write_str(", required")?;
        }

        if let Some(default) = &self.default {
            write!(formatter, ", default `{default}`")?;
        }

        if !self.allowed_values.is_empty() {
            write!(formatter, ", one of {}", self.allowed_values.join("|"))?;
        }

        formatter.write_str(")")?;

        if let Some(desc) = &self.description {
            write!(formatter, " {desc}")?;
        }

        Ok(())
    }
}

/// Role a command plays in block structure. Ordinary commands have none.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlRole {
    For,
    EndFor,
    If,
    EndIf,
}

impl ControlRole {
    /// The terminator that closes a block opened by this role.
    #[must_use]
    pub fn terminator(&self) -> Option<ControlRole> {
        match self {
            ControlRole::For => Some(ControlRole::EndFor),
            ControlRole::If => Some(ControlRole::EndIf),
            ControlRole::EndFor | ControlRole::EndIf => None,
        }
    }
}

#[derive(Serialize, Debug, Clone)]
pub struct CommandDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Vec<ParameterDefinition>,
    pub control: Option<ControlRole>,
}

impl CommandDefinition {
    #[must_use]
    pub fn new(name: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            parameters: Vec::new(),
            control: None,
        }
    }

    #[must_use]
    pub fn parameter(mut self, parameter: ParameterDefinition) -> Self {
        self.parameters.push(parameter);
        self
    }

    #[must_use]
    pub fn control(mut self, role: ControlRole) -> Self {
        self.control = Some(role);
        self
    }

    #[must_use]
    pub fn find_parameter(&self, name: &str) -> Option<&ParameterDefinition> {
        self.parameters.iter().find(|p| p.name == name)
    }
}

impl Display for CommandDefinition {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        if self.description.is_empty() {
            formatter.write_str(&self.name)
        } else {
            write!(formatter, "{} ({})", self.name, self.description)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parameter_definition_display() {
        let parameter = ParameterDefinition::optional("IfGeoLayerIDExists", ParameterType::String)
            .with_default("Replace")
            .with_allowed_values(&["Replace", "Warn"]);

        assert_eq!(
            parameter.to_string(),
            "`IfGeoLayerIDExists` (string, default `Replace`, one of Replace|Warn)"
        );
    }

    #[test]
    fn test_canonical_allowed_value_ignores_case() {
        let parameter = ParameterDefinition::required("OnFailure", ParameterType::String)
            .with_allowed_values(&["Continue", "Halt"]);

        assert_eq!(parameter.canonical_allowed_value("halt"), Some("Halt"));
        assert_eq!(parameter.canonical_allowed_value("stop"), None);
    }

    #[test]
    fn test_command_definition_lookup() {
        let definition = CommandDefinition::new("EndFor", "End a loop")
            .parameter(ParameterDefinition::required("Name", ParameterType::Identifier))
            .control(ControlRole::EndFor);

        assert!(definition.find_parameter("Name").is_some());
        assert!(definition.find_parameter("Other").is_none());
        assert_eq!(definition.to_string(), "EndFor (End a loop)");
        assert_eq!(ControlRole::For.terminator(), Some(ControlRole::EndFor));
        assert_eq!(ControlRole::EndIf.terminator(), None);
    }
}
