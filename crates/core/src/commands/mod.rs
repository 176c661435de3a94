//! Built-in commands.
//!
//! Each submodule provides the definitions and behaviors for one family of
//! commands; [`builtin_entries`] collects them for the registry.

pub mod control;
pub mod geolayers;
pub mod network;
pub mod properties;
pub mod tables;
pub mod testing;

use crate::command::CommandContext;
use crate::command_definitions::{ParameterDefinition, ParameterType};
use crate::error::Result;
use crate::parameter::ParameterSet;
use crate::registry::RegistryEntry;

/// Registry entries for every built-in command, in documentation order.
#[must_use]
pub fn builtin_entries() -> Vec<RegistryEntry> {
    let mut entries = Vec::new();
    entries.extend(control::entries());
    entries.extend(properties::entries());
    entries.extend(geolayers::entries());
    entries.extend(tables::entries());
    entries.extend(network::entries());
    entries.extend(testing::entries());
    entries
}

/// What a reading command does when its target id is already in use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IfExists {
    Replace,
    ReplaceAndWarn,
    Warn,
    Fail,
}

impl IfExists {
    const VALUES: [&'static str; 4] = ["Replace", "ReplaceAndWarn", "Warn", "Fail"];

    pub(crate) fn parameter(name: &str) -> ParameterDefinition {
        ParameterDefinition::optional(name, ParameterType::String)
            .with_allowed_values(&Self::VALUES)
            .with_default("Replace")
            .with_description("Action when the ID is already in use")
    }

    pub(crate) fn from_params(params: &ParameterSet, name: &str) -> Self {
        match params.str(name) {
            Some("ReplaceAndWarn") => IfExists::ReplaceAndWarn,
            Some("Warn") => IfExists::Warn,
            Some("Fail") => IfExists::Fail,
            _ => IfExists::Replace,
        }
    }

    /// Decide whether to store a new object under `id`.
    ///
    /// Returns `Ok(false)` when the existing object is kept.
    ///
    /// # Errors
    ///
    /// Returns `exists_error` when the policy is `Fail`.
    pub(crate) fn should_store(
        self,
        ctx: &mut CommandContext<'_>,
        kind: &str,
        id: &str,
        exists: bool,
        exists_error: impl FnOnce() -> crate::error::Error,
    ) -> Result<bool> {
        if !exists {
            return Ok(true);
        }
        match self {
            IfExists::Replace => Ok(true),
            IfExists::ReplaceAndWarn => {
                ctx.warn(
                    format!("{kind} `{id}` already exists and was replaced"),
                    Some("Use a different ID to keep both"),
                );
                Ok(true)
            }
            IfExists::Warn => {
                ctx.warn(
                    format!("{kind} `{id}` already exists; keeping the existing one"),
                    Some("Free the existing object or use a different ID"),
                );
                Ok(false)
            }
            IfExists::Fail => Err(exists_error()),
        }
    }
}
