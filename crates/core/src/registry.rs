//! Registry mapping command names to their definitions and behaviors.
//!
//! The parser resolves names through a registry, and the engine runs the
//! behaviors it created. A process-wide registry holding the built-in
//! commands is available through [`global`]; tests and embedders can build
//! their own and register extra commands.

use std::sync::{Arc, OnceLock};

use fuzzy_matcher::skim::SkimMatcherV2;
use fuzzy_matcher::FuzzyMatcher;
use indexmap::IndexMap;
use log::debug;

use crate::command::CommandBehavior;
use crate::command_definitions::{CommandDefinition, ParameterDefinition};
use crate::commands::builtin_entries;
use crate::error::{Error, Result};

/// Creates a fresh behavior instance for each parsed command.
pub type CommandFactory = Arc<dyn Fn() -> Arc<dyn CommandBehavior> + Send + Sync>;

#[derive(Clone)]
pub struct RegistryEntry {
    definition: Arc<CommandDefinition>,
    factory: CommandFactory,
}

impl RegistryEntry {
    pub fn new<F>(definition: CommandDefinition, factory: F) -> Self
    where
        F: Fn() -> Arc<dyn CommandBehavior> + Send + Sync + 'static,
    {
        Self {
            definition: Arc::new(definition),
            factory: Arc::new(factory),
        }
    }

    #[must_use]
    pub fn definition(&self) -> &Arc<CommandDefinition> {
        &self.definition
    }

    #[must_use]
    pub fn create(&self) -> Arc<dyn CommandBehavior> {
        (self.factory)()
    }
}

#[derive(Clone, Default)]
pub struct CommandRegistry {
    entries: IndexMap<String, RegistryEntry>,
}

impl CommandRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every built-in command.
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for entry in builtin_entries() {
            let name = entry.definition.name.clone();
            registry.entries.insert(name, entry);
        }
        debug!("Registered {} built-in commands", registry.len());
        registry
    }

    /// Add a command variant.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateCommand`] if the name is already taken.
    pub fn register(&mut self, entry: RegistryEntry) -> Result<()> {
        let name = entry.definition.name.clone();
        if self.entries.contains_key(&name) {
            return Err(Error::DuplicateCommand(name));
        }
        self.entries.insert(name, entry);
        Ok(())
    }

    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<&RegistryEntry> {
        self.entries.get(name)
    }

    /// Parameter definitions of a command, for editors and `list-commands`.
    #[must_use]
    pub fn parameters_for(&self, name: &str) -> Option<&[ParameterDefinition]> {
        self.lookup(name).map(|e| e.definition.parameters.as_slice())
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Command names in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn definitions(&self) -> impl Iterator<Item = &Arc<CommandDefinition>> {
        self.entries.values().map(|e| &e.definition)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Closest registered name to `name`, used for "did you mean" hints.
    #[must_use]
    pub fn suggest(&self, name: &str) -> Option<&str> {
        if let Some(exact) = self.names().find(|n| n.eq_ignore_ascii_case(name)) {
            return Some(exact);
        }

        let matcher = SkimMatcherV2::default().ignore_case();
        self.names()
            .filter_map(|candidate| {
                let forward = matcher.fuzzy_match(candidate, name);
                let backward = matcher.fuzzy_match(name, candidate);
                forward.max(backward).map(|score| (score, candidate))
            })
            .max_by_key(|(score, _)| *score)
            .map(|(_, candidate)| candidate)
    }
}

static GLOBAL_REGISTRY: OnceLock<Arc<CommandRegistry>> = OnceLock::new();

/// Process-wide registry of built-in commands, initialized on first use.
#[must_use]
pub fn global() -> Arc<CommandRegistry> {
    GLOBAL_REGISTRY
        .get_or_init(|| Arc::new(CommandRegistry::with_builtins()))
        .clone()
}
