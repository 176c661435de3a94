//! Command representation and the behavior contract every command implements.
//!
//! A [`Command`] is one line of a command file: its name, its raw parameter
//! text, what the parser resolved it to, and the status record the engine
//! fills in. The executable part of a command is a [`CommandBehavior`]
//! produced by the registry; it runs against a [`CommandContext`] that
//! borrows the processor's workspace for the duration of one call.

use std::fmt::{Debug, Formatter};
use std::sync::Arc;

use indexmap::IndexMap;
use log::{error, info, warn};

use crate::command_definitions::{CommandDefinition, ControlRole};
use crate::config::{EngineConfig, COMMENT_MARKER};
use crate::error::{Error, Result};
use crate::parameter::{ParameterSet, ValidationProblem};
use crate::processor::{CancelToken, Workspace};
use crate::registry::CommandRegistry;
use crate::status::{CommandPhase, CommandStatus, Status};

/// Executable part of a registered command variant.
pub trait CommandBehavior: Send + Sync {
    /// Checks that span several parameters, run after the per-parameter
    /// checks derived from the command definition have passed.
    fn validate(&self, _params: &ParameterSet) -> Vec<ValidationProblem> {
        Vec::new()
    }

    /// Run the command.
    ///
    /// Recoverable problems are reported with [`CommandContext::warn`];
    /// returning an error marks the command as `FAILURE`.
    ///
    /// # Errors
    ///
    /// Returns an error when the command's operation could not complete.
    fn run(&self, params: &ParameterSet, ctx: &mut CommandContext<'_>) -> Result<()>;
}

/// What the parser resolved a line to.
#[derive(Clone)]
pub enum CommandKind {
    Blank,
    Comment,
    Known {
        definition: Arc<CommandDefinition>,
        behavior: Arc<dyn CommandBehavior>,
    },
    Unknown {
        suggestion: Option<String>,
    },
    Malformed {
        reason: String,
    },
}

impl Debug for CommandKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            CommandKind::Blank => f.write_str("Blank"),
            CommandKind::Comment => f.write_str("Comment"),
            CommandKind::Known { definition, .. } => {
                f.debug_tuple("Known").field(&definition.name).finish()
            }
            CommandKind::Unknown { suggestion } => f
                .debug_struct("Unknown")
                .field("suggestion", suggestion)
                .finish(),
            CommandKind::Malformed { reason } => {
                f.debug_struct("Malformed").field("reason", reason).finish()
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct Command {
    name: String,
    line_number: usize,
    original_text: String,
    parameters: IndexMap<String, String>,
    kind: CommandKind,
    parse_warnings: Vec<String>,
    modified: bool,
    status: CommandStatus,
}

impl Command {
    pub(crate) fn inert(line_number: usize, text: &str, kind: CommandKind) -> Self {
        Self {
            name: String::new(),
            line_number,
            original_text: text.to_string(),
            parameters: IndexMap::new(),
            kind,
            parse_warnings: Vec::new(),
            modified: false,
            status: CommandStatus::new(),
        }
    }

    pub(crate) fn parsed(
        line_number: usize,
        text: &str,
        name: &str,
        parameters: IndexMap<String, String>,
        kind: CommandKind,
    ) -> Self {
        let mut command = Self::inert(line_number, text, kind);
        command.name = name.to_string();
        command.parameters = parameters;
        command.refresh_parse_warnings();
        command
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn line_number(&self) -> usize {
        self.line_number
    }

    pub(crate) fn set_line_number(&mut self, line_number: usize) {
        self.line_number = line_number;
    }

    #[must_use]
    pub fn kind(&self) -> &CommandKind {
        &self.kind
    }

    #[must_use]
    pub fn parameters(&self) -> &IndexMap<String, String> {
        &self.parameters
    }

    #[must_use]
    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.parameters.get(name).map(String::as_str)
    }

    #[must_use]
    pub fn parse_warnings(&self) -> &[String] {
        &self.parse_warnings
    }

    #[must_use]
    pub fn status(&self) -> &CommandStatus {
        &self.status
    }

    pub(crate) fn status_mut(&mut self) -> &mut CommandStatus {
        &mut self.status
    }

    #[must_use]
    pub fn definition(&self) -> Option<&Arc<CommandDefinition>> {
        match &self.kind {
            CommandKind::Known { definition, .. } => Some(definition),
            _ => None,
        }
    }

    #[must_use]
    pub fn control_role(&self) -> Option<ControlRole> {
        self.definition().and_then(|d| d.control)
    }

    /// Blank lines and comments never run.
    #[must_use]
    pub fn is_inert(&self) -> bool {
        matches!(self.kind, CommandKind::Blank | CommandKind::Comment)
    }

    #[must_use]
    pub fn is_modified(&self) -> bool {
        self.modified
    }

    /// Returns `(key, value)` for `#@key value` annotation comments.
    #[must_use]
    pub fn annotation(&self) -> Option<(&str, &str)> {
        if !matches!(self.kind, CommandKind::Comment) {
            return None;
        }
        let body = self.original_text.trim().strip_prefix(COMMENT_MARKER)?;
        let body = body.strip_prefix('@')?;
        let (key, value) = body.split_once(char::is_whitespace).unwrap_or((body, ""));
        Some((key, value.trim()))
    }

    /// Set or replace a parameter value. The command is re-rendered from its
    /// parameters from now on.
    ///
    /// # Errors
    ///
    /// Returns an error for lines that have no parameter list (blank,
    /// comment or malformed) and for values containing a double quote,
    /// which the command-file format cannot represent.
    pub fn set_parameter(&mut self, name: &str, value: &str) -> Result<()> {
        self.ensure_editable()?;
        if value.contains('"') {
            return Err(Error::Misc(format!(
                "Value for `{name}` may not contain a double quote"
            )));
        }
        self.parameters.insert(name.to_string(), value.to_string());
        self.modified = true;
        self.refresh_parse_warnings();
        Ok(())
    }

    /// Remove a parameter, returning its previous raw value.
    ///
    /// # Errors
    ///
    /// Returns an error for lines that have no parameter list.
    pub fn remove_parameter(&mut self, name: &str) -> Result<Option<String>> {
        self.ensure_editable()?;
        let removed = self.parameters.shift_remove(name);
        if removed.is_some() {
            self.modified = true;
            self.refresh_parse_warnings();
        }
        Ok(removed)
    }

    fn ensure_editable(&self) -> Result<()> {
        match self.kind {
            CommandKind::Known { .. } | CommandKind::Unknown { .. } => Ok(()),
            _ => Err(Error::Misc(format!(
                "Line {} has no parameters to edit",
                self.line_number
            ))),
        }
    }

    fn refresh_parse_warnings(&mut self) {
        if let CommandKind::Known { definition, .. } = &self.kind {
            self.parse_warnings = self
                .parameters
                .keys()
                .filter(|key| definition.find_parameter(key).is_none())
                .map(|key| format!("Parameter `{key}` is not recognized by {}", self.name))
                .collect();
        }
    }

    /// Text of this command as it belongs in a command file.
    ///
    /// Unmodified commands return their original line unchanged.
    #[must_use]
    pub fn to_command_string(&self) -> String {
        if self.modified {
            format_command(&self.name, &self.parameters)
        } else {
            self.original_text.clone()
        }
    }
}

/// Render `Name(key1="value1",key2="value2")`.
#[must_use]
pub fn format_command(name: &str, parameters: &IndexMap<String, String>) -> String {
    let rendered = parameters
        .iter()
        .map(|(key, value)| format!("{key}=\"{value}\""))
        .collect::<Vec<_>>()
        .join(",");
    format!("{name}({rendered})")
}

/// Render a command list back to command-file text, one line per command.
#[must_use]
pub fn render_text(commands: &[Command]) -> String {
    let mut text = String::new();
    for command in commands {
        text.push_str(&command.to_command_string());
        text.push('\n');
    }
    text
}

/// Run-wide switches a command may flip while it runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunFlags {
    pub halt_on_failure: bool,
    pub exit_requested: bool,
}

/// Everything a running command may touch.
pub struct CommandContext<'a> {
    pub workspace: &'a mut Workspace,
    registry: &'a Arc<CommandRegistry>,
    config: &'a EngineConfig,
    cancel: &'a CancelToken,
    flags: &'a mut RunFlags,
    status: &'a mut CommandStatus,
    command_name: &'a str,
    depth: usize,
}

impl<'a> CommandContext<'a> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        workspace: &'a mut Workspace,
        registry: &'a Arc<CommandRegistry>,
        config: &'a EngineConfig,
        cancel: &'a CancelToken,
        flags: &'a mut RunFlags,
        status: &'a mut CommandStatus,
        command_name: &'a str,
        depth: usize,
    ) -> Self {
        Self {
            workspace,
            registry,
            config,
            cancel,
            flags,
            status,
            command_name,
            depth,
        }
    }

    /// Record a recoverable problem; the command ends as `WARNING`.
    pub fn warn(&mut self, problem: impl Into<String>, recommendation: Option<&str>) {
        let problem = problem.into();
        warn!("{}: {}", self.command_name, problem);
        self.status.add_record(
            CommandPhase::Run,
            Status::Warning,
            problem,
            recommendation.map(ToString::to_string),
        );
    }

    /// Record a failure without aborting the command's own work.
    pub fn fail(&mut self, problem: impl Into<String>, recommendation: Option<&str>) {
        let problem = problem.into();
        error!("{}: {}", self.command_name, problem);
        self.status.add_record(
            CommandPhase::Run,
            Status::Failure,
            problem,
            recommendation.map(ToString::to_string),
        );
    }

    /// Record an informational message without changing the status.
    pub fn message(&mut self, message: impl Into<String>) {
        let message = message.into();
        info!("{}: {}", self.command_name, message);
        self.status
            .add_record(CommandPhase::Run, Status::Success, message, None);
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<CommandRegistry> {
        self.registry
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        self.config
    }

    #[must_use]
    pub fn cancel_token(&self) -> &CancelToken {
        self.cancel
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Nesting depth of the processor running this command; 0 for a top-level run.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Stop the run after this command completes.
    pub fn request_exit(&mut self) {
        self.flags.exit_requested = true;
    }

    pub fn set_halt_on_failure(&mut self, halt: bool) {
        self.flags.halt_on_failure = halt;
    }
}
