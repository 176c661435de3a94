//! The processor: an ordered command list plus the workspace it runs against.
//!
//! A [`Processor`] owns its commands, its property bag and its named
//! geolayer and table collections. Running is implemented in
//! [`crate::execution`]; this module holds the state and the editing
//! operations a front end uses between runs.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use indexmap::IndexMap;
use log::{debug, info};
use serde::Serialize;

use crate::command::{render_text, Command};
use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::file_handling::read_command_file;
use crate::parameter::Value;
use crate::parser::{parse_line, parse_text};
use crate::registry::{global, CommandRegistry};

/// Property holding the directory relative paths resolve against.
pub const WORKING_DIR_PROPERTY: &str = "WorkingDir";

/// A named spatial dataset held as a GeoJSON document.
#[derive(Debug, Clone, PartialEq)]
pub struct GeoLayer {
    pub id: String,
    pub name: String,
    pub description: String,
    pub source: Option<PathBuf>,
    pub document: serde_json::Value,
}

impl GeoLayer {
    /// Number of features, or 1 for a document that is a single geometry or feature.
    #[must_use]
    pub fn feature_count(&self) -> usize {
        self.document
            .get("features")
            .and_then(serde_json::Value::as_array)
            .map_or(1, Vec::len)
    }
}

/// A named table of string cells with a header row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub id: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub source: Option<PathBuf>,
}

impl Table {
    #[must_use]
    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }

    /// Cells of one column, top to bottom. Short rows yield empty cells.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TableColumnNotFound`] if the column does not exist.
    pub fn column_values(&self, column: &str) -> Result<Vec<String>> {
        let index = self
            .column_index(column)
            .ok_or_else(|| Error::TableColumnNotFound(self.id.clone(), column.to_string()))?;

        Ok(self
            .rows
            .iter()
            .map(|row| row.get(index).cloned().unwrap_or_default())
            .collect())
    }
}

/// Property bag and named collections shared by the commands of one processor.
#[derive(Debug, Clone, Default)]
pub struct Workspace {
    properties: IndexMap<String, Value>,
    geolayers: IndexMap<String, GeoLayer>,
    tables: IndexMap<String, Table>,
}

impl Workspace {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a property. Last write wins.
    pub fn set_property(&mut self, name: &str, value: impl Into<Value>) {
        self.properties.insert(name.to_string(), value.into());
    }

    #[must_use]
    pub fn property(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }

    /// Text form of a property, as substituted for `${name}`.
    #[must_use]
    pub fn property_text(&self, name: &str) -> Option<String> {
        self.property(name).map(ToString::to_string)
    }

    #[must_use]
    pub fn properties(&self) -> &IndexMap<String, Value> {
        &self.properties
    }

    /// Directory that relative path parameters resolve against.
    #[must_use]
    pub fn working_dir(&self) -> PathBuf {
        match self.property(WORKING_DIR_PROPERTY) {
            Some(Value::Path(path)) => path.clone(),
            Some(value) => PathBuf::from(value.to_string()),
            None => PathBuf::from("."),
        }
    }

    /// Store a geolayer, returning the one it replaced.
    pub fn add_geolayer(&mut self, layer: GeoLayer) -> Option<GeoLayer> {
        self.geolayers.insert(layer.id.clone(), layer)
    }

    #[must_use]
    pub fn geolayer(&self, id: &str) -> Option<&GeoLayer> {
        self.geolayers.get(id)
    }

    #[must_use]
    pub fn has_geolayer(&self, id: &str) -> bool {
        self.geolayers.contains_key(id)
    }

    pub fn remove_geolayer(&mut self, id: &str) -> Option<GeoLayer> {
        self.geolayers.shift_remove(id)
    }

    pub fn clear_geolayers(&mut self) {
        self.geolayers.clear();
    }

    pub fn geolayer_ids(&self) -> impl Iterator<Item = &str> {
        self.geolayers.keys().map(String::as_str)
    }

    /// Store a table, returning the one it replaced.
    pub fn add_table(&mut self, table: Table) -> Option<Table> {
        self.tables.insert(table.id.clone(), table)
    }

    #[must_use]
    pub fn table(&self, id: &str) -> Option<&Table> {
        self.tables.get(id)
    }

    #[must_use]
    pub fn has_table(&self, id: &str) -> bool {
        self.tables.contains_key(id)
    }

    pub fn remove_table(&mut self, id: &str) -> Option<Table> {
        self.tables.shift_remove(id)
    }
}

/// Shared flag for cooperative cancellation of a run.
///
/// Clones share the flag, so a token handed to another thread can stop a
/// processor between commands. A cancelled token stays cancelled until
/// [`CancelToken::reset`] is called.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RunState {
    #[default]
    Ready,
    Running,
    Completed,
    Aborted,
}

pub struct Processor {
    pub(crate) registry: Arc<CommandRegistry>,
    pub(crate) config: EngineConfig,
    pub(crate) commands: Vec<Command>,
    pub(crate) workspace: Workspace,
    pub(crate) state: RunState,
    pub(crate) cancel: CancelToken,
    pub(crate) command_file: Option<PathBuf>,
    pub(crate) depth: usize,
}

impl Default for Processor {
    fn default() -> Self {
        Self::new()
    }
}

impl Processor {
    /// A processor using the built-in commands and default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::with_registry(global(), EngineConfig::default())
    }

    #[must_use]
    pub fn with_config(config: EngineConfig) -> Self {
        Self::with_registry(global(), config)
    }

    /// A processor resolving command names through `registry`.
    ///
    /// The workspace starts with the configured properties, and `WorkingDir`
    /// set to the current directory unless the configuration provides it.
    #[must_use]
    pub fn with_registry(registry: Arc<CommandRegistry>, config: EngineConfig) -> Self {
        let mut workspace = Workspace::new();
        for (name, value) in &config.properties {
            workspace.set_property(name, value.as_str());
        }
        if workspace.property(WORKING_DIR_PROPERTY).is_none() {
            let current = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
            workspace.set_property(WORKING_DIR_PROPERTY, Value::Path(current));
        }

        Self {
            registry,
            config,
            commands: Vec::new(),
            workspace,
            state: RunState::Ready,
            cancel: CancelToken::new(),
            command_file: None,
            depth: 0,
        }
    }

    /// A nested processor, as used by `RunCommands`, sharing the caller's
    /// registry, settings and cancellation flag.
    pub(crate) fn child(
        registry: Arc<CommandRegistry>,
        config: EngineConfig,
        cancel: CancelToken,
        depth: usize,
    ) -> Self {
        let mut processor = Self::with_registry(registry, config);
        processor.cancel = cancel;
        processor.depth = depth;
        processor
    }

    /// Replace the command list with the commands parsed from `text`.
    ///
    /// Malformed lines are kept as placeholders that fail validation.
    pub fn load_text(&mut self, text: &str) {
        self.commands = parse_text(text, &self.registry);
        self.state = RunState::Ready;
        debug!("Loaded {} commands", self.commands.len());
    }

    /// Load a command file and point `WorkingDir` at its directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read.
    pub fn load_file(&mut self, path: &Path) -> Result<()> {
        let text = read_command_file(path)?;
        self.load_text(&text);

        let directory = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        self.workspace
            .set_property(WORKING_DIR_PROPERTY, Value::Path(directory));
        self.command_file = Some(path.to_path_buf());

        info!("Loaded command file `{}`", path.display());
        Ok(())
    }

    #[must_use]
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    #[must_use]
    pub fn command(&self, index: usize) -> Option<&Command> {
        self.commands.get(index)
    }

    #[must_use]
    pub fn command_file(&self) -> Option<&Path> {
        self.command_file.as_deref()
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<CommandRegistry> {
        &self.registry
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Edit one parameter of the command at `index`.
    ///
    /// # Errors
    ///
    /// Returns an error if there is no such command or it cannot be edited.
    pub fn set_command_parameter(&mut self, index: usize, name: &str, value: &str) -> Result<()> {
        self.commands
            .get_mut(index)
            .ok_or(Error::CommandIndex(index))?
            .set_parameter(name, value)
    }

    /// Parse `text` as one command and insert it before `index`.
    ///
    /// # Errors
    ///
    /// Returns an error if `index` is past the end or `text` does not parse.
    pub fn insert_command_text(&mut self, index: usize, text: &str) -> Result<()> {
        if index > self.commands.len() {
            return Err(Error::CommandIndex(index));
        }
        let command = parse_line(text, index + 1, &self.registry)?;
        self.commands.insert(index, command);
        self.renumber();
        Ok(())
    }

    /// Remove and return the command at `index`.
    ///
    /// # Errors
    ///
    /// Returns an error if there is no such command.
    pub fn remove_command(&mut self, index: usize) -> Result<Command> {
        if index >= self.commands.len() {
            return Err(Error::CommandIndex(index));
        }
        let removed = self.commands.remove(index);
        self.renumber();
        Ok(removed)
    }

    fn renumber(&mut self) {
        for (i, command) in self.commands.iter_mut().enumerate() {
            command.set_line_number(i + 1);
        }
    }

    /// Command-file text for the current list.
    #[must_use]
    pub fn to_text(&self) -> String {
        render_text(&self.commands)
    }

    #[must_use]
    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    pub fn set_property(&mut self, name: &str, value: impl Into<Value>) {
        self.workspace.set_property(name, value);
    }

    #[must_use]
    pub fn state(&self) -> RunState {
        self.state
    }

    /// Token that cancels this processor's runs.
    #[must_use]
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn set_halt_on_failure(&mut self, halt: bool) {
        self.config.halt_on_failure = halt;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::CommandKind;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_processor_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<Processor>();
    }

    #[test]
    fn test_new_processor_has_working_dir() {
        let processor = Processor::new();
        assert!(processor.workspace().property(WORKING_DIR_PROPERTY).is_some());
        assert_eq!(processor.state(), RunState::Ready);
    }

    #[test]
    fn test_config_properties_are_initial_properties() {
        let mut config = EngineConfig::default();
        config
            .properties
            .insert("OutputFolder".to_string(), "/tmp/out".to_string());
        config
            .properties
            .insert(WORKING_DIR_PROPERTY.to_string(), "/data".to_string());

        let processor = Processor::with_config(config);
        assert_eq!(
            processor.workspace().property_text("OutputFolder").as_deref(),
            Some("/tmp/out")
        );
        assert_eq!(processor.workspace().working_dir(), PathBuf::from("/data"));
    }

    #[test]
    fn test_load_file_sets_working_dir() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("workflow.gp");
        fs::write(&path, "# Workflow\nExit()\n").unwrap();

        let mut processor = Processor::new();
        processor.load_file(&path).unwrap();

        assert_eq!(processor.commands().len(), 2);
        assert_eq!(processor.workspace().working_dir(), dir.path());
        assert_eq!(processor.command_file(), Some(path.as_path()));
    }

    #[test]
    fn test_load_missing_file_is_error() {
        let dir = tempdir().unwrap();
        let mut processor = Processor::new();
        assert!(processor.load_file(&dir.path().join("missing.gp")).is_err());
    }

    #[test]
    fn test_edit_command_list() {
        let mut processor = Processor::new();
        processor.load_text("Exit()\nMessage(Message=\"a\")\n");

        processor
            .insert_command_text(1, "SetProperty(PropertyName=A,PropertyValue=1)")
            .unwrap();
        assert_eq!(processor.commands().len(), 3);
        assert_eq!(processor.command(1).unwrap().name(), "SetProperty");
        assert_eq!(processor.command(2).unwrap().line_number(), 3);

        processor.set_command_parameter(2, "Message", "b").unwrap();
        let removed = processor.remove_command(0).unwrap();
        assert_eq!(removed.name(), "Exit");

        assert_eq!(
            processor.to_text(),
            "SetProperty(PropertyName=A,PropertyValue=1)\nMessage(Message=\"b\")\n"
        );
        assert!(processor.remove_command(5).is_err());
        assert!(processor.insert_command_text(0, "Broken(").is_err());
    }

    #[test]
    fn test_load_text_keeps_malformed_lines() {
        let mut processor = Processor::new();
        processor.load_text("Message(Message=\"unterminated)\nExit()");
        assert!(matches!(
            processor.command(0).unwrap().kind(),
            CommandKind::Malformed { .. }
        ));
    }

    #[test]
    fn test_workspace_collections() {
        let mut workspace = Workspace::new();
        let table = Table {
            id: "T".to_string(),
            columns: vec!["a".to_string(), "b".to_string()],
            rows: vec![vec!["1".to_string(), "2".to_string()], vec!["3".to_string()]],
            source: None,
        };
        assert!(workspace.add_table(table.clone()).is_none());
        assert!(workspace.add_table(table).is_some());

        let t = workspace.table("T").unwrap();
        assert_eq!(t.column_values("b").unwrap(), vec!["2", ""]);
        assert!(matches!(
            t.column_values("c"),
            Err(Error::TableColumnNotFound(_, c)) if c == "c"
        ));
        assert!(workspace.remove_table("T").is_some());
        assert!(!workspace.has_table("T"));
    }

    #[test]
    fn test_cancel_token_is_shared() {
        let token = CancelToken::new();
        let clone = token.clone();
        clone.cancel();
        assert!(token.is_cancelled());
        token.reset();
        assert!(!clone.is_cancelled());
    }
}
