//! Configuration for geoflow.
//!
//! This module provides the engine configuration structure, the default
//! configuration path, and the helpers that expand `~` and resolve relative
//! paths used in command parameters.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::Deserialize;

/// Default path for the engine configuration file
pub const DEFAULT_CONFIG_PATH: &str = "~/.geoflow/config.yml";

/// Marker that starts a comment line in a command file
pub const COMMENT_MARKER: char = '#';

/// Default upper bound on the total number of loop iterations in one run
pub const DEFAULT_MAX_LOOP_ITERATIONS: usize = 100_000;

/// Settings that shape how a processor runs its command list.
///
/// Every field is optional in the YAML file:
///
/// ```yaml
/// halt_on_failure: false
/// max_loop_iterations: 5000
/// properties:
///   OutputFolder: /tmp/out
/// ```
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// Stop the run after the first command that ends in `FAILURE`.
    pub halt_on_failure: bool,
    /// Abort the run when loops iterate more than this many times in total.
    pub max_loop_iterations: usize,
    /// Properties set on every new processor before commands run.
    pub properties: IndexMap<String, String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            halt_on_failure: false,
            max_loop_iterations: DEFAULT_MAX_LOOP_ITERATIONS,
            properties: IndexMap::new(),
        }
    }
}

/// Resolves the configuration file path.
///
/// If a custom path is provided, uses that path. Otherwise, uses the default
/// configuration path. Shell expansions like `~` are resolved.
///
/// # Examples
///
/// ```
/// use geoflow_core::config::get_config_path;
///
/// let default_path = get_config_path(None);
/// let custom_path = get_config_path(Some("/path/to/config.yml"));
/// assert_eq!(custom_path, "/path/to/config.yml");
/// ```
#[must_use]
pub fn get_config_path(config_path_arg: Option<&str>) -> String {
    let config_path = config_path_arg.unwrap_or(DEFAULT_CONFIG_PATH);

    shellexpand::tilde(config_path).to_string()
}

/// Resolves a path parameter value.
///
/// Expands `~`, then joins relative paths onto `working_dir`. Absolute paths
/// are returned unchanged.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use geoflow_core::config::resolve_path;
///
/// let resolved = resolve_path(Path::new("/data"), "layers/a.geojson");
/// assert_eq!(resolved, Path::new("/data/layers/a.geojson"));
/// ```
#[must_use]
pub fn resolve_path(working_dir: &Path, value: &str) -> PathBuf {
    let expanded = PathBuf::from(shellexpand::tilde(value).as_ref());

    if expanded.is_absolute() {
        expanded
    } else {
        working_dir.join(expanded)
    }
}
