//! Command-line argument parsing.
//!
//! This module defines the command-line interface structure of the `gf`
//! binary using the `clap` crate.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Command-line arguments for the `gf` tool.
///
/// # Examples
///
/// ```rust
/// use clap::Parser;
/// use geoflow_cli::cli_args::Args;
///
/// let args = Args::parse_from(["gf", "check", "workflow.gp"]);
/// assert!(args.config_path.is_none());
/// ```
#[derive(Parser, Debug)]
#[command(name = "gf", version, about = "Run geoflow command files")]
#[command(term_width = 0)] // Just to make testing across clap features easier
pub struct Args {
    /// Path to the engine configuration YAML.
    ///
    /// If not provided, defaults to `~/.geoflow/config.yml`.
    #[arg(long, short = 'c', global = true)]
    pub config_path: Option<String>,

    #[command(subcommand)]
    pub action: Action,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Action {
    /// Run a command file and print the status of every command.
    Run {
        /// The command file to run.
        file: PathBuf,

        /// Run only these lines, e.g. `1,3-5`.
        #[arg(long, short = 's')]
        select: Option<String>,

        /// Stop at the first command that fails.
        #[arg(long, action)]
        halt_on_failure: bool,

        /// Initial properties in the format Name=Value.
        ///
        /// Multiple properties can be provided with repeated `-p` flags.
        ///
        /// # Examples
        /// ```bash
        /// gf run workflow.gp -p OutputDir=/tmp/out -p Year=2024
        /// ```
        #[arg(long = "property", short = 'p', action = clap::ArgAction::Append)]
        properties: Vec<String>,

        /// Also write the run report to this file.
        #[arg(long, short = 'r')]
        report: Option<PathBuf>,
    },

    /// Parse a command file and list problems without running it.
    Check {
        /// The command file to check.
        file: PathBuf,
    },

    /// List the available commands, or the parameters of one command.
    ListCommands {
        /// Command to describe.
        name: Option<String>,
    },

    /// Run the cases of an expected-results file.
    Regression {
        /// The expected-results YAML file.
        expected: PathBuf,

        /// Also write the report to this file.
        #[arg(long, short = 'r')]
        report: Option<PathBuf>,

        /// Print the report as YAML.
        #[arg(long, action)]
        yaml: bool,
    },
}
