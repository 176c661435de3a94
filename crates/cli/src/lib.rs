//! Geoflow CLI Library
//!
//! This crate provides the `gf` command-line front end for geoflow. It parses
//! arguments, hands command files to the engine in `geoflow-core` and prints
//! per-command statuses in color.
//!
//! # Architecture
//!
//! - [`cli_args`]: Command-line argument parsing with `clap`
//! - [`arguments`]: `-p Name=Value` properties and `--select` line selections
//! - [`actions`]: The work behind each subcommand
//! - [`output`]: Terminal rendering of results and command listings
//!
//! # Examples
//!
//! ```bash
//! # Run a command file
//! gf run workflow.gp
//!
//! # Run lines 1 and 3 to 5 with an initial property, stopping at the first failure
//! gf run workflow.gp --select 1,3-5 -p OutputDir=/tmp/out --halt-on-failure
//!
//! # Check a command file without running it
//! gf check workflow.gp
//!
//! # Describe a command
//! gf list-commands ReadGeoLayerFromGeoJSON
//!
//! # Run regression cases and save the report
//! gf regression tests/expected.yml --report regression.txt
//! ```

pub mod actions;
pub mod arguments;
pub mod cli_args;
pub mod output;
