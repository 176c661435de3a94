//! Argument processing and validation for the `gf` CLI.
//!
//! This module turns raw command-line strings into engine inputs:
//! - **Properties**: `-p Name=Value` pairs become initial workspace properties
//! - **Selections**: `--select 1,3-5` becomes the command indices to run

pub mod processing;
pub mod validation;

pub use processing::parse_property_assignments;
pub use validation::parse_selection;
