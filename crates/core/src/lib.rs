//! Geoflow Core Library
//!
//! This crate provides the core of geoflow, a workflow engine for
//! spatial-data command files. A command file is a list of lines such as
//! `ReadGeoLayerFromGeoJSON(InputFile="in.geojson",GeoLayerID="Rivers")`;
//! the engine parses each line into a typed command, validates its
//! parameters, runs the commands in order against a shared workspace and
//! reports a status for every command.
//!
//! # Key Features
//!
//! - **Command Files**: Round-trip safe parsing and regeneration of command files
//! - **Command Registry**: Built-in commands plus user-registered ones behind one trait
//! - **Execution Engine**: `For`/`If` blocks, `${Property}` expansion, error policy and cancellation
//! - **Workspace**: Properties, GeoJSON geolayers and delimited tables shared by commands
//! - **Regression**: Expected-status files checked against real runs
//!
//! # Examples
//!
//! Running a small command list:
//!
//! ```
//! use geoflow_core::processor::Processor;
//! use geoflow_core::status::Status;
//!
//! let mut processor = Processor::new();
//! processor.load_text("SetProperty(PropertyName=Greeting,PropertyValue=Hello)\nMessage(Message=\"${Greeting}\")\n");
//! let result = processor.run_all();
//! assert_eq!(result.status, Status::Success);
//! ```

pub mod command;
pub mod command_definitions;
pub mod commands;
pub mod condition;
pub mod config;
pub mod error;
pub mod execution;
pub mod file_handling;
pub mod interpolation;
pub mod parameter;
pub mod parser;
pub mod processor;
pub mod registry;
pub mod regression;
pub mod report;
pub mod status;
