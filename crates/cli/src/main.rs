use std::io::{stdout, IsTerminal};
use std::process::ExitCode;

use clap::Parser;
use log::debug;

use geoflow_cli::actions::{
    check_command_file, find_command, run_command_file, run_failed, run_regression_file, RunOptions,
};
use geoflow_cli::cli_args::{Action, Args};
use geoflow_cli::output;
use geoflow_core::config::get_config_path;
use geoflow_core::error::Result;
use geoflow_core::file_handling::{get_engine_config, write_report};
use geoflow_core::registry::global;

fn exit_code(failed: bool) -> ExitCode {
    if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn execute() -> Result<ExitCode> {
    let args = Args::parse();
    debug!("Config path: `{}`", get_config_path(args.config_path.as_deref()));

    let config = get_engine_config(args.config_path.as_deref())?;
    let registry = global();
    let mut stdout = stdout();
    let use_color = stdout.is_terminal();

    match args.action {
        Action::Run {
            file,
            select,
            halt_on_failure,
            properties,
            report,
        } => {
            let options = RunOptions {
                select,
                halt_on_failure,
                properties,
                report,
            };
            let result = run_command_file(&file, &options, registry, config)?;
            output::print_run_result(&mut stdout, &result, use_color)?;
            Ok(exit_code(run_failed(&result)))
        }
        Action::Check { file } => {
            let problems = check_command_file(&file, &registry)?;
            output::print_problems(&mut stdout, &problems, use_color)?;
            Ok(exit_code(!problems.is_empty()))
        }
        Action::ListCommands { name: None } => {
            println!(
                "{}",
                output::format_command_list(registry.definitions().map(|d| &**d))
            );
            Ok(ExitCode::SUCCESS)
        }
        Action::ListCommands { name: Some(name) } => {
            let definition = find_command(&registry, &name)?;
            println!("{}", output::format_command_details(definition));
            Ok(ExitCode::SUCCESS)
        }
        Action::Regression {
            expected,
            report,
            yaml,
        } => {
            let regression = run_regression_file(&expected, &registry, &config)?;

            let text = if yaml {
                regression.to_yaml()?
            } else {
                let mut buffer = Vec::new();
                regression.write_text(&mut buffer)?;
                String::from_utf8_lossy(&buffer).into_owned()
            };
            print!("{text}");
            if let Some(report_path) = report {
                write_report(&report_path, &text)?;
            }

            Ok(ExitCode::from(regression.exit_code()))
        }
    }
}

fn main() -> ExitCode {
    env_logger::init();

    match execute() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}
