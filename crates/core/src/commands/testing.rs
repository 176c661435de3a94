use std::sync::Arc;

use log::info;

use crate::command::{CommandBehavior, CommandContext};
use crate::command_definitions::{CommandDefinition, ParameterDefinition, ParameterType};
use crate::error::{Error, Result};
use crate::parameter::ParameterSet;
use crate::processor::Processor;
use crate::regression::annotated_expected_status;
use crate::registry::RegistryEntry;
use crate::status::Status;

/// Deepest allowed chain of command files running each other.
pub const MAX_RUN_DEPTH: usize = 16;

pub(crate) fn entries() -> Vec<RegistryEntry> {
    vec![RegistryEntry::new(
        CommandDefinition::new(
            "RunCommands",
            "Run another command file and check its status",
        )
        .parameter(ParameterDefinition::required("CommandFile", ParameterType::InputFile))
        .parameter(
            ParameterDefinition::optional("ExpectedStatus", ParameterType::String)
                .with_allowed_values(&["Success", "Warning", "Failure"])
                .with_description("Default: the file's #@expectedStatus, else Success"),
        ),
        || Arc::new(RunCommands),
    )]
}

struct RunCommands;

impl CommandBehavior for RunCommands {
    fn run(&self, params: &ParameterSet, ctx: &mut CommandContext<'_>) -> Result<()> {
        let path = params.require_path("CommandFile")?;

        if ctx.depth() + 1 > MAX_RUN_DEPTH {
            return Err(Error::Misc(format!(
                "RunCommands is nested more than {MAX_RUN_DEPTH} levels deep"
            )));
        }

        let mut child = Processor::child(
            ctx.registry().clone(),
            ctx.config().clone(),
            ctx.cancel_token().clone(),
            ctx.depth() + 1,
        );
        child.load_file(path)?;

        let expected = match params.str("ExpectedStatus") {
            Some(text) => text.parse::<Status>().map_err(Error::Misc)?,
            None => annotated_expected_status(child.commands()).unwrap_or(Status::Success),
        };

        let result = child.run_all();
        info!(
            "RunCommands `{}` finished with {} (expected {expected})",
            path.display(),
            result.status
        );

        if let Some(reason) = &result.abort {
            ctx.fail(
                format!("Command file `{}` was aborted: {reason}", path.display()),
                None,
            );
        } else if result.status.exceeds(expected) {
            let failed_lines = result
                .outcomes
                .iter()
                .filter(|o| o.status.exceeds(expected))
                .map(|o| o.line_number.to_string())
                .collect::<Vec<_>>()
                .join(", ");
            ctx.fail(
                format!(
                    "Command file `{}` ended with {} but {expected} was expected",
                    path.display(),
                    result.status
                ),
                Some(&format!("Check lines {failed_lines}")),
            );
        } else {
            ctx.message(format!(
                "Command file `{}` ended with {}",
                path.display(),
                result.status
            ));
        }
        Ok(())
    }
}
