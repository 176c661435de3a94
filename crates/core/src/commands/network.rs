use std::fs;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use log::{info, warn};

use crate::command::{CommandBehavior, CommandContext};
use crate::command_definitions::{CommandDefinition, ParameterDefinition, ParameterType};
use crate::error::{Error, Result};
use crate::parameter::{ParameterSet, ValidationProblem};
use crate::registry::RegistryEntry;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const RETRY_DELAY: Duration = Duration::from_secs(1);
const MAX_RETRIES: i64 = 10;

pub(crate) fn entries() -> Vec<RegistryEntry> {
    vec![RegistryEntry::new(
        CommandDefinition::new("WebGet", "Download a URL to a file")
            .parameter(ParameterDefinition::required("URI", ParameterType::Url))
            .parameter(ParameterDefinition::required("OutputFile", ParameterType::OutputFile))
            .parameter(
                ParameterDefinition::optional("RetryCount", ParameterType::Integer)
                    .with_default("0")
                    .with_description("Extra attempts after a failed request"),
            ),
        || Arc::new(WebGet),
    )]
}

struct WebGet;

impl WebGet {
    fn fetch(client: &reqwest::blocking::Client, uri: &str) -> Result<Vec<u8>> {
        let response = client.get(uri).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::HttpStatus(uri.to_string(), status.as_u16()));
        }
        Ok(response.bytes()?.to_vec())
    }
}

impl CommandBehavior for WebGet {
    fn validate(&self, params: &ParameterSet) -> Vec<ValidationProblem> {
        match params.integer("RetryCount") {
            Some(n) if !(0..=MAX_RETRIES).contains(&n) => vec![ValidationProblem::new(
                Some("RetryCount"),
                format!("RetryCount {n} is out of range"),
                format!("Specify a RetryCount from 0 to {MAX_RETRIES}"),
            )],
            _ => Vec::new(),
        }
    }

    fn run(&self, params: &ParameterSet, ctx: &mut CommandContext<'_>) -> Result<()> {
        let uri = params.require_str("URI")?;
        let path = params.require_path("OutputFile")?;
        let retries = params.integer("RetryCount").unwrap_or(0);

        let client = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        let mut attempt = 0;
        let bytes = loop {
            if ctx.is_cancelled() {
                return Err(Error::Cancelled);
            }
            match Self::fetch(&client, uri) {
                Ok(bytes) => break bytes,
                Err(e) if attempt < retries => {
                    attempt += 1;
                    warn!("WebGet attempt {attempt} for `{uri}` failed: {e}");
                    thread::sleep(RETRY_DELAY);
                }
                Err(e) => return Err(e),
            }
        };

        let display = path.display().to_string();
        fs::write(path, &bytes).map_err(|e| Error::io_error("download", &display, e))?;
        info!("Downloaded {} bytes from `{uri}`", bytes.len());

        if attempt > 0 {
            ctx.message(format!("Downloaded `{uri}` after {} attempts", attempt + 1));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parameter::Value;

    #[test]
    fn test_retry_count_range() {
        let mut params = ParameterSet::new();
        params.insert("RetryCount", Value::Integer(3));
        assert!(WebGet.validate(&params).is_empty());

        params.insert("RetryCount", Value::Integer(-1));
        assert_eq!(WebGet.validate(&params).len(), 1);

        params.insert("RetryCount", Value::Integer(MAX_RETRIES + 1));
        assert_eq!(WebGet.validate(&params).len(), 1);
    }
}
