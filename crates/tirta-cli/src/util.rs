//! Utility functions for CLI operations.

use std::future::Future;
use std::io::{self, IsTerminal, Write};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tirta_core::{ApiClient, ClientConfig, Error, RetryConfig, with_retry};

use crate::config::{Config, resolve_api_url, resolve_timeout, resolve_token};
use crate::style;

/// Connection flags shared by every API command.
#[derive(Debug, Clone, Default)]
pub struct ConnectionArgs {
    pub api_url: Option<String>,
    pub token: Option<String>,
    pub request_timeout: Option<u64>,
}

/// Resolve connection settings from flags, environment and config.
pub fn client_config(args: ConnectionArgs, config: &Config) -> Result<ClientConfig> {
    let base_url = resolve_api_url(args.api_url, config).ok_or_else(|| {
        anyhow!(
            "No API URL configured. Use --api-url <URL>, set TIRTA_API_URL, \
             or run 'tirta config set api-url <URL>'."
        )
    })?;

    let mut client_config =
        ClientConfig::new(base_url).timeout(resolve_timeout(args.request_timeout, config));
    if let Some(token) = resolve_token(args.token, config) {
        client_config = client_config.token(token);
    }
    Ok(client_config)
}

/// Build the API client.
pub fn connect(args: ConnectionArgs, config: &Config) -> Result<ApiClient> {
    let client_config = client_config(args, config)?;
    tracing::debug!(base_url = %client_config.base_url, "Using monitoring API");
    ApiClient::from_config(&client_config).context("Invalid API settings")
}

/// Run an idempotent read with retries, behind a spinner on interactive stderr.
pub async fn fetch<T, F, Fut>(what: &str, show_progress: bool, operation: F) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = tirta_core::Result<T>>,
{
    fetch_with(&RetryConfig::for_read(), what, show_progress, operation).await
}

/// [`fetch`] with explicit retry settings.
pub async fn fetch_with<T, F, Fut>(
    retry: &RetryConfig,
    what: &str,
    show_progress: bool,
    operation: F,
) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = tirta_core::Result<T>>,
{
    let spinner =
        (show_progress && io::stderr().is_terminal()).then(|| style::fetching_spinner(what));

    let result = with_retry(retry, what, operation).await;

    if let Some(sp) = spinner {
        sp.finish_and_clear();
    }
    result.map_err(|e| api_error(&format!("Failed to fetch {}", what), e))
}

/// Turn a library error into a user-facing error, keeping field messages.
pub fn api_error(context: &str, err: Error) -> anyhow::Error {
    let hint = match &err {
        Error::NotReachable { .. } => Some("Check the API URL and your network connection."),
        Error::Api { status: 401 | 403, .. } => {
            Some("Check the API token (--token or TIRTA_TOKEN).")
        }
        _ => None,
    };

    let mut message = format!("{}: {}", context, err);
    // Validation errors already list their fields in the message.
    if matches!(err, Error::Api { .. })
        && let Some(fields) = err.field_messages()
    {
        message.push('\n');
        message.push_str(&fields);
    }
    if let Some(hint) = hint {
        message.push_str("\n\nTip: ");
        message.push_str(hint);
    }
    anyhow!(message)
}

/// Human-readable duration, e.g. `1m 05s`.
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs < 60 {
        format!("{}s", secs)
    } else {
        format!("{}m {:02}s", secs / 60, secs % 60)
    }
}

/// Write output to file or stdout
pub fn write_output(output: Option<&PathBuf>, content: &str) -> Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, content)
                .with_context(|| format!("Failed to write to {}", path.display()))?;
        }
        None => {
            print!("{}", content);
            io::stdout().flush()?;
        }
    }
    Ok(())
}
