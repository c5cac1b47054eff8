//! History command implementation.

use std::path::PathBuf;

use anyhow::{Context, Result};
use time::Time;
use tirta_core::{NodeApi, RetryConfig};
use tirta_types::{HistoryQuery, Metric};

use crate::cli::OutputFormat;
use crate::format::{FormatOptions, format_history_csv, format_history_json, format_history_text};
use crate::util::{fetch_with, write_output};

/// Arguments for the history command.
pub struct HistoryArgs<'a> {
    pub start: Option<Time>,
    pub end: Option<Time>,
    pub nodes: Vec<String>,
    pub metric: Option<Metric>,
    pub format: OutputFormat,
    pub output: Option<&'a PathBuf>,
    pub quiet: bool,
    pub opts: &'a FormatOptions,
}

fn build_query(start: Option<Time>, end: Option<Time>, nodes: Vec<String>) -> Result<HistoryQuery> {
    let mut query = HistoryQuery::new();
    if let Some(start) = start {
        query = query.start(start);
    }
    if let Some(end) = end {
        query = query.end(end);
    }
    for node in nodes.into_iter().filter(|n| !n.trim().is_empty()) {
        query = query.node(node.trim());
    }
    // Fail before touching the network
    query.validate().context("Invalid time window")?;
    Ok(query)
}

pub async fn cmd_history(api: &dyn NodeApi, args: HistoryArgs<'_>) -> Result<()> {
    let HistoryArgs {
        start,
        end,
        nodes,
        metric,
        format,
        output,
        quiet,
        opts,
    } = args;

    let query = build_query(start, end, nodes)?;
    let show_progress = !quiet && matches!(format, OutputFormat::Text);

    let series = fetch_with(&RetryConfig::for_history(), "history", show_progress, || {
        api.history(&query)
    })
    .await?;

    let content = match format {
        OutputFormat::Json => format_history_json(&series, metric, opts)?,
        OutputFormat::Text => format_history_text(&series, metric, opts),
        OutputFormat::Csv => format_history_csv(&series, metric, opts),
    };

    write_output(output, &content)?;
    Ok(())
}
