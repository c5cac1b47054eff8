//! Per-day records command.

use std::path::PathBuf;

use anyhow::Result;
use tirta_core::NodeApi;

use crate::cli::OutputFormat;
use crate::format::{FormatOptions, format_records_csv, format_records_json, format_records_text};
use crate::util::{fetch, write_output};

pub async fn cmd_records(
    api: &dyn NodeApi,
    id: &str,
    format: OutputFormat,
    output: Option<&PathBuf>,
    quiet: bool,
    opts: &FormatOptions,
) -> Result<()> {
    let show_progress = !quiet && matches!(format, OutputFormat::Text);
    let records = fetch(&format!("records for node {}", id), show_progress, || {
        api.records(id)
    })
    .await?;

    let content = match format {
        OutputFormat::Json => format_records_json(&records, opts)?,
        OutputFormat::Text => format_records_text(&records, opts),
        OutputFormat::Csv => format_records_csv(&records, opts),
    };

    write_output(output, &content)?;
    Ok(())
}
