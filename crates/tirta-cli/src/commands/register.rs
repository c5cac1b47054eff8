//! Node registration and update commands.

use anyhow::{Result, bail};
use tirta_core::NodeApi;
use tirta_types::{Metric, NodeForm};

use crate::cli::NodeFormArgs;
use crate::style;

/// Build the form payload from command-line fields.
pub fn build_form(args: &NodeFormArgs) -> NodeForm {
    NodeForm::new(args.node_id.trim(), args.lat.trim(), args.long.trim())
        .with_metric(Metric::Temperature, args.temp)
        .with_metric(Metric::Ph, args.ph)
        .with_metric(Metric::Salinity, args.ec)
        .with_metric(Metric::Turbidity, args.turb)
        .with_metric(Metric::DissolvedOxygen, args.dissolved_oxygen)
}

/// Register a node, or update `existing` when given.
///
/// The form is checked locally first; nothing is sent while any field is
/// invalid. Writes are never retried.
pub async fn cmd_register(
    api: &dyn NodeApi,
    args: &NodeFormArgs,
    existing: Option<&str>,
    quiet: bool,
    no_color: bool,
) -> Result<()> {
    let form = build_form(args);
    if let Err(errors) = form.validate() {
        bail!("Invalid node details:\n{}", errors);
    }

    let (result, done) = match existing {
        None => (
            api.register_node(&form).await,
            format!("Registered node {}", form.node_id),
        ),
        Some(id) => (
            api.update_node(id, &form).await,
            format!("Updated node {}", id),
        ),
    };

    let action = if existing.is_some() {
        "Failed to update node"
    } else {
        "Failed to register node"
    };
    result.map_err(|e| crate::util::api_error(action, e))?;

    tracing::info!(node_id = %form.node_id, update = existing.is_some(), "Node saved");
    if !quiet {
        eprintln!("{}", style::format_success(&done, no_color));
    }
    Ok(())
}
