//! Node listing and detail commands.

use std::path::PathBuf;

use anyhow::Result;
use tirta_core::NodeApi;

use crate::cli::OutputFormat;
use crate::format::{
    FormatOptions, format_node_csv, format_node_json, format_node_text, format_nodes_csv,
    format_nodes_json, format_nodes_text,
};
use crate::util::{fetch, write_output};

/// Which node listing to show.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeListing {
    /// Every registered node.
    All,
    /// Node positions for the map view.
    Positions,
}

pub async fn cmd_nodes(
    api: &dyn NodeApi,
    listing: NodeListing,
    format: OutputFormat,
    output: Option<&PathBuf>,
    quiet: bool,
    opts: &FormatOptions,
) -> Result<()> {
    let show_progress = !quiet && matches!(format, OutputFormat::Text);
    let (nodes, title) = match listing {
        NodeListing::All => (
            fetch("nodes", show_progress, || api.list_nodes()).await?,
            "Nodes",
        ),
        NodeListing::Positions => (
            fetch("node positions", show_progress, || api.node_positions()).await?,
            "Node positions",
        ),
    };

    let content = match format {
        OutputFormat::Json => format_nodes_json(&nodes, opts)?,
        OutputFormat::Text => format_nodes_text(&nodes, title, opts),
        OutputFormat::Csv => format_nodes_csv(&nodes, opts),
    };

    write_output(output, &content)?;
    Ok(())
}

pub async fn cmd_node(
    api: &dyn NodeApi,
    id: &str,
    format: OutputFormat,
    output: Option<&PathBuf>,
    quiet: bool,
    opts: &FormatOptions,
) -> Result<()> {
    let show_progress = !quiet && matches!(format, OutputFormat::Text);
    let node = fetch(&format!("node {}", id), show_progress, || api.node(id)).await?;

    let content = match format {
        OutputFormat::Json => format_node_json(&node, opts)?,
        OutputFormat::Text => format_node_text(&node, opts),
        OutputFormat::Csv => format_node_csv(&node, opts),
    };

    write_output(output, &content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::StyleMode;
    use tirta_core::MockNodeApi;
    use tirta_types::NodeSummary;

    fn nodes() -> Vec<NodeSummary> {
        vec![
            NodeSummary {
                id: "1".into(),
                node: "Hulu".into(),
                latitude: "-7.25".into(),
                longitude: "112.75".into(),
                ..Default::default()
            },
            NodeSummary {
                id: "2".into(),
                node: "Hilir".into(),
                latitude: "-7.30".into(),
                longitude: "112.80".into(),
                ..Default::default()
            },
        ]
    }

    #[tokio::test]
    async fn test_cmd_nodes_writes_csv() {
        let api = MockNodeApi::new().with_nodes(nodes());
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nodes.csv");
        let opts = FormatOptions::new(true, StyleMode::Plain);

        cmd_nodes(&api, NodeListing::All, OutputFormat::Csv, Some(&path), true, &opts)
            .await
            .unwrap();

        let csv = std::fs::read_to_string(&path).unwrap();
        assert_eq!(csv.lines().count(), 3);
        assert!(csv.contains("2,Hilir,-7.3,112.8"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cmd_nodes_retries_transient_failures() {
        let api = MockNodeApi::new().with_nodes(nodes());
        api.set_transient_failures(1);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nodes.json");
        let opts = FormatOptions::new(true, StyleMode::Plain);

        cmd_nodes(
            &api,
            NodeListing::Positions,
            OutputFormat::Json,
            Some(&path),
            true,
            &opts,
        )
        .await
        .unwrap();

        assert_eq!(api.call_count(), 2);
        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json.as_array().map(Vec::len), Some(2));
    }

    #[tokio::test]
    async fn test_cmd_node_unknown_id() {
        let api = MockNodeApi::new().with_nodes(nodes());
        let opts = FormatOptions::new(true, StyleMode::Plain);
        let err = cmd_node(&api, "99", OutputFormat::Text, None, true, &opts)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Failed to fetch node 99"));
    }
}
