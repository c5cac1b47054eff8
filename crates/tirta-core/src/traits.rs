//! Trait abstractions over the monitoring API.
//!
//! [`CommandApi`] is the only surface the calibration controller needs;
//! [`NodeApi`] covers the read/write data endpoints used by the CLI. Both
//! are implemented by [`ApiClient`](crate::ApiClient) and by the mocks in
//! [`crate::mock`].

use async_trait::async_trait;

use tirta_types::{
    CommandRecord, DispatchRequest, HistoryQuery, NodeForm, NodeSeries, NodeSummary, RecordData,
};

use crate::error::Result;

/// Command dispatch and status lookup.
///
/// # Example
///
/// ```ignore
/// use tirta_core::{CommandApi, Result};
/// use tirta_types::{DispatchRequest, NodeTarget, SensorKind};
///
/// async fn calibrate_ph<A: CommandApi>(api: &A, target: &NodeTarget) -> Result<String> {
///     let record = api.dispatch(&DispatchRequest::calibration(target, SensorKind::Ph)).await?;
///     Ok(record.id)
/// }
/// ```
#[async_trait]
pub trait CommandApi: Send + Sync {
    /// Submit a command. The returned record carries the command id.
    async fn dispatch(&self, request: &DispatchRequest) -> Result<CommandRecord>;

    /// Look up a command by id.
    ///
    /// `None` means the backend has no record yet, which callers treat as
    /// pending.
    async fn command_status(&self, command_id: &str) -> Result<Option<CommandRecord>>;
}

/// Node and measurement data endpoints.
#[async_trait]
pub trait NodeApi: Send + Sync {
    // --- Nodes ---

    /// All nodes with their latest measurement.
    async fn list_nodes(&self) -> Result<Vec<NodeSummary>>;

    /// Node positions for the map view.
    async fn node_positions(&self) -> Result<Vec<NodeSummary>>;

    /// One node by id.
    async fn node(&self, node_id: &str) -> Result<NodeSummary>;

    // --- Measurements ---

    /// History series, filtered by time window and nodes.
    async fn history(&self, query: &HistoryQuery) -> Result<Vec<NodeSeries>>;

    /// Today's records for one node.
    async fn records(&self, node_id: &str) -> Result<Vec<RecordData>>;

    // --- Registration ---

    /// Register a new node.
    async fn register_node(&self, form: &NodeForm) -> Result<()>;

    /// Update an existing node.
    async fn update_node(&self, node_id: &str, form: &NodeForm) -> Result<()>;
}
