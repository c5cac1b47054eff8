//! Mock API implementations for testing.
//!
//! This module provides in-memory stand-ins for the monitoring API so the
//! calibration controller and the CLI can be exercised without a backend.
//!
//! # Features
//!
//! - **Scripted statuses**: queue the statuses successive polls will see
//! - **Failure injection**: fail dispatch, or fail individual polls
//! - **Latency simulation**: delay responses (works with a paused Tokio clock)
//! - **Call recording**: count calls and inspect what was sent

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;

use tirta_types::{
    CommandRecord, CommandStatus, DispatchRequest, HistoryQuery, NodeForm, NodeSeries,
    NodeSummary, RecordData,
};

use crate::error::{Error, Result};
use crate::traits::{CommandApi, NodeApi};

/// One scripted answer of the status endpoint.
#[derive(Debug, Clone, PartialEq)]
pub enum MockPoll {
    /// Return a record with this raw status.
    Status(String),
    /// Return no record (`data: null`).
    Missing,
    /// Fail the request with this message.
    Fail(String),
}

impl From<CommandStatus> for MockPoll {
    fn from(status: CommandStatus) -> Self {
        MockPoll::Status(status.to_string())
    }
}

/// A mock command endpoint.
///
/// Dispatch returns ids `cmd-1`, `cmd-2`, ... in order. Polls consume the
/// scripted queue; once it is empty every poll answers `pending`.
///
/// # Example
///
/// ```
/// use tirta_core::{CommandApi, MockCommandApi};
/// use tirta_types::{CommandStatus, DispatchRequest, NodeTarget, SensorKind};
///
/// #[tokio::main]
/// async fn main() {
///     let api = MockCommandApi::new()
///         .with_statuses([CommandStatus::Pending, CommandStatus::Done]);
///     let target = NodeTarget::new("1", "Hulu");
///     let record = api
///         .dispatch(&DispatchRequest::calibration(&target, SensorKind::Ph))
///         .await
///         .unwrap();
///     assert_eq!(record.id, "cmd-1");
/// }
/// ```
#[derive(Debug, Default)]
pub struct MockCommandApi {
    polls: RwLock<VecDeque<MockPoll>>,
    dispatch_failure: RwLock<Option<String>>,
    dispatched: RwLock<Vec<DispatchRequest>>,
    polled_ids: RwLock<Vec<String>>,
    dispatch_count: AtomicU32,
    status_count: AtomicU32,
    /// Simulated dispatch latency in milliseconds (0 = no delay).
    dispatch_latency_ms: AtomicU64,
    /// Simulated status latency in milliseconds (0 = no delay).
    status_latency_ms: AtomicU64,
}

impl MockCommandApi {
    /// Create a mock that accepts every dispatch and always answers pending.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue statuses for successive polls.
    #[must_use]
    pub fn with_statuses<I, P>(self, polls: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<MockPoll>,
    {
        if let Ok(mut queue) = self.polls.try_write() {
            queue.extend(polls.into_iter().map(Into::into));
        }
        self
    }

    /// Make every dispatch fail with this message.
    #[must_use]
    pub fn with_dispatch_failure(self, message: impl Into<String>) -> Self {
        if let Ok(mut failure) = self.dispatch_failure.try_write() {
            *failure = Some(message.into());
        }
        self
    }

    /// Delay every dispatch.
    #[must_use]
    pub fn with_dispatch_latency(self, latency: Duration) -> Self {
        self.set_dispatch_latency(latency);
        self
    }

    /// Delay every status query.
    #[must_use]
    pub fn with_status_latency(self, latency: Duration) -> Self {
        self.set_status_latency(latency);
        self
    }

    /// Append one scripted poll answer.
    pub async fn push_poll(&self, poll: impl Into<MockPoll>) {
        self.polls.write().await.push_back(poll.into());
    }

    /// Set or clear the dispatch failure.
    pub async fn set_dispatch_failure(&self, message: Option<String>) {
        *self.dispatch_failure.write().await = message;
    }

    /// Set simulated dispatch latency. `Duration::ZERO` disables it.
    pub fn set_dispatch_latency(&self, latency: Duration) {
        self.dispatch_latency_ms
            .store(latency.as_millis() as u64, Ordering::Relaxed);
    }

    /// Set simulated status latency. `Duration::ZERO` disables it.
    pub fn set_status_latency(&self, latency: Duration) {
        self.status_latency_ms
            .store(latency.as_millis() as u64, Ordering::Relaxed);
    }

    /// Number of dispatch calls.
    pub fn dispatch_count(&self) -> u32 {
        self.dispatch_count.load(Ordering::Relaxed)
    }

    /// Number of status calls.
    pub fn status_count(&self) -> u32 {
        self.status_count.load(Ordering::Relaxed)
    }

    /// Every dispatch request received, in order.
    pub async fn dispatched(&self) -> Vec<DispatchRequest> {
        self.dispatched.read().await.clone()
    }

    /// The command id of every status call, in order.
    pub async fn polled_ids(&self) -> Vec<String> {
        self.polled_ids.read().await.clone()
    }

    async fn simulate_latency(ms: &AtomicU64) {
        let ms = ms.load(Ordering::Relaxed);
        if ms > 0 {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
    }
}

#[async_trait]
impl CommandApi for MockCommandApi {
    async fn dispatch(&self, request: &DispatchRequest) -> Result<CommandRecord> {
        let n = self.dispatch_count.fetch_add(1, Ordering::Relaxed) + 1;
        self.dispatched.write().await.push(request.clone());
        Self::simulate_latency(&self.dispatch_latency_ms).await;

        if let Some(message) = self.dispatch_failure.read().await.clone() {
            return Err(Error::api(500, message));
        }

        Ok(CommandRecord {
            id: format!("cmd-{n}"),
            status: Some("pending".to_string()),
            command: Some(request.command.clone()),
        })
    }

    async fn command_status(&self, command_id: &str) -> Result<Option<CommandRecord>> {
        self.status_count.fetch_add(1, Ordering::Relaxed);
        self.polled_ids.write().await.push(command_id.to_string());
        Self::simulate_latency(&self.status_latency_ms).await;

        let poll = self
            .polls
            .write()
            .await
            .pop_front()
            .unwrap_or(MockPoll::Status("pending".to_string()));

        match poll {
            MockPoll::Status(status) => Ok(Some(CommandRecord {
                id: command_id.to_string(),
                status: Some(status),
                command: None,
            })),
            MockPoll::Missing => Ok(None),
            MockPoll::Fail(message) => Err(Error::api(503, message)),
        }
    }
}

/// A mock data endpoint backed by in-memory fixtures.
#[derive(Debug, Default)]
pub struct MockNodeApi {
    nodes: RwLock<Vec<NodeSummary>>,
    series: RwLock<Vec<NodeSeries>>,
    records: RwLock<Vec<RecordData>>,
    submitted: RwLock<Vec<(Option<String>, NodeForm)>>,
    /// Number of calls that fail with a 503 before succeeding.
    remaining_failures: AtomicU32,
    call_count: AtomicU32,
}

impl MockNodeApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve these nodes from the list, position and detail endpoints.
    #[must_use]
    pub fn with_nodes(self, nodes: Vec<NodeSummary>) -> Self {
        if let Ok(mut n) = self.nodes.try_write() {
            *n = nodes;
        }
        self
    }

    /// Serve these series from the history endpoint.
    #[must_use]
    pub fn with_series(self, series: Vec<NodeSeries>) -> Self {
        if let Ok(mut s) = self.series.try_write() {
            *s = series;
        }
        self
    }

    /// Serve these rows from the per-day endpoint (filtered by node id).
    #[must_use]
    pub fn with_records(self, records: Vec<RecordData>) -> Self {
        if let Ok(mut r) = self.records.try_write() {
            *r = records;
        }
        self
    }

    /// Fail the next `count` calls with a retryable error.
    pub fn set_transient_failures(&self, count: u32) {
        self.remaining_failures.store(count, Ordering::Relaxed);
    }

    /// Total number of calls.
    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::Relaxed)
    }

    /// Registered (`None`) and updated (`Some(id)`) forms, in order.
    pub async fn submitted(&self) -> Vec<(Option<String>, NodeForm)> {
        self.submitted.read().await.clone()
    }

    fn check_failure(&self) -> Result<()> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        let remaining = self.remaining_failures.load(Ordering::Relaxed);
        if remaining > 0 {
            self.remaining_failures.store(remaining - 1, Ordering::Relaxed);
            return Err(Error::api(503, "Service Unavailable"));
        }
        Ok(())
    }
}

#[async_trait]
impl NodeApi for MockNodeApi {
    async fn list_nodes(&self) -> Result<Vec<NodeSummary>> {
        self.check_failure()?;
        Ok(self.nodes.read().await.clone())
    }

    async fn node_positions(&self) -> Result<Vec<NodeSummary>> {
        self.check_failure()?;
        Ok(self.nodes.read().await.clone())
    }

    async fn node(&self, node_id: &str) -> Result<NodeSummary> {
        self.check_failure()?;
        self.nodes
            .read()
            .await
            .iter()
            .find(|n| n.id == node_id)
            .cloned()
            .ok_or_else(|| Error::api(404, format!("Node '{node_id}' not found")))
    }

    async fn history(&self, query: &HistoryQuery) -> Result<Vec<NodeSeries>> {
        self.check_failure()?;
        query.validate()?;
        let series = self.series.read().await;
        Ok(series
            .iter()
            .filter(|s| query.nodes.is_empty() || query.nodes.contains(&s.node_id))
            .cloned()
            .collect())
    }

    async fn records(&self, node_id: &str) -> Result<Vec<RecordData>> {
        self.check_failure()?;
        Ok(self
            .records
            .read()
            .await
            .iter()
            .filter(|r| r.node_id == node_id)
            .cloned()
            .collect())
    }

    async fn register_node(&self, form: &NodeForm) -> Result<()> {
        self.check_failure()?;
        form.validate()?;
        self.submitted.write().await.push((None, form.clone()));
        Ok(())
    }

    async fn update_node(&self, node_id: &str, form: &NodeForm) -> Result<()> {
        self.check_failure()?;
        form.validate()?;
        self.submitted
            .write()
            .await
            .push((Some(node_id.to_string()), form.clone()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tirta_types::{NodeTarget, SensorKind};

    fn request() -> DispatchRequest {
        DispatchRequest::calibration(&NodeTarget::new("1", "Hulu"), SensorKind::Ph)
    }

    #[tokio::test]
    async fn test_dispatch_assigns_sequential_ids() {
        let api = MockCommandApi::new();
        assert_eq!(api.dispatch(&request()).await.unwrap().id, "cmd-1");
        assert_eq!(api.dispatch(&request()).await.unwrap().id, "cmd-2");
        assert_eq!(api.dispatch_count(), 2);
        assert_eq!(api.dispatched().await[0].command, "kalibrasi_ph");
    }

    #[tokio::test]
    async fn test_dispatch_failure() {
        let api = MockCommandApi::new().with_dispatch_failure("backend down");
        let err = api.dispatch(&request()).await.unwrap_err();
        assert!(err.to_string().contains("backend down"));
    }

    #[tokio::test]
    async fn test_scripted_polls_then_pending() {
        let api = MockCommandApi::new().with_statuses([
            MockPoll::Fail("flaky".into()),
            MockPoll::Missing,
            CommandStatus::Done.into(),
        ]);
        assert!(api.command_status("c").await.is_err());
        assert!(api.command_status("c").await.unwrap().is_none());
        let done = api.command_status("c").await.unwrap().unwrap();
        assert_eq!(done.status(), CommandStatus::Done);
        let after = api.command_status("c").await.unwrap().unwrap();
        assert_eq!(after.status(), CommandStatus::Pending);
        assert_eq!(api.status_count(), 4);
    }

    #[tokio::test]
    async fn test_node_api_transient_failures() {
        let api = MockNodeApi::new().with_nodes(vec![NodeSummary {
            id: "1".into(),
            ..NodeSummary::default()
        }]);
        api.set_transient_failures(1);
        assert!(api.list_nodes().await.is_err());
        assert_eq!(api.list_nodes().await.unwrap().len(), 1);
        assert_eq!(api.call_count(), 2);
    }

    #[tokio::test]
    async fn test_node_api_rejects_invalid_form() {
        let api = MockNodeApi::new();
        let err = api.register_node(&NodeForm::default()).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert!(api.submitted().await.is_empty());
    }
}
