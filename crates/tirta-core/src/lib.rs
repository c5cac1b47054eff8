//! API client and calibration command controller for water-quality
//! monitoring nodes.
//!
//! This crate talks to the monitoring backend over HTTP and runs the remote
//! sensor calibration workflow: dispatch a calibration command to a node,
//! poll its status, and settle on success, failure or timeout.
//!
//! # Features
//!
//! - **Calibration workflow**: a pure state machine plus an async controller
//!   that owns polling, timeouts and cancellation
//! - **API client**: typed access to node, history and command endpoints
//!   (`http-client` feature, on by default)
//! - **Retry**: exponential backoff with jitter for idempotent reads
//! - **Mocks**: scripted in-memory APIs for tests and demos
//!
//! # Quick Start
//!
//! ```no_run
//! use tirta_core::{ApiClient, ClientConfig, NodeApi};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = ApiClient::from_config(
//!         &ClientConfig::new("https://monitoring.example.org/api").token("secret"),
//!     )?;
//!
//!     for node in client.list_nodes().await? {
//!         println!("{}: {:?}", node.node, node.latest_data);
//!     }
//!     Ok(())
//! }
//! ```

pub mod calibration;
#[cfg(feature = "http-client")]
pub mod client;
pub mod error;
pub mod events;
pub mod mock;
pub mod retry;
pub mod traits;

// Core exports
pub use calibration::{
    CalibrationConfig, CalibrationController, CalibrationHandle, CalibrationMachine,
    CalibrationOutcome, CalibrationSnapshot, CalibrationState, FailureReason,
};
#[cfg(feature = "http-client")]
pub use client::{ApiClient, ClientConfig};
pub use error::{Error, Result};
pub use events::{CalibrationEvent, EventDispatcher, EventReceiver, EventSender};
pub use mock::{MockCommandApi, MockNodeApi, MockPoll};
pub use retry::{RetryConfig, with_retry};
pub use traits::{CommandApi, NodeApi};

// Re-export from tirta-types
pub use tirta_types::{
    CommandRecord, CommandStatus, DispatchRequest, Metric, NodeTarget, SensorKind,
};
