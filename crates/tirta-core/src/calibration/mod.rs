//! Remote sensor calibration workflow.
//!
//! A calibration asks one node to recalibrate one sensor, then watches the
//! command until the node reports a result or the timeout elapses.
//!
//! - [`CalibrationMachine`]: the workflow rules, as a pure transition function
//! - [`CalibrationController`]: runs the machine in a task and performs its I/O
//! - [`CalibrationHandle`]: what a UI holds to drive and observe the workflow
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use tirta_core::{ApiClient, CalibrationConfig, CalibrationController};
//! use tirta_types::{NodeTarget, SensorKind};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let api = Arc::new(ApiClient::new("https://monitoring.example.org/api")?);
//! let handle = CalibrationController::spawn(api, CalibrationConfig::default())?;
//!
//! handle.open(NodeTarget::new("12", "Hulu")).await?;
//! handle.select(SensorKind::Ph).await?;
//! handle.confirm().await?;
//!
//! let outcome = handle.wait_for_outcome().await?;
//! println!("{outcome}");
//! # Ok(())
//! # }
//! ```

mod config;
mod controller;
mod machine;

pub use config::{
    CalibrationConfig, DEFAULT_POLL_INTERVAL, DEFAULT_TICK_INTERVAL, DEFAULT_TIMEOUT,
};
pub use controller::{CalibrationController, CalibrationHandle, Intent};
pub use machine::{
    CalibrationMachine, CalibrationOutcome, CalibrationRequest, CalibrationSnapshot,
    CalibrationState, Effect, Event, FailureReason,
};
