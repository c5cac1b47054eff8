//! Command implementations for the CLI.

mod calibrate;
mod config;
mod history;
mod nodes;
mod records;
mod register;

pub use calibrate::{CalibrateArgs, cmd_calibrate};
pub use config::cmd_config;
pub use history::{HistoryArgs, cmd_history};
pub use nodes::{NodeListing, cmd_node, cmd_nodes};
pub use records::cmd_records;
pub use register::cmd_register;
