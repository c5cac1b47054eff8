//! Platform-agnostic types for the tirta water-quality monitoring network.
//!
//! This crate holds the data shapes exchanged with the monitoring API and
//! the small amount of pure logic attached to them: sensor and metric
//! vocabularies, command status interpretation, node form validation and
//! history query encoding. It performs no I/O.
//!
//! # Features
//!
//! - `serde` (default): `Serialize`/`Deserialize` for every wire type,
//!   with lenient number decoding for inconsistent backend columns
//!
//! # Example
//!
//! ```
//! use tirta_types::{CommandStatus, NodeTarget, SensorKind, DispatchRequest};
//!
//! let target = NodeTarget::new("12", "Kali Progo");
//! let request = DispatchRequest::calibration(&target, SensorKind::Salinity);
//! assert_eq!(request.command, "kalibrasi_ec");
//! assert!(CommandStatus::from_wire(Some("failed")).is_terminal());
//! ```

#[cfg(feature = "serde")]
pub mod de;
pub mod error;
pub mod form;
pub mod query;
pub mod types;

pub use error::{ParseError, ParseResult};
pub use form::{FieldError, NodeForm, ValidationErrors, format_field_errors, parse_metric_value};
pub use query::{HistoryQuery, format_time, parse_time};
pub use types::{
    ApiResponse, AxisScale, CommandRecord, CommandStatus, DispatchRequest, LatestData, Links,
    Metric, MetricSeries, NodeSeries, NodeSummary, NodeTarget, Pagination, RecordData,
    SensorKind, SeriesSummary, parse_timestamp,
};


/// Property-based tests for parsing untrusted input.
#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Sensor name parsing never panics.
        #[test]
        fn sensor_kind_parse_never_panics(s in ".*") {
            let _ = s.parse::<SensorKind>();
        }

        /// Unknown statuses are never terminal unless they spell done/failed.
        #[test]
        fn arbitrary_status_is_pending(s in "[a-z]{0,12}") {
            prop_assume!(s != "done" && s != "failed");
            prop_assert_eq!(CommandStatus::from_wire(Some(&s)), CommandStatus::Pending);
        }

        /// Coordinates inside range always validate.
        #[test]
        fn in_range_coordinates_validate(lat in -90.0f64..=90.0, long in -180.0f64..=180.0) {
            let form = NodeForm::new("n", lat.to_string(), long.to_string());
            prop_assert!(form.validate().is_ok());
        }

        /// Time parsing never panics.
        #[test]
        fn parse_time_never_panics(s in "\\PC{0,8}") {
            let _ = parse_time(&s);
        }
    }
}
