//! Core types for water-quality node data.

use core::fmt;
use core::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;

use crate::error::ParseError;

/// A sensor that can be recalibrated remotely.
///
/// This is the canonical calibration vocabulary. The backend and older
/// dashboard screens use two spellings for the same targets (`ph` / `ec` /
/// `do` / `turb` and `kalibrasi_ph` / `kalibrasi_ec` / ...); [`FromStr`]
/// accepts both, and [`SensorKind::command`] produces the one the command
/// endpoint expects.
///
/// ```
/// use tirta_types::SensorKind;
///
/// assert_eq!("ec".parse::<SensorKind>(), Ok(SensorKind::Salinity));
/// assert_eq!("kalibrasi_do".parse::<SensorKind>(), Ok(SensorKind::DissolvedOxygen));
/// assert_eq!(SensorKind::Ph.command(), "kalibrasi_ph");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[non_exhaustive]
pub enum SensorKind {
    /// pH probe.
    Ph,
    /// Conductivity / salinity probe.
    Salinity,
    /// Dissolved oxygen probe.
    DissolvedOxygen,
    /// Turbidity probe.
    Turbidity,
}

impl SensorKind {
    /// All calibration targets, in display order.
    pub const ALL: [SensorKind; 4] = [
        SensorKind::Ph,
        SensorKind::Salinity,
        SensorKind::DissolvedOxygen,
        SensorKind::Turbidity,
    ];

    /// Command identifier sent to the dispatch endpoint.
    #[must_use]
    pub fn command(&self) -> &'static str {
        match self {
            SensorKind::Ph => "kalibrasi_ph",
            SensorKind::Salinity => "kalibrasi_ec",
            SensorKind::DissolvedOxygen => "kalibrasi_do",
            SensorKind::Turbidity => "kalibrasi_turb",
        }
    }

    /// Short code, identical to the metric key in data payloads.
    #[must_use]
    pub fn code(&self) -> &'static str {
        self.metric().key()
    }

    /// Human-readable name.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            SensorKind::Ph => "pH sensor",
            SensorKind::Salinity => "Salinity sensor",
            SensorKind::DissolvedOxygen => "Dissolved oxygen sensor",
            SensorKind::Turbidity => "Turbidity sensor",
        }
    }

    /// The metric this sensor measures.
    #[must_use]
    pub fn metric(&self) -> Metric {
        match self {
            SensorKind::Ph => Metric::Ph,
            SensorKind::Salinity => Metric::Salinity,
            SensorKind::DissolvedOxygen => Metric::DissolvedOxygen,
            SensorKind::Turbidity => Metric::Turbidity,
        }
    }
}

impl FromStr for SensorKind {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace(['-', ' '], "_");
        let bare = normalized
            .strip_prefix("kalibrasi_")
            .unwrap_or(normalized.as_str());
        match bare {
            "ph" => Ok(SensorKind::Ph),
            "ec" | "salinity" | "salinitas" | "conductivity" => Ok(SensorKind::Salinity),
            "do" | "dissolved_oxygen" | "oxygen" => Ok(SensorKind::DissolvedOxygen),
            "turb" | "turbidity" | "kekeruhan" => Ok(SensorKind::Turbidity),
            _ => Err(ParseError::UnknownSensorKind(s.to_string())),
        }
    }
}

impl fmt::Display for SensorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Chart axis policy for a metric.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisScale {
    /// Suggested upper bound of the y axis.
    pub max: f64,
    /// Tick step.
    pub step: f64,
}

/// A quantity measured by every node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[non_exhaustive]
pub enum Metric {
    /// Water temperature (°C).
    Temperature,
    /// pH (dimensionless).
    Ph,
    /// Conductivity / salinity (mS/cm).
    Salinity,
    /// Turbidity (NTU).
    Turbidity,
    /// Dissolved oxygen (mg/L).
    DissolvedOxygen,
}

impl Metric {
    /// All metrics, in dashboard order.
    pub const ALL: [Metric; 5] = [
        Metric::Temperature,
        Metric::Ph,
        Metric::Salinity,
        Metric::Turbidity,
        Metric::DissolvedOxygen,
    ];

    /// Field name used by the API.
    #[must_use]
    pub fn key(&self) -> &'static str {
        match self {
            Metric::Temperature => "temp",
            Metric::Ph => "ph",
            Metric::Salinity => "ec",
            Metric::Turbidity => "turb",
            Metric::DissolvedOxygen => "do",
        }
    }

    /// Human-readable name.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Metric::Temperature => "Temperature",
            Metric::Ph => "pH",
            Metric::Salinity => "Salinity",
            Metric::Turbidity => "Turbidity",
            Metric::DissolvedOxygen => "Dissolved oxygen",
        }
    }

    /// Display unit, empty for pH.
    #[must_use]
    pub fn unit(&self) -> &'static str {
        match self {
            Metric::Temperature => "°C",
            Metric::Ph => "",
            Metric::Salinity => "mS/cm",
            Metric::Turbidity => "NTU",
            Metric::DissolvedOxygen => "mg/L",
        }
    }

    /// Y axis bound and step used when charting this metric.
    #[must_use]
    pub fn axis(&self) -> AxisScale {
        let (max, step) = match self {
            Metric::Temperature => (100.0, 5.0),
            Metric::Ph => (14.0, 1.0),
            Metric::Salinity => (200.0, 20.0),
            Metric::Turbidity => (1000.0, 100.0),
            Metric::DissolvedOxygen => (20.0, 2.0),
        };
        AxisScale { max, step }
    }

    /// Format a value with this metric's unit.
    #[must_use]
    pub fn format_value(&self, value: f64) -> String {
        match self.unit() {
            "" => format!("{value:.2}"),
            unit => format!("{value:.2} {unit}"),
        }
    }
}

impl FromStr for Metric {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace(['-', ' '], "_").as_str() {
            "temp" | "temperature" | "suhu" => Ok(Metric::Temperature),
            "ph" => Ok(Metric::Ph),
            "ec" | "salinity" | "salinitas" | "conductivity" => Ok(Metric::Salinity),
            "turb" | "turbidity" | "kekeruhan" => Ok(Metric::Turbidity),
            "do" | "dissolved_oxygen" | "oxygen" => Ok(Metric::DissolvedOxygen),
            _ => Err(ParseError::UnknownMetric(s.to_string())),
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Status of a remote command as reported by the status endpoint.
///
/// Only `done` and `failed` are terminal. Every other value, including a
/// missing status, means the node has not finished yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum CommandStatus {
    /// Not yet terminal.
    Pending,
    /// The node completed the command.
    Done,
    /// The node reported failure.
    Failed,
}

impl CommandStatus {
    /// Interpret a raw status string from the API.
    ///
    /// ```
    /// use tirta_types::CommandStatus;
    ///
    /// assert_eq!(CommandStatus::from_wire(Some("done")), CommandStatus::Done);
    /// assert_eq!(CommandStatus::from_wire(Some("queued")), CommandStatus::Pending);
    /// assert_eq!(CommandStatus::from_wire(None), CommandStatus::Pending);
    /// ```
    #[must_use]
    pub fn from_wire(raw: Option<&str>) -> Self {
        match raw.map(|s| s.trim().to_lowercase()).as_deref() {
            Some("done") => CommandStatus::Done,
            Some("failed") => CommandStatus::Failed,
            _ => CommandStatus::Pending,
        }
    }

    /// Whether polling should stop.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, CommandStatus::Pending)
    }
}

impl fmt::Display for CommandStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandStatus::Pending => write!(f, "pending"),
            CommandStatus::Done => write!(f, "done"),
            CommandStatus::Failed => write!(f, "failed"),
        }
    }
}

/// The node a calibration is addressed to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NodeTarget {
    /// Opaque node identifier.
    pub node_id: String,
    /// Display name sent along with the command.
    pub name: String,
}

impl NodeTarget {
    /// Create a target from an id and display name.
    pub fn new(node_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for NodeTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.node_id)
    }
}

/// Body of a command dispatch request.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DispatchRequest {
    /// Target node id.
    #[cfg_attr(feature = "serde", serde(rename = "nodeID"))]
    pub node_id: String,
    /// Target node display name.
    pub node: String,
    /// Command identifier, e.g. `kalibrasi_ph`.
    pub command: String,
}

impl DispatchRequest {
    /// Build the calibration command for a target and sensor.
    #[must_use]
    pub fn calibration(target: &NodeTarget, kind: SensorKind) -> Self {
        Self {
            node_id: target.node_id.clone(),
            node: target.name.clone(),
            command: kind.command().to_string(),
        }
    }
}

/// A command record as returned by the dispatch and status endpoints.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CommandRecord {
    /// Command identifier.
    #[cfg_attr(
        feature = "serde",
        serde(default, deserialize_with = "crate::de::lenient_string")
    )]
    pub id: String,
    /// Raw status string (`pending`, `done`, `failed`, ...).
    #[cfg_attr(feature = "serde", serde(default))]
    pub status: Option<String>,
    /// Command identifier as stored by the backend.
    #[cfg_attr(feature = "serde", serde(default))]
    pub command: Option<String>,
}

impl CommandRecord {
    /// Interpreted status.
    #[must_use]
    pub fn status(&self) -> CommandStatus {
        CommandStatus::from_wire(self.status.as_deref())
    }
}

/// Most recent measurement of a node.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LatestData {
    #[cfg_attr(
        feature = "serde",
        serde(default, deserialize_with = "crate::de::lenient_string")
    )]
    pub id: String,
    #[cfg_attr(
        feature = "serde",
        serde(default, deserialize_with = "crate::de::lenient_string")
    )]
    pub node_id: String,
    #[cfg_attr(
        feature = "serde",
        serde(default, deserialize_with = "crate::de::lenient_f64")
    )]
    pub ec: f64,
    #[cfg_attr(
        feature = "serde",
        serde(default, deserialize_with = "crate::de::lenient_f64")
    )]
    pub temp: f64,
    #[cfg_attr(
        feature = "serde",
        serde(default, deserialize_with = "crate::de::lenient_f64")
    )]
    pub ph: f64,
    #[cfg_attr(
        feature = "serde",
        serde(rename = "do", default, deserialize_with = "crate::de::lenient_f64")
    )]
    pub dissolved_oxygen: f64,
    #[cfg_attr(
        feature = "serde",
        serde(default, deserialize_with = "crate::de::lenient_f64")
    )]
    pub turb: f64,
    #[cfg_attr(feature = "serde", serde(default))]
    pub created_at: Option<String>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub updated_at: Option<String>,
}

impl LatestData {
    /// Value of one metric.
    #[must_use]
    pub fn value(&self, metric: Metric) -> f64 {
        match metric {
            Metric::Temperature => self.temp,
            Metric::Ph => self.ph,
            Metric::Salinity => self.ec,
            Metric::Turbidity => self.turb,
            Metric::DissolvedOxygen => self.dissolved_oxygen,
        }
    }
}

/// A registered node with its position and latest measurement.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NodeSummary {
    #[cfg_attr(
        feature = "serde",
        serde(default, deserialize_with = "crate::de::lenient_string")
    )]
    pub id: String,
    /// Display name.
    #[cfg_attr(feature = "serde", serde(default))]
    pub node: String,
    #[cfg_attr(
        feature = "serde",
        serde(default, deserialize_with = "crate::de::lenient_string")
    )]
    pub longitude: String,
    #[cfg_attr(
        feature = "serde",
        serde(default, deserialize_with = "crate::de::lenient_string")
    )]
    pub latitude: String,
    #[cfg_attr(feature = "serde", serde(default))]
    pub created_at: Option<String>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub updated_at: Option<String>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub latest_data: Option<LatestData>,
}

impl NodeSummary {
    /// Parsed `(latitude, longitude)`, if both are numeric.
    #[must_use]
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        let lat = self.latitude.trim().parse::<f64>().ok()?;
        let long = self.longitude.trim().parse::<f64>().ok()?;
        Some((lat, long))
    }

    /// Calibration target for this node.
    #[must_use]
    pub fn target(&self) -> NodeTarget {
        NodeTarget::new(self.id.clone(), self.node.clone())
    }
}

/// Summary statistics of one metric series.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SeriesSummary {
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub last: f64,
}

/// Time series of every metric for one node.
///
/// All vectors are index-aligned with `timestamps`.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MetricSeries {
    #[cfg_attr(
        feature = "serde",
        serde(default, deserialize_with = "crate::de::lenient_f64_vec")
    )]
    pub ec: Vec<f64>,
    #[cfg_attr(
        feature = "serde",
        serde(default, deserialize_with = "crate::de::lenient_f64_vec")
    )]
    pub temp: Vec<f64>,
    #[cfg_attr(
        feature = "serde",
        serde(default, deserialize_with = "crate::de::lenient_f64_vec")
    )]
    pub ph: Vec<f64>,
    #[cfg_attr(
        feature = "serde",
        serde(default, deserialize_with = "crate::de::lenient_f64_vec")
    )]
    pub turb: Vec<f64>,
    #[cfg_attr(
        feature = "serde",
        serde(rename = "do", default, deserialize_with = "crate::de::lenient_f64_vec")
    )]
    pub dissolved_oxygen: Vec<f64>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub timestamps: Vec<String>,
}

impl MetricSeries {
    /// Values of one metric.
    #[must_use]
    pub fn values(&self, metric: Metric) -> &[f64] {
        match metric {
            Metric::Temperature => &self.temp,
            Metric::Ph => &self.ph,
            Metric::Salinity => &self.ec,
            Metric::Turbidity => &self.turb,
            Metric::DissolvedOxygen => &self.dissolved_oxygen,
        }
    }

    /// Number of samples (length of the timestamp axis).
    #[must_use]
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    /// Whether the series has no samples.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    /// Count, min, max, mean and last value of one metric.
    ///
    /// Returns `None` when the metric has no values.
    #[must_use]
    pub fn summary(&self, metric: Metric) -> Option<SeriesSummary> {
        let values = self.values(metric);
        let last = *values.last()?;
        let (min, max, sum) = values.iter().fold(
            (f64::INFINITY, f64::NEG_INFINITY, 0.0),
            |(min, max, sum), &v| (min.min(v), max.max(v), sum + v),
        );
        Some(SeriesSummary {
            count: values.len(),
            min,
            max,
            mean: sum / values.len() as f64,
            last,
        })
    }
}

/// History series of one node, as returned by the graph endpoint.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NodeSeries {
    #[cfg_attr(
        feature = "serde",
        serde(default, deserialize_with = "crate::de::lenient_string")
    )]
    pub node_id: String,
    #[cfg_attr(feature = "serde", serde(default))]
    pub node: String,
    #[cfg_attr(
        feature = "serde",
        serde(default, deserialize_with = "crate::de::lenient_string")
    )]
    pub latitude: String,
    #[cfg_attr(
        feature = "serde",
        serde(default, deserialize_with = "crate::de::lenient_string")
    )]
    pub longitude: String,
    #[cfg_attr(feature = "serde", serde(default))]
    pub metrics: MetricSeries,
}

/// One row of the per-day record table.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RecordData {
    #[cfg_attr(
        feature = "serde",
        serde(default, deserialize_with = "crate::de::lenient_string")
    )]
    pub id: String,
    #[cfg_attr(
        feature = "serde",
        serde(default, deserialize_with = "crate::de::lenient_string")
    )]
    pub node_id: String,
    #[cfg_attr(
        feature = "serde",
        serde(default, deserialize_with = "crate::de::lenient_f64")
    )]
    pub ec: f64,
    #[cfg_attr(
        feature = "serde",
        serde(default, deserialize_with = "crate::de::lenient_f64")
    )]
    pub temp: f64,
    #[cfg_attr(
        feature = "serde",
        serde(default, deserialize_with = "crate::de::lenient_f64")
    )]
    pub ph: f64,
    #[cfg_attr(
        feature = "serde",
        serde(default, deserialize_with = "crate::de::lenient_f64")
    )]
    pub turb: f64,
    #[cfg_attr(
        feature = "serde",
        serde(rename = "do", default, deserialize_with = "crate::de::lenient_f64")
    )]
    pub dissolved_oxygen: f64,
    #[cfg_attr(feature = "serde", serde(default))]
    pub created_at: Option<String>,
    /// Time of day label (`HH:MM`).
    #[cfg_attr(feature = "serde", serde(default))]
    pub time: Option<String>,
}

impl RecordData {
    /// Value of one metric.
    #[must_use]
    pub fn value(&self, metric: Metric) -> f64 {
        match metric {
            Metric::Temperature => self.temp,
            Metric::Ph => self.ph,
            Metric::Salinity => self.ec,
            Metric::Turbidity => self.turb,
            Metric::DissolvedOxygen => self.dissolved_oxygen,
        }
    }
}

/// Navigation links of a paginated response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Links {
    pub prev: Option<String>,
    pub next: Option<String>,
}

/// Pagination block of a list response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct Pagination {
    pub page: u32,
    pub per_page: u32,
    pub total_pages: u32,
    pub total_count: u64,
    #[cfg_attr(feature = "serde", serde(default))]
    pub links: Links,
}

/// Envelope wrapping every API response.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ApiResponse<T> {
    /// HTTP-like status code echoed by the backend.
    #[cfg_attr(feature = "serde", serde(default))]
    pub status: Option<u16>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub message: String,
    pub data: T,
    #[cfg_attr(feature = "serde", serde(default))]
    pub pagination: Option<Pagination>,
}

/// Parse an API timestamp.
///
/// Accepts RFC 3339 (`2025-01-31T08:00:00.000000Z`) and the SQL form
/// (`2025-01-31 08:00:00`, taken as UTC).
#[must_use]
pub fn parse_timestamp(raw: &str) -> Option<OffsetDateTime> {
    let raw = raw.trim();
    if let Ok(ts) = OffsetDateTime::parse(raw, &Rfc3339) {
        return Some(ts);
    }
    let sql = format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
    time::PrimitiveDateTime::parse(raw, sql)
        .ok()
        .map(|dt| dt.assume_utc())
}
