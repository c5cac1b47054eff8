//! Output formatting utilities for text, JSON, and CSV output.

use std::collections::BTreeMap;

use anyhow::Result;
use owo_colors::OwoColorize;
use serde::Serialize;
use tabled::builder::Builder;
use time::macros::format_description;
use tirta_types::{LatestData, Metric, NodeSeries, NodeSummary, RecordData, parse_timestamp};

use crate::cli::StyleMode;
use crate::style;

/// Formatting options for output.
#[derive(Debug, Clone, Copy)]
pub struct FormatOptions {
    /// Disable colored output.
    pub no_color: bool,
    /// Omit header row in CSV output.
    pub no_header: bool,
    /// Use compact JSON output (no pretty-printing).
    pub compact: bool,
    /// Visual styling mode.
    pub style: StyleMode,
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self {
            no_color: false,
            no_header: false,
            compact: false,
            style: StyleMode::Rich,
        }
    }
}

impl FormatOptions {
    pub fn new(no_color: bool, style: StyleMode) -> Self {
        // Plain mode automatically disables colors for pipe-friendliness
        let effective_no_color = no_color || style == StyleMode::Plain;
        Self {
            no_color: effective_no_color,
            no_header: false,
            compact: false,
            style,
        }
    }

    /// Check if plain styling is enabled (no decorations).
    pub fn is_plain(&self) -> bool {
        self.style == StyleMode::Plain
    }

    /// Create with no_header option for CSV output.
    pub fn with_no_header(mut self, no_header: bool) -> Self {
        self.no_header = no_header;
        self
    }

    /// Create with compact JSON option.
    pub fn with_compact(mut self, compact: bool) -> Self {
        self.compact = compact;
        self
    }

    /// Serialize value to JSON string, respecting compact option.
    pub fn as_json<T: serde::Serialize>(&self, value: &T) -> Result<String> {
        let json = if self.compact {
            serde_json::to_string(value)?
        } else {
            serde_json::to_string_pretty(value)?
        };
        Ok(json + "\n")
    }

    /// Metric value with its unit. Plain mode keeps to ASCII.
    #[must_use]
    pub fn format_metric(&self, metric: Metric, value: f64) -> String {
        let formatted = metric.format_value(value);
        if self.is_plain() {
            formatted.replace('°', "")
        } else {
            formatted
        }
    }
}

/// Escape a string for CSV output.
/// Wraps the value in quotes if it contains commas, quotes, or newlines.
/// Double quotes are escaped by doubling them.
#[must_use]
pub fn csv_escape(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') || s.contains('\r') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

/// Render an API timestamp as `YYYY-MM-DD HH:MM`, or return it unchanged.
#[must_use]
pub fn format_timestamp(raw: &str) -> String {
    parse_timestamp(raw)
        .and_then(|ts| {
            ts.format(format_description!("[year]-[month]-[day] [hour]:[minute]"))
                .ok()
        })
        .unwrap_or_else(|| raw.to_string())
}

/// Column header for a metric, with unit.
fn metric_header(metric: Metric) -> String {
    match metric.unit() {
        "" => metric.label().to_string(),
        unit => format!("{} ({})", metric.label(), unit),
    }
}

/// CSV column name for a metric.
fn metric_csv_header(metric: Metric) -> String {
    metric.label().to_lowercase().replace(' ', "_")
}

// ============================================================================
// Node formatting
// ============================================================================

#[derive(Serialize)]
struct ReadingJson {
    temperature: f64,
    ph: f64,
    salinity: f64,
    turbidity: f64,
    dissolved_oxygen: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    updated_at: Option<String>,
}

impl From<&LatestData> for ReadingJson {
    fn from(data: &LatestData) -> Self {
        Self {
            temperature: data.temp,
            ph: data.ph,
            salinity: data.ec,
            turbidity: data.turb,
            dissolved_oxygen: data.dissolved_oxygen,
            updated_at: data.updated_at.clone().or_else(|| data.created_at.clone()),
        }
    }
}

#[derive(Serialize)]
struct NodeJson<'a> {
    id: &'a str,
    name: &'a str,
    latitude: Option<f64>,
    longitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    updated_at: Option<&'a str>,
    latest: Option<ReadingJson>,
}

impl<'a> From<&'a NodeSummary> for NodeJson<'a> {
    fn from(node: &'a NodeSummary) -> Self {
        let coordinates = node.coordinates();
        Self {
            id: &node.id,
            name: &node.node,
            latitude: coordinates.map(|(lat, _)| lat),
            longitude: coordinates.map(|(_, long)| long),
            updated_at: node.updated_at.as_deref(),
            latest: node.latest_data.as_ref().map(ReadingJson::from),
        }
    }
}

/// Format a node list as a table with one row per node.
#[must_use]
pub fn format_nodes_text(nodes: &[NodeSummary], title: &str, opts: &FormatOptions) -> String {
    if nodes.is_empty() {
        return "No nodes found.\n".to_string();
    }

    let mut output = format!(
        "{}\n\n",
        style::format_title(&format!("{} ({})", title, nodes.len()), opts.no_color)
    );

    let mut builder = Builder::default();
    let mut header = vec!["ID".to_string(), "Node".to_string(), "Position".to_string()];
    header.extend(Metric::ALL.iter().map(|m| metric_header(*m)));
    builder.push_record(header);

    for node in nodes {
        let position = node
            .coordinates()
            .map(|(lat, long)| format!("{:.5}, {:.5}", lat, long))
            .unwrap_or_else(|| "-".to_string());
        let mut row = vec![node.id.clone(), node.node.clone(), position];
        match &node.latest_data {
            Some(data) => row.extend(Metric::ALL.iter().map(|m| format!("{:.2}", data.value(*m)))),
            None => row.extend(Metric::ALL.iter().map(|_| "-".to_string())),
        }
        builder.push_record(row);
    }

    let mut table = builder.build();
    style::apply_table_style(&mut table, opts.style);
    output.push_str(&table.to_string());
    output.push('\n');
    output
}

#[must_use]
pub fn format_nodes_csv(nodes: &[NodeSummary], opts: &FormatOptions) -> String {
    let mut output = if opts.no_header {
        String::new()
    } else {
        let metrics: Vec<String> = Metric::ALL.iter().map(|m| metric_csv_header(*m)).collect();
        format!("id,node,latitude,longitude,{},updated_at\n", metrics.join(","))
    };
    for node in nodes {
        let (lat, long) = node
            .coordinates()
            .map(|(lat, long)| (lat.to_string(), long.to_string()))
            .unwrap_or_default();
        let values: Vec<String> = match &node.latest_data {
            Some(data) => Metric::ALL
                .iter()
                .map(|m| format!("{:.2}", data.value(*m)))
                .collect(),
            None => Metric::ALL.iter().map(|_| String::new()).collect(),
        };
        let updated = node
            .latest_data
            .as_ref()
            .and_then(|d| d.updated_at.as_deref().or(d.created_at.as_deref()))
            .unwrap_or_default();
        output.push_str(&format!(
            "{},{},{},{},{},{}\n",
            csv_escape(&node.id),
            csv_escape(&node.node),
            lat,
            long,
            values.join(","),
            csv_escape(updated)
        ));
    }
    output
}

pub fn format_nodes_json(nodes: &[NodeSummary], opts: &FormatOptions) -> Result<String> {
    let nodes: Vec<NodeJson<'_>> = nodes.iter().map(NodeJson::from).collect();
    opts.as_json(&nodes)
}

/// Format one node with its latest reading.
#[must_use]
pub fn format_node_text(node: &NodeSummary, opts: &FormatOptions) -> String {
    let mut output = style::format_node_header(&node.node, opts.no_color);
    output.push('\n');
    output.push_str(&format!("  ID:        {}\n", node.id));
    match node.coordinates() {
        Some((lat, long)) => {
            output.push_str(&format!("  Position:  {:.5}, {:.5}\n", lat, long));
        }
        None => output.push_str("  Position:  unknown\n"),
    }

    match &node.latest_data {
        Some(data) => {
            if let Some(ts) = data.updated_at.as_deref().or(data.created_at.as_deref()) {
                output.push_str(&format!("  Updated:   {}\n", format_timestamp(ts)));
            }
            output.push('\n');
            for metric in Metric::ALL {
                let label = format!("{}:", metric.label());
                let value = opts.format_metric(metric, data.value(metric));
                let value = if opts.no_color {
                    value
                } else {
                    format!("{}", value.bold())
                };
                output.push_str(&format!("  {:<18} {}\n", label, value));
            }
        }
        None => output.push_str("\n  No readings yet.\n"),
    }
    output
}

#[must_use]
pub fn format_node_csv(node: &NodeSummary, opts: &FormatOptions) -> String {
    format_nodes_csv(std::slice::from_ref(node), opts)
}

pub fn format_node_json(node: &NodeSummary, opts: &FormatOptions) -> Result<String> {
    opts.as_json(&NodeJson::from(node))
}

// ============================================================================
// History formatting
// ============================================================================

/// Metrics to show: one when filtered, otherwise all.
fn selected_metrics(metric: Option<Metric>) -> Vec<Metric> {
    metric.map_or_else(|| Metric::ALL.to_vec(), |m| vec![m])
}

/// Format per-node series summaries.
#[must_use]
pub fn format_history_text(
    series: &[NodeSeries],
    metric: Option<Metric>,
    opts: &FormatOptions,
) -> String {
    if series.is_empty() {
        return "No history found.\n".to_string();
    }

    let metrics = selected_metrics(metric);
    let mut output = String::new();

    for node in series {
        output.push_str(&style::format_node_header(
            &format!("{} ({})", node.node, node.node_id),
            opts.no_color,
        ));
        output.push('\n');

        let timestamps = &node.metrics.timestamps;
        if let (Some(first), Some(last)) = (timestamps.first(), timestamps.last()) {
            output.push_str(&format!(
                "{} samples, {} to {}\n",
                node.metrics.len(),
                format_timestamp(first),
                format_timestamp(last)
            ));
        }

        let mut builder = Builder::default();
        builder.push_record(["Metric", "Count", "Min", "Max", "Mean", "Last"]);
        let mut rows = 0;
        for m in &metrics {
            if let Some(summary) = node.metrics.summary(*m) {
                builder.push_record([
                    metric_header(*m),
                    summary.count.to_string(),
                    format!("{:.2}", summary.min),
                    format!("{:.2}", summary.max),
                    format!("{:.2}", summary.mean),
                    format!("{:.2}", summary.last),
                ]);
                rows += 1;
            }
        }

        if rows == 0 {
            output.push_str("No samples in this window.\n\n");
            continue;
        }

        let mut table = builder.build();
        style::apply_table_style(&mut table, opts.style);
        output.push_str(&table.to_string());
        output.push_str("\n\n");
    }

    output
}

#[must_use]
pub fn format_history_csv(
    series: &[NodeSeries],
    metric: Option<Metric>,
    opts: &FormatOptions,
) -> String {
    let metrics = selected_metrics(metric);
    let mut output = if opts.no_header {
        String::new()
    } else {
        "node_id,node,metric,count,min,max,mean,last\n".to_string()
    };
    for node in series {
        for m in &metrics {
            if let Some(summary) = node.metrics.summary(*m) {
                output.push_str(&format!(
                    "{},{},{},{},{:.4},{:.4},{:.4},{:.4}\n",
                    csv_escape(&node.node_id),
                    csv_escape(&node.node),
                    m.key(),
                    summary.count,
                    summary.min,
                    summary.max,
                    summary.mean,
                    summary.last
                ));
            }
        }
    }
    output
}

pub fn format_history_json(
    series: &[NodeSeries],
    metric: Option<Metric>,
    opts: &FormatOptions,
) -> Result<String> {
    #[derive(Serialize)]
    struct SummaryJson {
        count: usize,
        min: f64,
        max: f64,
        mean: f64,
        last: f64,
        unit: &'static str,
    }

    #[derive(Serialize)]
    struct NodeHistoryJson<'a> {
        node_id: &'a str,
        node: &'a str,
        samples: usize,
        first: Option<&'a str>,
        last: Option<&'a str>,
        metrics: BTreeMap<&'static str, SummaryJson>,
    }

    let metrics = selected_metrics(metric);
    let nodes: Vec<NodeHistoryJson<'_>> = series
        .iter()
        .map(|node| NodeHistoryJson {
            node_id: &node.node_id,
            node: &node.node,
            samples: node.metrics.len(),
            first: node.metrics.timestamps.first().map(String::as_str),
            last: node.metrics.timestamps.last().map(String::as_str),
            metrics: metrics
                .iter()
                .filter_map(|m| {
                    node.metrics.summary(*m).map(|s| {
                        (
                            m.key(),
                            SummaryJson {
                                count: s.count,
                                min: s.min,
                                max: s.max,
                                mean: s.mean,
                                last: s.last,
                                unit: m.unit(),
                            },
                        )
                    })
                })
                .collect(),
        })
        .collect();

    opts.as_json(&nodes)
}

// ============================================================================
// Record formatting
// ============================================================================

fn record_time(record: &RecordData) -> String {
    record
        .time
        .as_deref()
        .or(record.created_at.as_deref())
        .map(format_timestamp)
        .unwrap_or_else(|| "-".to_string())
}

#[must_use]
pub fn format_records_text(records: &[RecordData], opts: &FormatOptions) -> String {
    if records.is_empty() {
        return "No records found.\n".to_string();
    }

    // Narrow terminals get fewer rows to avoid wrapping issues
    let max_records = if style::terminal_width() < 80 { 12 } else { 24 };

    let mut output = format!("Records ({}):\n\n", records.len());
    let mut builder = Builder::default();
    let mut header = vec!["Time".to_string()];
    header.extend(Metric::ALL.iter().map(|m| metric_header(*m)));
    builder.push_record(header);

    for record in records.iter().take(max_records) {
        let mut row = vec![record_time(record)];
        row.extend(Metric::ALL.iter().map(|m| format!("{:.2}", record.value(*m))));
        builder.push_record(row);
    }

    let mut table = builder.build();
    style::apply_table_style(&mut table, opts.style);
    output.push_str(&table.to_string());
    output.push('\n');

    if records.len() > max_records {
        output.push_str(&format!(
            "... and {} more records\n",
            records.len() - max_records
        ));
        output.push_str("(Use --format csv or --format json for full data)\n");
    }
    output
}

#[must_use]
pub fn format_records_csv(records: &[RecordData], opts: &FormatOptions) -> String {
    let mut output = if opts.no_header {
        String::new()
    } else {
        let metrics: Vec<String> = Metric::ALL.iter().map(|m| metric_csv_header(*m)).collect();
        format!("time,{}\n", metrics.join(","))
    };
    for record in records {
        let time = record
            .time
            .as_deref()
            .or(record.created_at.as_deref())
            .unwrap_or_default();
        let values: Vec<String> = Metric::ALL
            .iter()
            .map(|m| format!("{:.2}", record.value(*m)))
            .collect();
        output.push_str(&format!("{},{}\n", csv_escape(time), values.join(",")));
    }
    output
}

pub fn format_records_json(records: &[RecordData], opts: &FormatOptions) -> Result<String> {
    #[derive(Serialize)]
    struct RecordJson<'a> {
        time: Option<&'a str>,
        temperature: f64,
        ph: f64,
        salinity: f64,
        turbidity: f64,
        dissolved_oxygen: f64,
    }

    let records: Vec<RecordJson<'_>> = records
        .iter()
        .map(|r| RecordJson {
            time: r.time.as_deref().or(r.created_at.as_deref()),
            temperature: r.temp,
            ph: r.ph,
            salinity: r.ec,
            turbidity: r.turb,
            dissolved_oxygen: r.dissolved_oxygen,
        })
        .collect();
    opts.as_json(&records)
}
