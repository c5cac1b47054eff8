//! CLI argument definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use time::Time;
use tirta_types::{Metric, SensorKind, parse_metric_value, parse_time};

/// Output format for commands
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    Csv,
}

impl OutputFormat {
    /// Name used in the config file.
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Text => "text",
            OutputFormat::Json => "json",
            OutputFormat::Csv => "csv",
        }
    }
}

/// Visual styling mode for output
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum StyleMode {
    /// Standard styling with colors
    Minimal,
    /// Rich styling with tables and full formatting (default)
    #[default]
    Rich,
    /// Plain text with no decorations (for scripting)
    Plain,
}

/// Reusable output format arguments
#[derive(Debug, Clone, Args)]
pub struct OutputArgs {
    /// Output format (defaults to the configured format, then text)
    #[arg(short, long, value_enum)]
    pub format: Option<OutputFormat>,

    /// Omit header row in CSV output (useful for appending)
    #[arg(long)]
    pub no_header: bool,
}

/// Node form fields shared by `register` and `update`.
#[derive(Debug, Clone, Args)]
pub struct NodeFormArgs {
    /// Node identifier
    #[arg(long = "node-id")]
    pub node_id: String,

    /// Latitude in decimal degrees
    #[arg(long, allow_hyphen_values = true)]
    pub lat: String,

    /// Longitude in decimal degrees
    #[arg(long, allow_hyphen_values = true)]
    pub long: String,

    /// Temperature reading
    #[arg(long, value_parser = parse_metric_arg, default_value = "0")]
    pub temp: f64,

    /// pH reading
    #[arg(long, value_parser = parse_metric_arg, default_value = "0")]
    pub ph: f64,

    /// Salinity (conductivity) reading
    #[arg(long, value_parser = parse_metric_arg, default_value = "0")]
    pub ec: f64,

    /// Turbidity reading
    #[arg(long, value_parser = parse_metric_arg, default_value = "0")]
    pub turb: f64,

    /// Dissolved oxygen reading
    #[arg(long = "do", value_parser = parse_metric_arg, default_value = "0")]
    pub dissolved_oxygen: f64,
}

#[derive(Parser)]
#[command(name = "tirta")]
#[command(author, version, about = "CLI for water-quality monitoring nodes", long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Output as JSON (shorthand for --format json)
    #[arg(long, global = true)]
    pub json: bool,

    /// Output compact JSON (no pretty-printing)
    #[arg(long, global = true)]
    pub compact: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    pub no_color: bool,

    /// Visual styling mode (minimal, rich, plain)
    #[arg(
        long,
        global = true,
        value_enum,
        default_value = "rich",
        env = "TIRTA_STYLE"
    )]
    pub style: StyleMode,

    /// Base URL of the monitoring API, including its path prefix
    #[arg(long, global = true, env = "TIRTA_API_URL")]
    pub api_url: Option<String>,

    /// Bearer token for the monitoring API
    #[arg(long, global = true, env = "TIRTA_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// HTTP request timeout in seconds
    #[arg(short = 'T', long, global = true, value_parser = parse_secs)]
    pub request_timeout: Option<u64>,

    /// Write output to file instead of stdout
    #[arg(short, long, global = true)]
    pub output: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List all nodes with their latest readings
    Nodes {
        #[command(flatten)]
        output: OutputArgs,
    },

    /// Show node positions with their latest readings
    Map {
        #[command(flatten)]
        output: OutputArgs,
    },

    /// Show one node and its latest reading
    Node {
        /// Node identifier
        id: String,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Summarize measurement series per node
    History {
        /// Start of the time window (HH:MM)
        #[arg(long, value_parser = parse_time_arg)]
        start: Option<Time>,

        /// End of the time window (HH:MM)
        #[arg(long, value_parser = parse_time_arg)]
        end: Option<Time>,

        /// Restrict to these nodes (repeatable, or comma-separated)
        #[arg(short, long = "node", value_delimiter = ',')]
        nodes: Vec<String>,

        /// Only show this metric
        #[arg(short, long, value_parser = parse_metric_kind)]
        metric: Option<Metric>,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Show a node's per-day records
    Records {
        /// Node identifier
        id: String,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Register a new node
    Register {
        #[command(flatten)]
        form: NodeFormArgs,
    },

    /// Update an existing node
    Update {
        /// Identifier of the node to update
        id: String,

        #[command(flatten)]
        form: NodeFormArgs,
    },

    /// Calibrate a sensor on a node
    Calibrate {
        /// Node identifier
        #[arg(short, long)]
        node: String,

        /// Node display name (looked up from the API when omitted)
        #[arg(long)]
        name: Option<String>,

        /// Sensor to calibrate (ph, ec, do, turb); prompts when omitted
        #[arg(short, long, value_parser = parse_sensor_kind)]
        sensor: Option<SensorKind>,

        /// Seconds between status polls
        #[arg(long, value_parser = parse_secs)]
        poll_interval: Option<u64>,

        /// Seconds to wait for a result before giving up
        #[arg(long, value_parser = parse_secs)]
        timeout: Option<u64>,

        /// Skip the confirmation prompt and never offer a retry
        #[arg(short, long)]
        yes: bool,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

/// Parse a sensor kind in either vocabulary.
fn parse_sensor_kind(s: &str) -> Result<SensorKind, String> {
    s.parse()
        .map_err(|_| format!("Unknown sensor '{}'. Valid values: ph, ec, do, turb", s))
}

/// Parse a metric name.
fn parse_metric_kind(s: &str) -> Result<Metric, String> {
    s.parse().map_err(|_| {
        format!(
            "Unknown metric '{}'. Valid values: temp, ph, ec, turb, do",
            s
        )
    })
}

/// Parse an `HH:MM` time of day.
fn parse_time_arg(s: &str) -> Result<Time, String> {
    parse_time(s).map_err(|e| e.to_string())
}

/// Parse a metric value; blank counts as zero.
fn parse_metric_arg(s: &str) -> Result<f64, String> {
    parse_metric_value(s).map_err(|e| e.to_string())
}

/// Parse a positive number of seconds.
fn parse_secs(s: &str) -> Result<u64, String> {
    let secs: u64 = s
        .parse()
        .map_err(|_| format!("'{}' is not a valid number", s))?;
    if secs == 0 {
        return Err("Value must be at least 1 second".to_string());
    }
    Ok(secs)
}

/// Configuration keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ConfigKey {
    /// Base URL of the monitoring API
    ApiUrl,
    /// Bearer token
    Token,
    /// Default output format
    Format,
    /// HTTP request timeout in seconds
    Timeout,
    /// Disable colored output
    NoColor,
    /// Seconds between calibration status polls
    PollInterval,
    /// Seconds to wait for a calibration result
    CalibrationTimeout,
}

/// Configuration subcommands
#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Get a configuration value
    Get {
        /// Configuration key
        #[arg(value_enum)]
        key: ConfigKey,
    },

    /// Set a configuration value
    Set {
        /// Configuration key
        #[arg(value_enum)]
        key: ConfigKey,
        /// Configuration value
        value: String,
    },

    /// Unset (remove) a configuration value
    Unset {
        /// Configuration key to remove
        #[arg(value_enum)]
        key: ConfigKey,
    },

    /// Show configuration file path
    Path,

    /// Initialize default configuration
    Init,
}
