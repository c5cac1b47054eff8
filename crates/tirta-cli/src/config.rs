//! Configuration file management.

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use tirta_core::CalibrationConfig;
use tirta_core::client::DEFAULT_REQUEST_TIMEOUT;

use crate::cli::{ConfigKey, OutputFormat};

/// Configuration file structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the monitoring API, including any `/api` prefix
    #[serde(default)]
    pub api_url: Option<String>,

    /// Bearer token
    #[serde(default)]
    pub token: Option<String>,

    /// Default output format
    #[serde(default)]
    pub format: Option<String>,

    /// Disable colored output
    #[serde(default)]
    pub no_color: bool,

    /// HTTP request timeout in seconds
    #[serde(default)]
    pub timeout: Option<u64>,

    /// Calibration workflow settings
    #[serde(default)]
    pub calibration: CalibrationSection,
}

/// The `[calibration]` table.
///
/// Unset values fall back to the library defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CalibrationSection {
    /// Seconds between status polls
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poll_interval_secs: Option<u64>,

    /// Seconds to wait for a result
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,

    /// Seconds between timeout checks
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tick_interval_secs: Option<u64>,
}

impl CalibrationSection {
    /// Build the controller configuration, letting command-line values win.
    pub fn resolve(&self, poll_interval: Option<u64>, timeout: Option<u64>) -> CalibrationConfig {
        let mut config = CalibrationConfig::default();
        if let Some(secs) = poll_interval.or(self.poll_interval_secs) {
            config = config.poll_interval(Duration::from_secs(secs));
        }
        if let Some(secs) = timeout.or(self.timeout_secs) {
            config = config.timeout(Duration::from_secs(secs));
        }
        if let Some(secs) = self.tick_interval_secs {
            config = config.tick_interval(Duration::from_secs(secs));
        }
        config
    }
}

impl Config {
    /// Get the config file path
    pub fn path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("tirta")
            .join("config.toml")
    }

    /// Load config from file, or return default if not found
    pub fn load() -> Self {
        let path = Self::path();
        if path.exists() {
            match fs::read_to_string(&path) {
                Ok(content) => match toml::from_str(&content) {
                    Ok(config) => return config,
                    Err(e) => {
                        eprintln!("Warning: Failed to parse config: {}", e);
                    }
                },
                Err(e) => {
                    eprintln!("Warning: Failed to read config: {}", e);
                }
            }
        }
        Self::default()
    }

    /// Save config to file
    pub fn save(&self) -> Result<()> {
        let path = Self::path();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(&path, content)
            .with_context(|| format!("Failed to write config: {}", path.display()))?;
        Ok(())
    }

    /// Current value of a key, rendered for display.
    pub fn get(&self, key: ConfigKey) -> Option<String> {
        match key {
            ConfigKey::ApiUrl => self.api_url.clone(),
            ConfigKey::Token => self.token.clone(),
            ConfigKey::Format => self.format.clone(),
            ConfigKey::Timeout => self.timeout.map(|t| t.to_string()),
            ConfigKey::NoColor => Some(self.no_color.to_string()),
            ConfigKey::PollInterval => self.calibration.poll_interval_secs.map(|t| t.to_string()),
            ConfigKey::CalibrationTimeout => self.calibration.timeout_secs.map(|t| t.to_string()),
        }
    }

    /// Set a key from its string form.
    pub fn set(&mut self, key: ConfigKey, value: &str) -> Result<()> {
        let value = value.trim();
        match key {
            ConfigKey::ApiUrl => {
                if !value.starts_with("http://") && !value.starts_with("https://") {
                    bail!("API URL must start with http:// or https://");
                }
                self.api_url = Some(value.to_string());
            }
            ConfigKey::Token => self.token = Some(value.to_string()),
            ConfigKey::Format => {
                let format = <OutputFormat as clap::ValueEnum>::from_str(value, true)
                    .map_err(|_| anyhow::anyhow!("Invalid format '{}'. Use text, json or csv", value))?;
                self.format = Some(format.as_str().to_string());
            }
            ConfigKey::Timeout => self.timeout = Some(parse_positive_secs(value)?),
            ConfigKey::NoColor => self.no_color = parse_bool(value)?,
            ConfigKey::PollInterval => {
                self.calibration.poll_interval_secs = Some(parse_positive_secs(value)?)
            }
            ConfigKey::CalibrationTimeout => {
                self.calibration.timeout_secs = Some(parse_positive_secs(value)?)
            }
        }
        Ok(())
    }

    /// Remove a key, restoring its default.
    pub fn unset(&mut self, key: ConfigKey) {
        match key {
            ConfigKey::ApiUrl => self.api_url = None,
            ConfigKey::Token => self.token = None,
            ConfigKey::Format => self.format = None,
            ConfigKey::Timeout => self.timeout = None,
            ConfigKey::NoColor => self.no_color = false,
            ConfigKey::PollInterval => self.calibration.poll_interval_secs = None,
            ConfigKey::CalibrationTimeout => self.calibration.timeout_secs = None,
        }
    }

    /// Configured default output format, if it parses.
    pub fn default_format(&self) -> Option<OutputFormat> {
        self.format
            .as_deref()
            .and_then(|f| <OutputFormat as clap::ValueEnum>::from_str(f, true).ok())
    }
}

fn parse_positive_secs(value: &str) -> Result<u64> {
    match value.parse::<u64>() {
        Ok(0) => bail!("Value must be at least 1 second"),
        Ok(secs) => Ok(secs),
        Err(_) => bail!("'{}' is not a valid number of seconds", value),
    }
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.to_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        _ => bail!(
            "Invalid boolean value '{}'. Use: true/false, yes/no, on/off, 1/0",
            value
        ),
    }
}

/// Resolve the API URL from the flag or environment, then the config file.
pub fn resolve_api_url(arg: Option<String>, config: &Config) -> Option<String> {
    arg.filter(|s| !s.trim().is_empty())
        .or_else(|| config.api_url.clone())
}

/// Resolve the bearer token from the flag or environment, then the config file.
pub fn resolve_token(arg: Option<String>, config: &Config) -> Option<String> {
    arg.filter(|s| !s.trim().is_empty())
        .or_else(|| config.token.clone())
}

/// Resolve the HTTP timeout: flag, then config, then the library default.
pub fn resolve_timeout(arg: Option<u64>, config: &Config) -> Duration {
    arg.or(config.timeout)
        .map(Duration::from_secs)
        .unwrap_or(DEFAULT_REQUEST_TIMEOUT)
}

/// Resolve the output format: `--json`, then `--format`, then config, then text.
pub fn resolve_format(json: bool, arg: Option<OutputFormat>, config: &Config) -> OutputFormat {
    if json {
        OutputFormat::Json
    } else {
        arg.or_else(|| config.default_format()).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tirta_core::calibration::{DEFAULT_POLL_INTERVAL, DEFAULT_TIMEOUT};

    #[test]
    fn test_resolve_api_url_prefers_arg() {
        let config = Config {
            api_url: Some("https://config.example/api".to_string()),
            ..Default::default()
        };
        let result = resolve_api_url(Some("https://arg.example/api".to_string()), &config);
        assert_eq!(result.as_deref(), Some("https://arg.example/api"));
    }

    #[test]
    fn test_resolve_api_url_falls_back_to_config() {
        let config = Config {
            api_url: Some("https://config.example/api".to_string()),
            ..Default::default()
        };
        assert_eq!(
            resolve_api_url(None, &config).as_deref(),
            Some("https://config.example/api")
        );
        assert_eq!(
            resolve_api_url(Some("  ".to_string()), &config).as_deref(),
            Some("https://config.example/api")
        );
    }

    #[test]
    fn test_resolve_api_url_none_when_both_empty() {
        assert_eq!(resolve_api_url(None, &Config::default()), None);
    }

    #[test]
    fn test_resolve_timeout_order() {
        let config = Config {
            timeout: Some(20),
            ..Default::default()
        };
        assert_eq!(resolve_timeout(Some(5), &config), Duration::from_secs(5));
        assert_eq!(resolve_timeout(None, &config), Duration::from_secs(20));
        assert_eq!(
            resolve_timeout(None, &Config::default()),
            DEFAULT_REQUEST_TIMEOUT
        );
    }

    #[test]
    fn test_resolve_format() {
        let config = Config {
            format: Some("csv".to_string()),
            ..Default::default()
        };
        assert_eq!(resolve_format(true, None, &config), OutputFormat::Json);
        assert_eq!(
            resolve_format(false, Some(OutputFormat::Text), &config),
            OutputFormat::Text
        );
        assert_eq!(resolve_format(false, None, &config), OutputFormat::Csv);
        assert_eq!(
            resolve_format(false, None, &Config::default()),
            OutputFormat::Text
        );
    }

    #[test]
    fn test_calibration_section_defaults() {
        let config = CalibrationSection::default().resolve(None, None);
        assert_eq!(config.poll_interval, DEFAULT_POLL_INTERVAL);
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
    }

    #[test]
    fn test_calibration_section_args_win() {
        let section = CalibrationSection {
            poll_interval_secs: Some(5),
            timeout_secs: Some(90),
            tick_interval_secs: None,
        };
        let config = section.resolve(None, Some(30));
        assert_eq!(config.poll_interval, Duration::from_secs(5));
        assert_eq!(config.timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_set_get_unset() {
        let mut config = Config::default();
        config.set(ConfigKey::ApiUrl, "https://x.example/api").unwrap();
        config.set(ConfigKey::Format, "JSON").unwrap();
        config.set(ConfigKey::NoColor, "yes").unwrap();
        config.set(ConfigKey::PollInterval, "5").unwrap();

        assert_eq!(
            config.get(ConfigKey::ApiUrl).as_deref(),
            Some("https://x.example/api")
        );
        assert_eq!(config.get(ConfigKey::Format).as_deref(), Some("json"));
        assert_eq!(config.get(ConfigKey::NoColor).as_deref(), Some("true"));
        assert_eq!(config.get(ConfigKey::PollInterval).as_deref(), Some("5"));

        config.unset(ConfigKey::PollInterval);
        assert_eq!(config.get(ConfigKey::PollInterval), None);
    }

    #[test]
    fn test_set_rejects_bad_values() {
        let mut config = Config::default();
        assert!(config.set(ConfigKey::ApiUrl, "ftp://x").is_err());
        assert!(config.set(ConfigKey::Format, "xml").is_err());
        assert!(config.set(ConfigKey::Timeout, "0").is_err());
        assert!(config.set(ConfigKey::NoColor, "maybe").is_err());
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_config_toml_round_trip_with_calibration_table() {
        let toml_str = r#"
api_url = "https://monitoring.example.org/api"
format = "json"

[calibration]
poll_interval_secs = 3
timeout_secs = 30
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.calibration.timeout_secs, Some(30));
        assert_eq!(config.default_format(), Some(OutputFormat::Json));
        assert!(!config.no_color);

        let written = toml::to_string_pretty(&config).unwrap();
        assert!(written.contains("[calibration]"));
        assert!(written.contains("timeout_secs = 30"));
    }
}
