//! Config command implementation.
//!
//! Reads and edits `config.toml`; see [`Config::path`] for its location.

use anyhow::{Result, bail};
use tabled::builder::Builder;

use crate::cli::{ConfigAction, ConfigKey, StyleMode};
use crate::config::Config;
use crate::style;

const KEYS: [(ConfigKey, &str); 7] = [
    (ConfigKey::ApiUrl, "api-url"),
    (ConfigKey::Token, "token"),
    (ConfigKey::Format, "format"),
    (ConfigKey::Timeout, "timeout"),
    (ConfigKey::NoColor, "no-color"),
    (ConfigKey::PollInterval, "poll-interval"),
    (ConfigKey::CalibrationTimeout, "calibration-timeout"),
];

/// Display form of a value; the token is never echoed in full.
fn display_value(key: ConfigKey, value: Option<String>) -> String {
    match (key, value) {
        (_, None) => "(not set)".to_string(),
        (ConfigKey::Token, Some(token)) => mask_token(&token),
        (_, Some(value)) => value,
    }
}

fn mask_token(token: &str) -> String {
    let count = token.chars().count();
    if count <= 8 {
        return "****".to_string();
    }
    let tail: String = token.chars().skip(count - 4).collect();
    format!("****{}", tail)
}

fn render_table(config: &Config, style_mode: StyleMode) -> String {
    let mut builder = Builder::default();
    builder.push_record(["Key", "Value"]);
    for (key, name) in KEYS {
        builder.push_record([name.to_string(), display_value(key, config.get(key))]);
    }
    let mut table = builder.build();
    style::apply_table_style(&mut table, style_mode);
    table.to_string()
}

pub fn cmd_config(
    action: ConfigAction,
    quiet: bool,
    style_mode: StyleMode,
    no_color: bool,
) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let config = Config::load();
            println!("{}", render_table(&config, style_mode));
            if !quiet {
                println!();
                println!("File: {}", Config::path().display());
            }
        }
        ConfigAction::Get { key } => {
            let config = Config::load();
            match config.get(key) {
                Some(value) => println!("{}", value),
                None => bail!("{} is not set", key_name(key)),
            }
        }
        ConfigAction::Set { key, value } => {
            let mut config = Config::load();
            config.set(key, &value)?;
            config.save()?;
            if !quiet {
                let shown = display_value(key, config.get(key));
                eprintln!(
                    "{}",
                    style::format_success(&format!("Set {} = {}", key_name(key), shown), no_color)
                );
            }
        }
        ConfigAction::Unset { key } => {
            let mut config = Config::load();
            config.unset(key);
            config.save()?;
            if !quiet {
                eprintln!(
                    "{}",
                    style::format_success(&format!("Removed {}", key_name(key)), no_color)
                );
            }
        }
        ConfigAction::Path => {
            println!("{}", Config::path().display());
        }
        ConfigAction::Init => {
            let path = Config::path();
            if path.exists() {
                bail!("Config file already exists: {}", path.display());
            }
            Config::default().save()?;
            if !quiet {
                eprintln!(
                    "{}",
                    style::format_success(
                        &format!("Created config file: {}", path.display()),
                        no_color
                    )
                );
                eprintln!(
                    "{}",
                    style::format_info("Next: tirta config set api-url <URL>", no_color)
                );
            }
        }
    }
    Ok(())
}

fn key_name(key: ConfigKey) -> &'static str {
    KEYS.iter()
        .find(|(k, _)| *k == key)
        .map(|(_, name)| *name)
        .unwrap_or("key")
}
