//! Visual styling utilities for the CLI.
//!
//! This module provides consistent styling across all CLI output including:
//! - Spinners for long-running operations
//! - Colored command status labels
//! - Table formatting
//! - Success, warning and error lines

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use tirta_core::CommandStatus;

use crate::cli::StyleMode;

// ============================================================================
// Progress Indicators
// ============================================================================

/// Standard spinner tick characters (Braille dots animation)
const SPINNER_TICK_CHARS: &str = "⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏";

/// Standard spinner tick interval
const SPINNER_TICK_MS: u64 = 80;

/// Get the standard spinner style.
fn spinner_style() -> ProgressStyle {
    ProgressStyle::default_spinner()
        .template("{spinner:.cyan} {msg} {elapsed:.dim}")
        .expect("valid template")
        .tick_chars(SPINNER_TICK_CHARS)
}

/// Create a spinner for generic operations.
pub fn operation_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(spinner_style());
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(SPINNER_TICK_MS));
    pb
}

/// Create a spinner for a request to the monitoring API.
pub fn fetching_spinner(what: &str) -> ProgressBar {
    operation_spinner(&format!("Fetching {}...", what))
}

// ============================================================================
// Status Labels
// ============================================================================

/// Label for a reported command status.
pub fn format_command_status(status: CommandStatus, no_color: bool) -> String {
    let label = status.to_string().to_uppercase();
    if no_color {
        return format!("[{}]", label);
    }
    match status {
        CommandStatus::Done => format!("[{}]", label.green()),
        CommandStatus::Failed => format!("[{}]", label.red()),
        CommandStatus::Pending => format!("[{}]", label.yellow()),
    }
}

// ============================================================================
// Message Lines
// ============================================================================

/// Format a success message.
pub fn format_success(message: &str, no_color: bool) -> String {
    if no_color {
        format!("[OK] {}", message)
    } else {
        format!("{} {}", "[OK]".green(), message)
    }
}

/// Format an info message.
pub fn format_info(message: &str, no_color: bool) -> String {
    if no_color {
        format!("[--] {}", message)
    } else {
        format!("{} {}", "[--]".cyan(), message)
    }
}

/// Format a warning message.
pub fn format_warning(message: &str, no_color: bool) -> String {
    if no_color {
        format!("[!!] {}", message)
    } else {
        format!("{} {}", "[!!]".yellow(), message)
    }
}

/// Format an error message.
pub fn format_error(message: &str, no_color: bool) -> String {
    if no_color {
        format!("[XX] {}", message)
    } else {
        format!("{} {}", "[XX]".red(), message)
    }
}

// ============================================================================
// Section Headers
// ============================================================================

/// Format a section header with a node name.
pub fn format_node_header(name: &str, no_color: bool) -> String {
    let line = "─".repeat(40);
    if no_color {
        format!("── {} {}", name, line)
    } else {
        format!("── {} {}", name.cyan(), line.dimmed())
    }
}

/// Format a title header.
pub fn format_title(title: &str, no_color: bool) -> String {
    if no_color {
        format!("{}\n{}", title, "━".repeat(title.chars().count()))
    } else {
        format!(
            "{}\n{}",
            title.bold(),
            "━".repeat(title.chars().count()).dimmed()
        )
    }
}

// ============================================================================
// Tables
// ============================================================================

/// Get terminal width, defaulting to 80 if detection fails.
pub fn terminal_width() -> usize {
    terminal_size::terminal_size()
        .map(|(w, _)| w.0 as usize)
        .unwrap_or(80)
}

/// Apply table style based on StyleMode.
pub fn apply_table_style(table: &mut tabled::Table, style: StyleMode) {
    use tabled::settings::Style;
    match style {
        StyleMode::Rich => {
            table.with(Style::rounded());
        }
        StyleMode::Minimal => {
            table.with(Style::psql());
        }
        StyleMode::Plain => {
            table.with(Style::blank());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_command_status_no_color() {
        assert_eq!(format_command_status(CommandStatus::Done, true), "[DONE]");
        assert_eq!(
            format_command_status(CommandStatus::Pending, true),
            "[PENDING]"
        );
    }

    #[test]
    fn test_message_prefixes() {
        assert_eq!(format_success("saved", true), "[OK] saved");
        assert_eq!(format_warning("slow", true), "[!!] slow");
        assert_eq!(format_error("boom", true), "[XX] boom");
        assert_eq!(format_info("note", true), "[--] note");
    }

    #[test]
    fn test_format_title_underline_matches_width() {
        let title = format_title("Nodes", true);
        assert_eq!(title, "Nodes\n━━━━━");
    }
}
