//! Calibrate command implementation.
//!
//! Drives a [`CalibrationController`] from the terminal: pick a sensor,
//! confirm, then follow the controller's events on a spinner until the node
//! reports an outcome, the timeout elapses or the operator presses Ctrl-C.

use std::io::{self, IsTerminal};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use dialoguer::{Confirm, Select, theme::ColorfulTheme};
use indicatif::ProgressBar;
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;
use tokio::time::Instant;
use tracing::debug;

use tirta_core::{
    CalibrationConfig, CalibrationController, CalibrationEvent, CalibrationHandle,
    CalibrationOutcome, CalibrationSnapshot, CommandApi, EventReceiver, NodeApi, NodeTarget,
    SensorKind,
};

use crate::cli::OutputFormat;
use crate::format::{FormatOptions, csv_escape};
use crate::style;
use crate::util::{fetch, format_duration, write_output};

/// Exit status after Ctrl-C, as shells report it.
const EXIT_INTERRUPTED: u8 = 130;

/// How a calibration run ended, for the process exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationExit {
    Succeeded,
    Failed,
    /// The user answered no at the confirmation prompt.
    Declined,
    /// Interrupted with Ctrl-C.
    Cancelled,
}

impl CalibrationExit {
    fn as_str(&self) -> &'static str {
        match self {
            CalibrationExit::Succeeded => "succeeded",
            CalibrationExit::Failed => "failed",
            CalibrationExit::Declined => "declined",
            CalibrationExit::Cancelled => "cancelled",
        }
    }

    pub fn exit_code(self) -> ExitCode {
        match self {
            CalibrationExit::Succeeded | CalibrationExit::Declined => ExitCode::SUCCESS,
            CalibrationExit::Failed => ExitCode::FAILURE,
            CalibrationExit::Cancelled => ExitCode::from(EXIT_INTERRUPTED),
        }
    }
}

/// Arguments for the calibrate command.
pub struct CalibrateArgs<'a> {
    pub node: String,
    pub name: Option<String>,
    pub sensor: Option<SensorKind>,
    pub config: CalibrationConfig,
    pub yes: bool,
    pub quiet: bool,
    pub format: OutputFormat,
    pub output: Option<&'a PathBuf>,
    pub opts: &'a FormatOptions,
}

pub async fn cmd_calibrate(
    commands: Arc<dyn CommandApi>,
    nodes: &dyn NodeApi,
    args: CalibrateArgs<'_>,
) -> Result<CalibrationExit> {
    let interactive = io::stdin().is_terminal() && io::stderr().is_terminal();
    if !args.yes && !interactive {
        bail!("Calibration needs confirmation. Pass --yes to run it without a terminal.");
    }
    if args.sensor.is_none() && !interactive {
        bail!("No sensor given. Use --sensor <ph|ec|do|turb>.");
    }

    let target = resolve_target(nodes, &args).await;
    let handle = CalibrationController::spawn(commands, args.config.clone())
        .context("Invalid calibration settings")?;

    let result = run(&handle, target, &args, interactive).await;
    handle.shutdown().await?;
    result
}

/// Look up the display name unless one was given. Falls back to the id.
async fn resolve_target(nodes: &dyn NodeApi, args: &CalibrateArgs<'_>) -> NodeTarget {
    if let Some(name) = &args.name {
        return NodeTarget::new(args.node.clone(), name.clone());
    }

    let show_progress = !args.quiet && matches!(args.format, OutputFormat::Text);
    match fetch(&format!("node {}", args.node), show_progress, || {
        nodes.node(&args.node)
    })
    .await
    {
        Ok(node) if !node.node.trim().is_empty() => NodeTarget::new(args.node.clone(), node.node),
        Ok(_) => NodeTarget::new(args.node.clone(), args.node.clone()),
        Err(e) => {
            debug!(error = %e, "Node lookup failed");
            if !args.quiet {
                eprintln!(
                    "{}",
                    style::format_warning(
                        &format!("Could not look up node {}; using its id as the name", args.node),
                        args.opts.no_color
                    )
                );
            }
            NodeTarget::new(args.node.clone(), args.node.clone())
        }
    }
}

async fn run(
    handle: &CalibrationHandle,
    target: NodeTarget,
    args: &CalibrateArgs<'_>,
    interactive: bool,
) -> Result<CalibrationExit> {
    handle.open(target.clone()).await?;

    let mut preset = args.sensor;
    let mut previous = args.sensor;
    loop {
        let kind = match preset.take() {
            Some(kind) => kind,
            None => prompt_sensor(previous)?,
        };
        previous = Some(kind);
        handle.select(kind).await?;

        if !args.yes && !prompt_confirm(&format!("Calibrate the {} on {}?", kind, target))? {
            handle.cancel().await?;
            report(handle.snapshot(), &target, kind, CalibrationExit::Declined, None, args)?;
            return Ok(CalibrationExit::Declined);
        }

        let mut events = handle.events();
        handle.confirm().await?;
        let started = Instant::now();

        let spinner = (!args.quiet
            && matches!(args.format, OutputFormat::Text)
            && io::stderr().is_terminal())
        .then(|| style::operation_spinner(&format!("Sending {}...", kind.command())));
        let outcome = follow(handle, &mut events, spinner.as_ref(), args.opts.no_color).await;
        if let Some(sp) = &spinner {
            sp.finish_and_clear();
        }

        let snapshot = handle.snapshot();
        let elapsed = started.elapsed();
        let Some(outcome) = outcome? else {
            handle.cancel().await?;
            report(snapshot, &target, kind, CalibrationExit::Cancelled, Some(elapsed), args)?;
            return Ok(CalibrationExit::Cancelled);
        };

        if outcome.is_success() {
            report(snapshot, &target, kind, CalibrationExit::Succeeded, Some(elapsed), args)?;
            return Ok(CalibrationExit::Succeeded);
        }
        report(snapshot, &target, kind, CalibrationExit::Failed, Some(elapsed), args)?;

        if args.yes || !interactive || !prompt_confirm("Try again?")? {
            return Ok(CalibrationExit::Failed);
        }
        handle.retry().await?;
    }
}

/// Follow progress until an outcome. `None` means the operator hit Ctrl-C.
async fn follow(
    handle: &CalibrationHandle,
    events: &mut EventReceiver,
    spinner: Option<&ProgressBar>,
    no_color: bool,
) -> Result<Option<CalibrationOutcome>> {
    let outcome = handle.wait_for_outcome();
    tokio::pin!(outcome);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut events_open = true;

    loop {
        tokio::select! {
            biased;
            _ = &mut ctrl_c => return Ok(None),
            result = &mut outcome => return Ok(Some(result?)),
            event = events.recv(), if events_open => match event {
                Ok(event) => {
                    debug!(?event, "Calibration event");
                    if let (Some(sp), Some(message)) = (spinner, progress_message(&event, no_color)) {
                        sp.set_message(message);
                    }
                }
                Err(RecvError::Lagged(skipped)) => debug!(skipped, "Calibration events lagged"),
                Err(RecvError::Closed) => events_open = false,
            },
        }
    }
}

fn progress_message(event: &CalibrationEvent, no_color: bool) -> Option<String> {
    match event {
        CalibrationEvent::Dispatched { command, .. } => Some(format!("Sending {}...", command)),
        CalibrationEvent::Accepted { command_id, .. } => Some(format!(
            "Command {} accepted, waiting for the node...",
            command_id
        )),
        CalibrationEvent::StatusPolled { status, .. } => Some(format!(
            "Waiting for the node {}",
            style::format_command_status(*status, no_color)
        )),
        CalibrationEvent::PollMissed { .. } => {
            Some("Status check failed, trying again...".to_string())
        }
        _ => None,
    }
}

fn prompt_sensor(default: Option<SensorKind>) -> Result<SensorKind> {
    let items: Vec<String> = SensorKind::ALL
        .iter()
        .map(|k| format!("{} ({})", k.label(), k.code()))
        .collect();
    let default = default
        .and_then(|d| SensorKind::ALL.iter().position(|k| *k == d))
        .unwrap_or(0);

    let selection = Select::with_theme(&ColorfulTheme::default())
        .with_prompt("Select a sensor to calibrate")
        .items(&items)
        .default(default)
        .interact()
        .context("Failed to get user selection")?;

    Ok(SensorKind::ALL[selection])
}

fn prompt_confirm(prompt: &str) -> Result<bool> {
    Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt(prompt)
        .default(false)
        .interact()
        .context("Failed to get user confirmation")
}

#[derive(Debug, Serialize)]
struct CalibrationReport<'a> {
    node_id: &'a str,
    node: &'a str,
    sensor: &'static str,
    command: &'static str,
    command_id: Option<&'a str>,
    outcome: &'static str,
    reason: Option<String>,
    polls: u32,
    missed_polls: u32,
    elapsed_secs: Option<f64>,
}

fn report(
    snapshot: CalibrationSnapshot,
    target: &NodeTarget,
    kind: SensorKind,
    exit: CalibrationExit,
    elapsed: Option<std::time::Duration>,
    args: &CalibrateArgs<'_>,
) -> Result<()> {
    let reason = snapshot
        .outcome
        .as_ref()
        .and_then(|o| o.failure())
        .map(ToString::to_string);
    let report = CalibrationReport {
        node_id: &target.node_id,
        node: &target.name,
        sensor: kind.code(),
        command: kind.command(),
        command_id: snapshot.command_id.as_deref(),
        outcome: exit.as_str(),
        reason,
        polls: snapshot.polls,
        missed_polls: snapshot.missed_polls,
        elapsed_secs: elapsed.map(|d| d.as_secs_f64()),
    };

    let content = match args.format {
        OutputFormat::Json => args.opts.as_json(&report)?,
        OutputFormat::Csv => report_csv(&report, args.opts.no_header),
        OutputFormat::Text => {
            report_text(&report, exit, kind, target, elapsed, args.opts.no_color)
        }
    };
    write_output(args.output, &content)
}

fn report_csv(report: &CalibrationReport<'_>, no_header: bool) -> String {
    let mut output = if no_header {
        String::new()
    } else {
        "node_id,node,sensor,command_id,outcome,polls,missed_polls,elapsed_secs\n".to_string()
    };
    output.push_str(&format!(
        "{},{},{},{},{},{},{},{}\n",
        csv_escape(report.node_id),
        csv_escape(report.node),
        report.sensor,
        csv_escape(report.command_id.unwrap_or_default()),
        report.outcome,
        report.polls,
        report.missed_polls,
        report
            .elapsed_secs
            .map(|s| format!("{:.1}", s))
            .unwrap_or_default()
    ));
    output
}

fn report_text(
    report: &CalibrationReport<'_>,
    exit: CalibrationExit,
    kind: SensorKind,
    target: &NodeTarget,
    elapsed: Option<std::time::Duration>,
    no_color: bool,
) -> String {
    let took = elapsed.map(format_duration).unwrap_or_else(|| "-".to_string());
    let mut line = match exit {
        CalibrationExit::Succeeded => style::format_success(
            &format!("{} on {} calibrated in {}", kind, target, took),
            no_color,
        ),
        CalibrationExit::Failed => style::format_error(
            &format!(
                "Calibration of the {} on {} failed: {}",
                kind,
                target,
                report.reason.as_deref().unwrap_or("unknown error")
            ),
            no_color,
        ),
        CalibrationExit::Declined => style::format_warning(
            &format!("Calibration of the {} on {} not started", kind, target),
            no_color,
        ),
        CalibrationExit::Cancelled => style::format_warning("Calibration cancelled", no_color),
    };
    line.push('\n');

    if let Some(id) = report.command_id {
        let mut detail = format!("Command {}, {} status checks", id, report.polls);
        if report.missed_polls > 0 {
            detail.push_str(&format!(" ({} failed)", report.missed_polls));
        }
        line.push_str(&style::format_info(&detail, no_color));
        line.push('\n');
    }
    line
}
