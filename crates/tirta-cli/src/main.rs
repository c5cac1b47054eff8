//! Command-line interface for water-quality monitoring nodes.
//!
//! Lists nodes and their measurements from the monitoring API, registers
//! and updates nodes, and runs remote sensor calibration.

mod cli;
mod commands;
mod config;
mod format;
mod style;
mod util;

use std::io;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands, OutputArgs};
use crate::commands::{
    CalibrateArgs, HistoryArgs, NodeListing, cmd_calibrate, cmd_config,
    cmd_history, cmd_node, cmd_nodes, cmd_records, cmd_register,
};
use crate::config::{Config, resolve_format};
use crate::format::FormatOptions;
use crate::util::{ConnectionArgs, connect};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    human_panic::setup_panic!();

    let cli = Cli::parse();

    // Handle completions command early (before tracing init)
    if let Commands::Completions { shell } = cli.command {
        let mut cmd = Cli::command();
        clap_complete::generate(shell, &mut cmd, "tirta", &mut io::stdout());
        return Ok(ExitCode::SUCCESS);
    }

    // When quiet mode is enabled, suppress info-level logging
    let filter = if cli.quiet {
        EnvFilter::new("warn")
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    run(cli).await
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let config = Config::load();
    let no_color = cli.no_color || config.no_color;
    let base_opts = FormatOptions::new(no_color, cli.style).with_compact(cli.compact);
    let output = cli.output.as_ref();
    let quiet = cli.quiet;

    let connection = ConnectionArgs {
        api_url: cli.api_url.clone(),
        token: cli.token.clone(),
        request_timeout: cli.request_timeout,
    };
    let output_settings = |args: &OutputArgs| {
        (
            resolve_format(cli.json, args.format, &config),
            base_opts.with_no_header(args.no_header),
        )
    };

    match cli.command {
        Commands::Nodes { output: ref args } => {
            let (format, opts) = output_settings(args);
            let client = connect(connection, &config)?;
            cmd_nodes(&client, NodeListing::All, format, output, quiet, &opts).await?;
        }
        Commands::Map { output: ref args } => {
            let (format, opts) = output_settings(args);
            let client = connect(connection, &config)?;
            cmd_nodes(&client, NodeListing::Positions, format, output, quiet, &opts).await?;
        }
        Commands::Node {
            ref id,
            output: ref args,
        } => {
            let (format, opts) = output_settings(args);
            let client = connect(connection, &config)?;
            cmd_node(&client, id, format, output, quiet, &opts).await?;
        }
        Commands::History {
            start,
            end,
            ref nodes,
            metric,
            output: ref args,
        } => {
            let (format, opts) = output_settings(args);
            let client = connect(connection, &config)?;
            cmd_history(
                &client,
                HistoryArgs {
                    start,
                    end,
                    nodes: nodes.clone(),
                    metric,
                    format,
                    output,
                    quiet,
                    opts: &opts,
                },
            )
            .await?;
        }
        Commands::Records {
            ref id,
            output: ref args,
        } => {
            let (format, opts) = output_settings(args);
            let client = connect(connection, &config)?;
            cmd_records(&client, id, format, output, quiet, &opts).await?;
        }
        Commands::Register { ref form } => {
            let client = connect(connection, &config)?;
            cmd_register(&client, form, None, quiet, no_color).await?;
        }
        Commands::Update { ref id, ref form } => {
            let client = connect(connection, &config)?;
            cmd_register(&client, form, Some(id.as_str()), quiet, no_color).await?;
        }
        Commands::Calibrate {
            ref node,
            ref name,
            sensor,
            poll_interval,
            timeout,
            yes,
        } => {
            let format = resolve_format(cli.json, None, &config);
            let calibration = config.calibration.resolve(poll_interval, timeout);
            let client = Arc::new(connect(connection, &config)?);
            let exit = cmd_calibrate(
                client.clone(),
                client.as_ref(),
                CalibrateArgs {
                    node: node.clone(),
                    name: name.clone(),
                    sensor,
                    config: calibration,
                    yes,
                    quiet,
                    format,
                    output,
                    opts: &base_opts,
                },
            )
            .await?;
            return Ok(exit.exit_code());
        }
        Commands::Config { action } => {
            cmd_config(action, quiet, cli.style, no_color)?;
        }
        Commands::Completions { .. } => {
            // Already handled above
            unreachable!()
        }
    }

    Ok(ExitCode::SUCCESS)
}
