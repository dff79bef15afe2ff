// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! dbloupe main entry point - run instrumented SQL scripts and manage configuration.

use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use colored::Colorize;

use dbloupe::config::{self, Overrides};
use dbloupe::interceptor::{
    self, AggregatingMetricSink, FanoutMetricSink, JsonLinesMetricSink, TracingLogSink,
};
use dbloupe::sqlite::{InstrumentedConnection, StatementOutcome};
use dbloupe::telemetry::{init_telemetry, TelemetryConfig, GLOBAL_METRICS};

/// dbloupe - database call instrumentation.
#[derive(Parser)]
#[command(name = "dbloupe")]
#[command(author, version, about = "Instrumented database calls with correlated metrics", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a SQL script against a SQLite database with instrumentation installed
    Run {
        /// Database file (created if missing)
        database: PathBuf,

        /// Script of `;`-separated statements
        script: PathBuf,

        /// Record the call stack of every command
        #[arg(long)]
        call_stack: bool,

        /// Don't write a log entry for failed commands
        #[arg(long)]
        no_exceptions: bool,

        /// Also write metric records as JSON lines to this file
        #[arg(long, env = "DBLOUPE_METRICS_OUT")]
        metrics_out: Option<PathBuf>,

        /// Show every query entry, not just failures
        #[arg(short, long)]
        verbose: bool,
    },

    /// Show or initialize configuration
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },
}

/// Config subcommand actions.
#[derive(Subcommand)]
enum ConfigAction {
    /// Show the resolved configuration
    Show,
    /// Write an example .dbloupe.json in the current directory
    Init,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            database,
            script,
            call_stack,
            no_exceptions,
            metrics_out,
            verbose,
        } => {
            let overrides = Overrides {
                include_call_stack: call_stack.then_some(true),
                log_exceptions: no_exceptions.then_some(false),
                ..Overrides::default()
            };
            run_script(database, script, overrides, metrics_out, verbose)
        }
        Commands::Config { action } => handle_config(action),
    }
}

fn run_script(
    database: PathBuf,
    script: PathBuf,
    overrides: Overrides,
    metrics_out: Option<PathBuf>,
    verbose: bool,
) -> anyhow::Result<()> {
    let telemetry = if verbose {
        TelemetryConfig::development()
    } else {
        TelemetryConfig::default().with_filter("warn,dbloupe::query=info")
    };
    init_telemetry(&telemetry)?;

    let workspace_root = std::env::current_dir()?;
    let config = config::load_config(&workspace_root, overrides)?;

    let mut metric_sink = FanoutMetricSink::new().with(AggregatingMetricSink::global());
    if let Some(path) = &metrics_out {
        let file = File::create(path)
            .with_context(|| format!("Failed to create metrics file: {}", path.display()))?;
        metric_sink = metric_sink.with(JsonLinesMetricSink::new(BufWriter::new(file)));
    }
    interceptor::install_with_sinks(config, Arc::new(TracingLogSink), Arc::new(metric_sink));

    let sql = std::fs::read_to_string(&script)
        .with_context(|| format!("Failed to read script: {}", script.display()))?;
    let conn = InstrumentedConnection::open(&database)
        .with_context(|| format!("Failed to open database: {}", database.display()))?;

    let result = conn.run_script(&sql);
    match &result {
        Ok(outcomes) => {
            for (i, outcome) in outcomes.iter().enumerate() {
                let summary = match outcome {
                    StatementOutcome::Affected(n) => format!("{} row(s) affected", n),
                    StatementOutcome::Rows(n) => format!("{} row(s) returned", n),
                };
                println!("{} statement {}: {}", "✓".green(), i + 1, summary);
            }
        }
        Err(e) => eprintln!("{} {}", "✗".red(), e.to_string().red()),
    }

    println!("\n{}", GLOBAL_METRICS.snapshot().format_report());
    if let Some(path) = metrics_out {
        println!("{}", format!("Metric records written to {}", path.display()).dimmed());
    }

    result.map(|_| ()).context("Script failed")
}

fn handle_config(action: Option<ConfigAction>) -> anyhow::Result<()> {
    let workspace_root = std::env::current_dir()?;
    match action {
        Some(ConfigAction::Show) | None => {
            let config = config::load_config(&workspace_root, Overrides::default())?;
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        Some(ConfigAction::Init) => {
            let path = config::init_config(&workspace_root)?;
            println!("Created config file: {}", path.display());
        }
    }
    Ok(())
}
