use std::io::Read;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use roundtable_models::config::RoundtableConfig;
use roundtable_models::input::DeliberationInput;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "roundtable", about = "Multi-agent trade deliberation engine")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/roundtable.toml", global = true)]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one deliberation session and print the SessionResult JSON
    Deliberate {
        /// Read DeliberationInput JSON from a file instead of stdin
        #[arg(short, long)]
        input: Option<String>,

        /// Pretty-print the output JSON
        #[arg(long)]
        pretty: bool,
    },
    /// Print recent discussion log rows for a symbol, newest first
    History {
        #[arg(short, long)]
        symbol: String,

        #[arg(short, long, default_value_t = 10)]
        limit: usize,

        /// Pretty-print the output JSON
        #[arg(long)]
        pretty: bool,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Logs go to stderr so stdout carries only JSON (respects RUST_LOG)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config_str = std::fs::read_to_string(&cli.config)
        .with_context(|| format!("Failed to read config: {}", cli.config))?;
    let config: RoundtableConfig =
        toml::from_str(&config_str).with_context(|| "Failed to parse config")?;

    match cli.command {
        Command::Deliberate { input, pretty } => run_deliberation(&config, input, pretty).await,
        Command::History {
            symbol,
            limit,
            pretty,
        } => {
            let log = roundtable::open_log(&config.log)?;
            let rows = log
                .recent(&symbol, limit)
                .with_context(|| format!("Failed to read history for {symbol}"))?;
            print_json(&rows, pretty)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn run_deliberation(
    config: &RoundtableConfig,
    input_path: Option<String>,
    pretty: bool,
) -> Result<ExitCode> {
    let input_json = if let Some(path) = &input_path {
        std::fs::read_to_string(path).with_context(|| format!("Failed to read input: {path}"))?
    } else {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read from stdin")?;
        buf
    };

    let input: DeliberationInput =
        serde_json::from_str(&input_json).context("Failed to parse DeliberationInput JSON")?;

    let orchestrator =
        roundtable::build_orchestrator(config).context("Failed to build orchestrator")?;

    let cancel = CancellationToken::new();
    tokio::spawn(roundtable::cancel_on_signal(
        tokio::signal::ctrl_c(),
        cancel.clone(),
    ));

    match roundtable::deliberate(&orchestrator, &input, &cancel).await {
        Ok(result) => {
            print_json(&result, pretty)?;
            Ok(ExitCode::SUCCESS)
        }
        Err(e) if e.is_cancelled() => {
            warn!(symbol = %input.symbol(), "Deliberation cancelled");
            Ok(ExitCode::from(130))
        }
        Err(e) => {
            error!(symbol = %input.symbol(), error = %e, "Deliberation failed, no action this tick");
            Ok(ExitCode::FAILURE)
        }
    }
}

fn print_json<T: serde::Serialize>(value: &T, pretty: bool) -> Result<()> {
    let output = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{output}");
    Ok(())
}
