//! The `gt8004` command line tool.

pub mod cli;
pub mod logging_system;
pub mod shutdown;

pub use cli::{ApiArgs, Cli, Command, LogLevel, SearchArgs, ShipArgs};
pub use logging_system::{LogFormat, LoggingError, LoggingSystem, setup_logging};
pub use shutdown::shutdown_signal;

use crate::client::PlatformClient;
use crate::domain::LogEntry;
use crate::logger::Logger;
use crate::reliability::StatsSnapshot;
use anyhow::Context;
use clap::Parser;
use serde::Serialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::{info, warn};

/// Counts from one `ship` run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ShipReport {
    pub lines_read: u64,
    pub lines_skipped: u64,
    pub interrupted: bool,
    pub stats: StatsSnapshot,
}

pub async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Err(e) = setup_logging(cli.log_level) {
        eprintln!("Warning: {e}");
    }

    run(cli.command).await
}

pub async fn run(command: Command) -> anyhow::Result<()> {
    match command {
        Command::Ship(args) => {
            let report = ship(&args).await?;
            print_json(&report)
        }
        Command::Search(args) => {
            let client = platform_client(&args.api)?;
            print_json(&client.search_agents(&args.params()).await?)
        }
        Command::Stats { agent_id, api } => {
            print_json(&platform_client(&api)?.agent_stats(&agent_id).await?)
        }
        Command::Performance {
            agent_id,
            window,
            api,
        } => print_json(
            &platform_client(&api)?
                .performance(&agent_id, Some(&window))
                .await?,
        ),
        Command::Logs {
            agent_id,
            limit,
            api,
        } => print_json(&platform_client(&api)?.logs(&agent_id, Some(limit)).await?),
        Command::Benchmark { category, api } => {
            print_json(&platform_client(&api)?.benchmark(&category).await?)
        }
    }
}

/// Reads NDJSON entries from `--input` or stdin until EOF or a shutdown
/// signal, then closes the logger so everything queued gets delivered.
pub async fn ship(args: &ShipArgs) -> anyhow::Result<ShipReport> {
    let config = args
        .logger_config(|name| std::env::var(name).ok())
        .context("invalid logger configuration")?;

    info!(
        "Starting gt8004 ship v{}: agent_id={}, endpoint={}, batch_size={}",
        env!("CARGO_PKG_VERSION"),
        config.agent_id,
        config.endpoint,
        config.batch_size
    );

    let logger = Logger::new(config).context("failed to start logger")?;

    let report = match &args.input {
        Some(path) => {
            let file = tokio::fs::File::open(path)
                .await
                .with_context(|| format!("failed to open {}", path.display()))?;
            ship_lines(&logger, BufReader::new(file)).await?
        }
        None => ship_lines(&logger, BufReader::new(tokio::io::stdin())).await?,
    };

    logger.close().await;
    Ok(ShipReport {
        stats: logger.stats(),
        ..report
    })
}

/// Feeds every parseable line of `reader` into `logger`.
pub async fn ship_lines<R>(logger: &Logger, reader: R) -> anyhow::Result<ShipReport>
where
    R: AsyncBufRead + Unpin,
{
    let mut report = ShipReport::default();
    let mut lines = reader.lines();
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        let line = tokio::select! {
            () = &mut shutdown => {
                report.interrupted = true;
                break;
            }
            line = lines.next_line() => line.context("failed to read input")?,
        };
        let Some(line) = line else { break };

        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        report.lines_read += 1;

        match serde_json::from_str::<LogEntry>(line) {
            Ok(entry) => {
                if logger.log(entry).is_err() {
                    report.lines_skipped += 1;
                }
            }
            Err(e) => {
                report.lines_skipped += 1;
                warn!("Skipping line {}: {}", report.lines_read, e);
            }
        }
    }

    Ok(report)
}

fn platform_client(api: &ApiArgs) -> anyhow::Result<PlatformClient> {
    PlatformClient::with_endpoint(&api.api_endpoint, &api.api_key)
        .context("failed to create platform client")
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
