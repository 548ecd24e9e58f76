mod batch;
mod display;
mod load;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, anyhow};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use offerchain_core::dates::parse_date;
use offerchain_core::Direction;
use offerchain_engine::Reconciler;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "offerchain", version, about = "Reconcile purchase-contract packets")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Reconciliation config (JSON). Defaults apply when omitted.
    #[arg(long, global = true, env = "OFFERCHAIN_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile one packet and print the result.
    Reconcile {
        packet: PathBuf,
        /// Print the full result as JSON instead of a card.
        #[arg(long)]
        json: bool,
    },
    /// Reconcile every `*.json` packet in a directory, one line each.
    Batch { dir: PathBuf },
    /// Offset a date the way contract deadlines are computed.
    AddDays {
        date: String,
        days: u32,
        #[arg(long)]
        business: bool,
        #[arg(long)]
        before: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load::load_config(cli.config.as_deref())?;
    let reconciler = Reconciler::new(config).context("building reconciler")?;

    match cli.command {
        Commands::Reconcile { packet, json } => {
            let input = load::load_packet(&packet)?;
            let result = reconciler
                .reconcile(&input)
                .map_err(|e| anyhow!("extraction failed: {e}"))?;
            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                display::print_transaction(&result);
            }
        }
        Commands::Batch { dir } => {
            let files = load::packet_files(&dir)?;
            tracing::info!(packets = files.len(), dir = %dir.display(), "starting batch");
            let started = Instant::now();
            let outcomes = batch::run_batch(Arc::new(reconciler), files).await;
            for outcome in &outcomes {
                let name = outcome
                    .path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                match &outcome.result {
                    Ok(t) => println!("{}", display::summary_line(&name, t)),
                    Err(e) => println!("{name:<30} extraction failed: {e:#}"),
                }
            }
            let stats = batch::stats(&outcomes, started);
            eprintln!(
                "{} packets, {} failed, {} need review ({:.2}s)",
                stats.total, stats.failed, stats.needs_review, stats.elapsed_secs
            );
        }
        Commands::AddDays {
            date,
            days,
            business,
            before,
        } => {
            let start: NaiveDate =
                parse_date(&date).ok_or_else(|| anyhow!("unrecognised date {date:?}"))?;
            let direction = if before {
                Direction::Before
            } else {
                Direction::After
            };
            let calendar = reconciler.calendar();
            let result = if business {
                calendar.add_business_days(start, days, direction)
            } else {
                calendar.add_calendar_days(start, days, direction)
            }
            .ok_or_else(|| anyhow!("date out of range"))?;
            println!("{}", result.format("%a %Y-%m-%d"));
        }
    }

    Ok(())
}
