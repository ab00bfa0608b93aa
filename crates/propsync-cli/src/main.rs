use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use propsync_sync::{SyncConfig, SyncPipeline, SyncSelection};
use tracing::info;
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "info,propsync=debug";

#[derive(Debug, Parser)]
#[command(name = "propsync-cli")]
#[command(about = "Sync a property listing feed into the local content store")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Reconcile feed items into the store and write a run report.
    Sync {
        /// Process only the first N items (0 = all).
        #[arg(long, conflicts_with_all = ["start", "end"])]
        limit: Option<usize>,
        /// First item index of an inclusive range.
        #[arg(long, requires = "end")]
        start: Option<usize>,
        /// Last item index of an inclusive range.
        #[arg(long, requires = "start")]
        end: Option<usize>,
        /// Drop items whose portalTitle already names a stored property.
        #[arg(long)]
        skip_duplicates: bool,
    },
    /// Print the normalized form of one feed item without writing anything.
    Map {
        #[arg(long, default_value_t = 0)]
        index: usize,
    },
}

fn selection(limit: Option<usize>, start: Option<usize>, end: Option<usize>) -> Result<SyncSelection> {
    match (start, end) {
        (Some(start), Some(end)) => Ok(SyncSelection::range(start, end)?),
        _ => Ok(SyncSelection::count(limit)),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Commands::Sync {
        limit: None,
        start: None,
        end: None,
        skip_duplicates: false,
    });

    let config = SyncConfig::from_env();
    match command {
        Commands::Sync {
            limit,
            start,
            end,
            skip_duplicates,
        } => {
            let selection = selection(limit, start, end)?;
            info!(%selection, skip_duplicates, "starting sync");
            let pipeline = SyncPipeline::new(config).await?;
            let report = pipeline.run_with_report(selection, skip_duplicates).await?;
            for message in &report.messages {
                println!("{message}");
            }
            let reports_dir = propsync_sync::write_report(&pipeline.config().reports_dir, &report).await?;
            println!(
                "sync complete: run_id={} success={} skipped={} errors={} reports={}",
                report.run_id,
                report.success,
                report.skipped,
                report.error,
                reports_dir.display()
            );
        }
        Commands::Map { index } => {
            let pipeline = SyncPipeline::new(config).await?;
            let record = pipeline.preview(index)?;
            let json = serde_json::to_string_pretty(&record).context("serializing mapped record")?;
            println!("{json}");
        }
    }

    Ok(())
}
