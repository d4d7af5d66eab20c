use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use kasboek_archive::{
    ChatEvent, ListFilter, MessageKey, MessageStore, ReviewEdit, WorkflowStatus, export_csv,
};
use kasboek_core::FallbackTimestamp;
use kasboek_extract::Extractor;
use rust_decimal::Decimal;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tokio::task::JoinSet;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod config;
mod state;

use config::Config;

#[derive(Parser, Debug)]
#[command(
    name = "kasboek",
    version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("KASBOEK_BUILD_SHA"), ")"),
    about = "Archive chat messages and pull amounts, dates and descriptions out of them"
)]
struct Cli {
    /// More log output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Config file (default: $KASBOEK_HOME/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the extractor on one message
    Extract {
        text: String,

        /// Message timestamp in epoch seconds (default: now)
        #[arg(long)]
        ts: Option<String>,

        /// Print the record as JSON
        #[arg(long)]
        json: bool,
    },

    /// Apply chat events (JSON lines) to the archive
    Ingest {
        /// Events file (default: stdin)
        #[arg(long)]
        file: Option<PathBuf>,
    },

    /// Reconcile a channel with a history batch (JSON array of messages)
    Sync {
        #[arg(long)]
        channel: String,

        /// History file (default: stdin)
        #[arg(long)]
        file: Option<PathBuf>,
    },

    /// Re-run extraction over stored text to fill missing fields
    Backfill {
        /// Messages per worker task
        #[arg(long, default_value_t = 64)]
        chunk: usize,
    },

    /// Show archived messages, newest first
    List {
        #[arg(long)]
        channel: Option<String>,

        /// Case-insensitive text search
        #[arg(long)]
        search: Option<String>,

        #[arg(long, default_value_t = 20)]
        limit: usize,
    },

    /// List the channels present in the archive
    Channels,

    /// Write the archive as CSV for spreadsheet review
    Export {
        #[arg(long)]
        out: PathBuf,
    },

    /// Correct the fields of one message by hand
    Edit {
        #[arg(long)]
        channel: String,

        #[arg(long)]
        ts: String,

        #[arg(long)]
        amount: Option<Decimal>,

        /// YYYY-MM-DD
        #[arg(long)]
        date: Option<NaiveDate>,

        #[arg(long)]
        description: Option<String>,

        /// new, reviewed or booked
        #[arg(long)]
        status: Option<WorkflowStatus>,
    },

    /// Configuration file commands
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Write a default config file if none exists
    Init,
    /// Print the effective configuration
    Show,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let cfg = config::load_config(cli.config.as_deref())?;
    init_logging(cli.verbose, cfg.log.filter.as_deref())?;

    match cli.command {
        Command::Extract { text, ts, json } => {
            let ts = match ts {
                Some(s) => s.parse::<FallbackTimestamp>()?,
                None => FallbackTimestamp::from_datetime(chrono::Utc::now()),
            };
            let record = cfg.extractor()?.extract(&text, ts);

            if json {
                println!("{}", serde_json::to_string_pretty(&record)?);
            } else {
                let amount = record.amount.map(|a| a.to_string());
                println!("amount:           {}", amount.as_deref().unwrap_or("-"));
                println!("transaction_date: {}", record.transaction_date);
                println!("date_extracted:   {}", record.date_extracted);
                println!("description:      {}", record.description);
            }
        }

        Command::Ingest { file } => {
            let mut store = open_store(&cfg)?;
            let extractor = cfg.extractor()?;
            let router = cfg.router();

            let mut lines = BufReader::new(open_input(file.as_deref()).await?).lines();
            let (mut applied, mut skipped) = (0usize, 0usize);
            while let Some(line) = lines.next_line().await? {
                if line.trim().is_empty() {
                    continue;
                }
                let event = match ChatEvent::from_json(&line) {
                    Ok(e) => e,
                    Err(e) => {
                        warn!("skipping malformed event: {e:#}");
                        skipped += 1;
                        continue;
                    }
                };
                match store.apply(router.route(&event, None), &extractor) {
                    Ok(true) => applied += 1,
                    Ok(false) => skipped += 1,
                    Err(e) => {
                        warn!("skipping event: {e:#}");
                        skipped += 1;
                    }
                }
            }

            store.save()?;
            println!("Applied {applied} events ({skipped} skipped); {} messages stored", store.len());
        }

        Command::Sync { channel, file } => {
            let mut store = open_store(&cfg)?;
            let mut raw = String::new();
            open_input(file.as_deref())
                .await?
                .read_to_string(&mut raw)
                .await
                .context("read history batch")?;
            let batch: Vec<ChatEvent> =
                serde_json::from_str(&raw).context("parse history batch (JSON array)")?;

            let report = store.sync_channel(&channel, &batch, &cfg.router(), &cfg.extractor()?)?;
            store.save()?;
            println!(
                "Synced {channel}: {} upserted, {} ignored, {} removed",
                report.upserted, report.ignored, report.deleted
            );
        }

        Command::Backfill { chunk } => {
            let mut store = open_store(&cfg)?;
            let changed = backfill_concurrently(&mut store, cfg.extractor()?, chunk).await?;
            store.save()?;
            println!("Backfilled {changed} messages");
        }

        Command::List {
            channel,
            search,
            limit,
        } => {
            let store = open_store(&cfg)?;
            let filter = ListFilter {
                channel,
                search,
                limit: Some(limit),
            };
            for m in store.list(&filter) {
                let amount = m.amount.map(|a| format!("€ {a}")).unwrap_or_else(|| "-".to_string());
                let date = m
                    .transaction_date
                    .map(|d| d.to_string())
                    .unwrap_or_else(|| "-".to_string());
                let marker = if m.date_extracted { "" } else { "*" };
                println!(
                    "{} | {}{} | {} | {} | {}",
                    m.key,
                    date,
                    marker,
                    amount,
                    m.status,
                    m.description.as_deref().unwrap_or("")
                );
            }
        }

        Command::Channels => {
            let store = open_store(&cfg)?;
            for channel in store.channels() {
                println!("{channel}");
            }
        }

        Command::Export { out } => {
            let store = open_store(&cfg)?;
            let n = export_csv(store.iter(), &out)?;
            println!("Wrote {n} rows to {}", out.display());
        }

        Command::Edit {
            channel,
            ts,
            amount,
            date,
            description,
            status,
        } => {
            let edit = ReviewEdit {
                amount,
                transaction_date: date,
                description,
                status,
            };
            if edit.is_empty() {
                bail!("nothing to change (pass --amount, --date, --description or --status)");
            }

            let mut store = open_store(&cfg)?;
            let msg = store.edit(&MessageKey::new(channel, ts), edit)?;
            println!("{} is now {}", msg.key, msg.status);
            store.save()?;
        }

        Command::Config { command } => match command {
            ConfigCommand::Init => config::init_config(cli.config.as_deref())?,
            ConfigCommand::Show => {
                println!("# {}", config::config_path(cli.config.as_deref())?.display());
                print!("{}", config::render_config(&cfg)?);
            }
        },
    }

    Ok(())
}

fn init_logging(verbose: u8, configured: Option<&str>) -> Result<()> {
    let filter = match (EnvFilter::try_from_default_env(), verbose, configured) {
        (Ok(env), _, _) => env,
        (Err(_), 0, Some(directive)) => {
            EnvFilter::try_new(directive).with_context(|| format!("invalid log filter '{directive}'"))?
        }
        (Err(_), v, _) => EnvFilter::new(match v {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

fn open_store(cfg: &Config) -> Result<MessageStore> {
    let path = cfg.store_path()?;
    MessageStore::load(&path).with_context(|| format!("open store {}", path.display()))
}

async fn open_input(file: Option<&Path>) -> Result<Box<dyn AsyncRead + Unpin + Send>> {
    match file {
        Some(p) => {
            let f = tokio::fs::File::open(p)
                .await
                .with_context(|| format!("open {}", p.display()))?;
            Ok(Box::new(f))
        }
        None => Ok(Box::new(tokio::io::stdin())),
    }
}

/// Extraction is pure, so chunks run on blocking workers in parallel and
/// only the final write-back touches the store.
async fn backfill_concurrently(
    store: &mut MessageStore,
    extractor: Extractor,
    chunk: usize,
) -> Result<usize> {
    let jobs = store.backfill_candidates();
    info!(candidates = jobs.len(), "backfill started");

    let mut tasks = JoinSet::new();
    for batch in jobs.chunks(chunk.max(1)) {
        let batch = batch.to_vec();
        tasks.spawn_blocking(move || {
            batch
                .into_iter()
                .map(|job| {
                    let record = extractor.extract_message(&job.message);
                    (job.key, record)
                })
                .collect::<Vec<_>>()
        });
    }

    let mut results = Vec::new();
    while let Some(done) = tasks.join_next().await {
        results.extend(done.context("backfill worker panicked")?);
    }
    Ok(store.apply_backfill(results))
}
