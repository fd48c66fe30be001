// src/main.rs
//! Replay Tracker CLI
//!
//! Inspect captured batch bodies and late-message files, or push a
//! leftover late-message file to the ingest endpoint.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use replay_tracker::messages::decode_stream;
use replay_tracker::observability::{init_metrics, init_tracing};
use replay_tracker::recording::compressor::{is_gzip, Compressor};
use replay_tracker::recording::{
    DeliveryScheduler, FilePendingStore, HttpSender, MessageBuffer,
};
use replay_tracker::utils::config::{TrackerConfig, DEFAULT_CONFIG_FILE};
use replay_tracker::BuildInfo;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "replay-tracker")]
#[command(about = "Session-replay batch tools", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file stem (extension optional)
    #[arg(short, long, env = "REPLAY_CONFIG", default_value = DEFAULT_CONFIG_FILE)]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print every record in a batch body or late-message file as JSON lines
    Decode {
        /// Raw or gzip file
        file: PathBuf,
    },
    /// Deliver the persisted late-message file, if any
    FlushPending,
    /// Build information
    Version,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing()?;
    init_metrics()?;

    let cli = Cli::parse();

    match cli.command {
        Commands::Decode { file } => decode(&file).await,
        Commands::FlushPending => flush_pending(&cli.config).await,
        Commands::Version => {
            let info = BuildInfo::current();
            println!("replay-tracker {} ({})", info.version, info.git_hash);
            println!("built {} with {}", info.build_timestamp, info.rustc_version);
            Ok(())
        }
    }
}

async fn decode(file: &Path) -> Result<()> {
    let data = tokio::fs::read(file)
        .await
        .with_context(|| format!("Failed to read {:?}", file))?;

    let raw = if is_gzip(&data) {
        Compressor::default().decompress(&data)?
    } else {
        data
    };

    let mut failures = 0;
    for result in decode_stream(&raw) {
        match result {
            Ok(record) => println!("{}", serde_json::to_string(&record)?),
            Err(e) => {
                failures += 1;
                eprintln!("error: {}", e);
            }
        }
    }

    if failures > 0 {
        warn!("{} records could not be decoded", failures);
    }
    Ok(())
}

async fn flush_pending(config_path: &str) -> Result<()> {
    let config = TrackerConfig::load_from(config_path)?;

    let sender = Arc::new(HttpSender::new(&config.delivery)?);
    let store = Arc::new(FilePendingStore::new(&config.storage).await?);
    info!("Flushing late messages from {:?}", store.path());

    let scheduler = DeliveryScheduler::new(
        config.delivery.clone(),
        Arc::new(MessageBuffer::new(config.buffer.clone())),
        sender,
        store,
    );

    if scheduler.deliver_late_messages().await? {
        info!("Late messages delivered");
    } else {
        info!("No late messages delivered");
    }
    Ok(())
}
