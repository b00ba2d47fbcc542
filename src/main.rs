use anyhow::{Context, Result};
use clap::Parser;
use judgement_ingest::config;
use judgement_ingest::model::QueueEvent;
use judgement_ingest::pipeline::{BatchResponse, Pipeline, PipelineSettings};
use judgement_ingest::store::{FsBlobStore, SqliteRecordStore};
use judgement_ingest::transport::ReqwestTransport;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tracing::{error, info};

#[derive(Debug, Parser)]
#[command(author, version, about = "Process a queue event of judgement PDF links")]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    /// Queue event JSON; read from stdin when omitted
    #[arg(long)]
    event: Option<PathBuf>,
}

async fn read_event(path: Option<&PathBuf>) -> Result<QueueEvent> {
    let raw = match path {
        Some(p) => tokio::fs::read_to_string(p)
            .await
            .with_context(|| format!("failed to read event file {}", p.display()))?,
        None => {
            let mut buf = String::new();
            tokio::io::stdin()
                .read_to_string(&mut buf)
                .await
                .context("failed to read event from stdin")?;
            buf
        }
    };
    serde_json::from_str(&raw).context("invalid queue event JSON")
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let args = Args::parse();
    let cfg = config::load(Some(&args.config))
        .with_context(|| format!("failed to load {}", args.config.display()))?;
    cfg.ensure_dirs()?;

    let records = SqliteRecordStore::connect(&cfg.database_url())
        .await
        .context("failed to open record store")?;
    let blobs = FsBlobStore::new(&cfg.storage.blob_root);
    let transport = ReqwestTransport::new().context("failed to build HTTP client")?;
    let pipeline = Pipeline::new(
        Arc::new(transport),
        Arc::new(blobs),
        Arc::new(records),
        PipelineSettings::from(&cfg.ingest),
    );

    let event = read_event(args.event.as_ref()).await?;
    info!(records = event.records.len(), "handling queue event");

    match pipeline.handle(&event).await {
        Ok(summary) => {
            info!(recorded = summary.recorded, skipped = summary.skipped, "event handled");
            println!("{}", serde_json::to_string(&BatchResponse::default())?);
            Ok(())
        }
        Err(err) => {
            for failure in &err.failures {
                error!(index = failure.index, error = %failure.error, "record failed");
            }
            println!("{}", serde_json::to_string(&err.to_response())?);
            Err(err.into())
        }
    }
}
