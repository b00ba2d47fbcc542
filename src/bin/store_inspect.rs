use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use judgement_ingest::config;
use judgement_ingest::record_id::derive_record_id;
use judgement_ingest::store::{BlobStore, FsBlobStore, RecordStore, SqliteRecordStore};

#[derive(Parser, Debug)]
#[command(author, version, about = "Inspect the job record and object stores")]
struct Args {
    /// Path to YAML config
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the job record for a unique id or a judgement filename
    Record {
        /// Unique id (e.g. CR100_2023-01-07)
        #[arg(long, conflicts_with = "filename")]
        id: Option<String>,
        /// Filename to derive the id from (e.g. CR_100_07-Jan-2023.pdf)
        #[arg(long)]
        filename: Option<String>,
    },
    /// Copy an archived object to a local file
    Object {
        /// Object key (e.g. judgements/CR_100_07-Jan-2023.pdf)
        key: String,
        /// Destination path
        dest: PathBuf,
        /// Bucket; defaults to the configured input bucket
        #[arg(long)]
        bucket: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    let cfg = config::load(Some(&args.config))?;

    match args.command {
        Command::Record { id, filename } => {
            let unique_id = match (id, filename) {
                (Some(id), _) => id,
                (None, Some(name)) => derive_record_id(&name)?,
                (None, None) => bail!("pass --id or --filename"),
            };
            let store = SqliteRecordStore::connect(&cfg.database_url()).await?;
            match store.get(&unique_id).await? {
                Some(stored) => println!("{}", serde_json::to_string_pretty(&stored)?),
                None => bail!("no record for {unique_id}"),
            }
        }
        Command::Object { key, dest, bucket } => {
            let bucket = bucket.unwrap_or_else(|| cfg.ingest.input_bucket.clone());
            let store = FsBlobStore::new(&cfg.storage.blob_root);
            store
                .get(&bucket, &key, &dest)
                .await
                .with_context(|| format!("failed to fetch {bucket}/{key}"))?;
            if let Some(meta) = store.head(&bucket, &key).await? {
                println!(
                    "{bucket}/{key} -> {} ({}, {} bytes)",
                    dest.display(),
                    meta.content_type,
                    meta.size_bytes
                );
            }
        }
    }
    Ok(())
}
