//! Error taxonomy shared by every stage of the ingestion pipeline.
use reqwest::StatusCode;
use std::path::PathBuf;
use thiserror::Error;

/// Failure talking to a remote HTTP endpoint.
#[derive(Debug, Error)]
#[error("request to {url} failed: {kind}")]
pub struct TransportError {
    pub url: String,
    pub kind: TransportErrorKind,
}

#[derive(Debug, Error)]
pub enum TransportErrorKind {
    #[error("unexpected status {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("timed out")]
    Timeout,
    #[error("network error: {0}")]
    Network(#[source] reqwest::Error),
}

impl TransportError {
    pub fn new(url: impl Into<String>, kind: TransportErrorKind) -> Self {
        Self {
            url: url.into(),
            kind,
        }
    }

    /// Classify a `reqwest` error, keeping timeouts distinguishable.
    pub fn from_reqwest(url: impl Into<String>, err: reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            TransportErrorKind::Timeout
        } else {
            TransportErrorKind::Network(err)
        };
        Self::new(url, kind)
    }

    pub fn status(&self) -> Option<StatusCode> {
        match &self.kind {
            TransportErrorKind::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// I/O failure in the blob store or the record store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("object {bucket}/{key} not found")]
    NotFound { bucket: String, key: String },
    #[error("invalid object key {key:?}: {reason}")]
    InvalidKey { key: String, reason: &'static str },
    #[error("metadata encoding error: {0}")]
    Metadata(#[from] serde_json::Error),
}

impl StoreError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Per-record failure surfaced by the pipeline.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("failed to write {target}: {source}")]
    StorageWrite {
        target: String,
        #[source]
        source: StoreError,
    },
    #[error("failed to read {target}: {source}")]
    StorageRead {
        target: String,
        #[source]
        source: StoreError,
    },
    #[error("processing service protocol violation at {url}: {reason}")]
    Protocol { url: String, reason: String },
    #[error("malformed filename {filename:?}: {reason}")]
    MalformedFilename { filename: String, reason: String },
    #[error("malformed message body: {0}")]
    MalformedMessage(#[source] serde_json::Error),
}

impl IngestError {
    pub fn storage_write(target: impl Into<String>, source: StoreError) -> Self {
        IngestError::StorageWrite {
            target: target.into(),
            source,
        }
    }

    pub fn storage_read(target: impl Into<String>, source: StoreError) -> Self {
        IngestError::StorageRead {
            target: target.into(),
            source,
        }
    }

    pub fn malformed_filename(filename: &str, reason: impl Into<String>) -> Self {
        IngestError::MalformedFilename {
            filename: filename.to_string(),
            reason: reason.into(),
        }
    }
}
