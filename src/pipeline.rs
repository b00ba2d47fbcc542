//! Per-message state machine: fetch -> archive -> submit job -> record status.
//!
//! Each record makes at most one forward pass. Nothing is rolled back on
//! failure; every key written along the way is a pure function of the link,
//! so redelivering the same message repeats the same writes.
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, instrument, warn, Span};

use crate::archive::{self, ArchivedObject};
use crate::config::Ingest;
use crate::error::IngestError;
use crate::fetcher;
use crate::jobs;
use crate::model::{ProcessingState, QueueEvent, QueueRecord};
use crate::record_id::derive_record_id;
use crate::recorder;
use crate::store::{BlobStore, RecordStore};
use crate::transport::HttpTransport;

/// Settings the pipeline reads on every record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineSettings {
    pub input_bucket: String,
    pub output_bucket: String,
    pub key_prefix: String,
    pub job_service_url: String,
    pub request_timeout: Duration,
    pub initial_status: String,
    pub fail_fast: bool,
}

impl From<&Ingest> for PipelineSettings {
    fn from(cfg: &Ingest) -> Self {
        Self {
            input_bucket: cfg.input_bucket.clone(),
            output_bucket: cfg.output_bucket.clone(),
            key_prefix: cfg.key_prefix.clone(),
            job_service_url: cfg.job_service_url.clone(),
            request_timeout: cfg.request_timeout(),
            initial_status: cfg.initial_status.clone(),
            fail_fast: cfg.fail_fast,
        }
    }
}

/// Result of one record that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOutcome {
    Recorded {
        object: ArchivedObject,
        record_id: String,
        job_id: String,
    },
    Skipped,
}

/// A record that failed, with the last state it reached.
#[derive(Debug, Error)]
#[error("record {index} failed after reaching {}: {error}", .reached.as_str())]
pub struct RecordFailure {
    pub index: usize,
    pub message_id: Option<String>,
    pub reached: ProcessingState,
    #[source]
    pub error: IngestError,
}

impl RecordFailure {
    fn identifier(&self) -> String {
        item_identifier(self.message_id.as_deref(), self.index)
    }
}

fn item_identifier(message_id: Option<&str>, index: usize) -> String {
    message_id
        .map(str::to_string)
        .unwrap_or_else(|| index.to_string())
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub recorded: usize,
    pub skipped: usize,
}

/// One or more records of a batch failed.
#[derive(Debug, Error)]
#[error("{} of {total} records failed", .failures.len())]
pub struct BatchError {
    pub total: usize,
    pub summary: BatchSummary,
    pub failures: Vec<RecordFailure>,
    /// Identifiers of records never attempted because the batch aborted.
    pub unattempted: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchItemFailure {
    #[serde(rename = "itemIdentifier")]
    pub item_identifier: String,
}

/// Partial batch response understood by the queue trigger.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchResponse {
    #[serde(rename = "batchItemFailures")]
    pub batch_item_failures: Vec<BatchItemFailure>,
}

impl BatchError {
    /// Every failed or unattempted record, so the queue redelivers exactly those.
    pub fn to_response(&self) -> BatchResponse {
        let batch_item_failures = self
            .failures
            .iter()
            .map(RecordFailure::identifier)
            .chain(self.unattempted.iter().cloned())
            .map(|item_identifier| BatchItemFailure { item_identifier })
            .collect();
        BatchResponse {
            batch_item_failures,
        }
    }
}

pub struct Pipeline {
    transport: Arc<dyn HttpTransport>,
    blobs: Arc<dyn BlobStore>,
    records: Arc<dyn RecordStore>,
    settings: PipelineSettings,
}

impl Pipeline {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        blobs: Arc<dyn BlobStore>,
        records: Arc<dyn RecordStore>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            transport,
            blobs,
            records,
            settings,
        }
    }

    /// Process every record of `event` in order.
    ///
    /// Failures are isolated per record and aggregated into [`BatchError`];
    /// with `fail_fast` the first failure stops the batch instead.
    pub async fn handle(&self, event: &QueueEvent) -> Result<BatchSummary, BatchError> {
        let total = event.records.len();
        let mut summary = BatchSummary::default();
        let mut failures = Vec::new();
        let mut unattempted = Vec::new();

        for (index, record) in event.records.iter().enumerate() {
            if self.settings.fail_fast && !failures.is_empty() {
                unattempted.push(item_identifier(record.message_id.as_deref(), index));
                continue;
            }
            match self.process_record(index, record).await {
                Ok(RecordOutcome::Recorded { .. }) => summary.recorded += 1,
                Ok(RecordOutcome::Skipped) => summary.skipped += 1,
                Err(failure) => failures.push(failure),
            }
        }

        if failures.is_empty() {
            info!(total, recorded = summary.recorded, skipped = summary.skipped, "batch done");
            return Ok(summary);
        }
        let err = BatchError {
            total,
            summary,
            failures,
            unattempted,
        };
        warn!(total, failed = err.failures.len(), unattempted = err.unattempted.len(), "batch had failures");
        Err(err)
    }

    /// Drive a single record through the state machine.
    #[instrument(
        skip_all,
        fields(
            index = index,
            message_id = record.message_id.as_deref().unwrap_or("-"),
            url = tracing::field::Empty,
        )
    )]
    pub async fn process_record(
        &self,
        index: usize,
        record: &QueueRecord,
    ) -> Result<RecordOutcome, RecordFailure> {
        let mut state = ProcessingState::Received;
        // Each stage logs its own failure at error; this only marks the transition.
        let fail = |reached: ProcessingState, error: IngestError| {
            debug!(
                from = reached.as_str(),
                to = ProcessingState::Failed.as_str(),
                "state transition"
            );
            RecordFailure {
                index,
                message_id: record.message_id.clone(),
                reached,
                error,
            }
        };

        let url = match record.document_url() {
            Ok(Some(url)) => url,
            Ok(None) => {
                info!("missing judgement URL; skipping");
                transition(&mut state, ProcessingState::Skipped);
                return Ok(RecordOutcome::Skipped);
            }
            Err(err) => {
                error!(error = %err, "undecodable message body");
                return Err(fail(state, err));
            }
        };
        Span::current().record("url", url.as_str());

        let s = &self.settings;
        let bytes = fetcher::fetch_document(self.transport.as_ref(), &url, s.request_timeout)
            .await
            .map_err(|e| fail(state, e.into()))?;
        transition(&mut state, ProcessingState::Fetched);

        let object = archive::archive(
            self.blobs.as_ref(),
            &s.input_bucket,
            &s.key_prefix,
            &url,
            &bytes,
        )
        .await
        .map_err(|e| fail(state, e))?;
        transition(&mut state, ProcessingState::Archived);

        let request = jobs::build_job_request(&object, &s.input_bucket, &s.output_bucket);
        let job_id = jobs::submit_job(
            self.transport.as_ref(),
            &s.job_service_url,
            &request,
            s.request_timeout,
        )
        .await
        .map_err(|e| fail(state, e))?;
        transition(&mut state, ProcessingState::JobSubmitted);

        let record_id = derive_record_id(&object.filename).map_err(|e| {
            error!(filename = %object.filename, error = %e, "cannot derive record id");
            fail(state, e)
        })?;
        recorder::record_status(self.records.as_ref(), &record_id, &s.initial_status, &job_id)
            .await
            .map_err(|e| fail(state, e))?;
        transition(&mut state, ProcessingState::Recorded);

        Ok(RecordOutcome::Recorded {
            object,
            record_id,
            job_id,
        })
    }
}

fn transition(state: &mut ProcessingState, next: ProcessingState) {
    debug!(from = state.as_str(), to = next.as_str(), "state transition");
    *state = next;
}
