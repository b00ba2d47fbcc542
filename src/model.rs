use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::IngestError;

/// A queue delivery carrying one or more records.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueueEvent {
    #[serde(rename = "Records", default)]
    pub records: Vec<QueueRecord>,
}

/// One delivered message. Only `body` is required.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueueRecord {
    #[serde(rename = "messageId", default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    pub body: String,
}

#[derive(Debug, Deserialize)]
struct MessageBody {
    #[serde(rename = "judgementPdfLink", default)]
    judgement_pdf_link: Option<String>,
}

impl QueueRecord {
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            message_id: None,
            body: body.into(),
        }
    }

    /// Decode the body and extract the document link.
    ///
    /// `Ok(None)` means there is nothing to process (absent, null or blank link).
    pub fn document_url(&self) -> Result<Option<String>, IngestError> {
        let body: MessageBody =
            serde_json::from_str(&self.body).map_err(IngestError::MalformedMessage)?;
        Ok(body
            .judgement_pdf_link
            .map(|link| link.trim().to_string())
            .filter(|link| !link.is_empty()))
    }
}

/// Payload sent to the processing service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct JobRequest {
    pub input_file_path: String,
    pub output_file_path: String,
}

/// Status record for one document, keyed by its derived unique id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct JobRecord {
    pub unique_id: String,
    pub status: String,
    pub job_id: String,
}

/// A record as read back from the store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoredJobRecord {
    #[serde(flatten)]
    pub record: JobRecord,
    pub created_at: DateTime<Utc>,
}

/// Where a message is in its single pass through the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingState {
    Received,
    Fetched,
    Archived,
    JobSubmitted,
    Recorded,
    Skipped,
    Failed,
}

impl ProcessingState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessingState::Received => "received",
            ProcessingState::Fetched => "fetched",
            ProcessingState::Archived => "archived",
            ProcessingState::JobSubmitted => "job_submitted",
            ProcessingState::Recorded => "recorded",
            ProcessingState::Skipped => "skipped",
            ProcessingState::Failed => "failed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_parses_records_and_message_ids() {
        let raw = r#"{"Records":[{"messageId":"m-1","body":"{}"},{"body":"{}"}]}"#;
        let event: QueueEvent = serde_json::from_str(raw).unwrap();
        assert_eq!(event.records.len(), 2);
        assert_eq!(event.records[0].message_id.as_deref(), Some("m-1"));
        assert!(event.records[1].message_id.is_none());
    }

    #[test]
    fn document_url_extracts_link() {
        let rec = QueueRecord::new(r#"{"judgementPdfLink":" https://x/CR_100_07-Jan-2023.pdf "}"#);
        assert_eq!(
            rec.document_url().unwrap().as_deref(),
            Some("https://x/CR_100_07-Jan-2023.pdf")
        );
    }

    #[test]
    fn document_url_absent_null_or_blank_is_none() {
        for body in [r#"{}"#, r#"{"judgementPdfLink":null}"#, r#"{"judgementPdfLink":"  "}"#] {
            assert!(QueueRecord::new(body).document_url().unwrap().is_none(), "{body}");
        }
    }

    #[test]
    fn document_url_rejects_non_json_and_non_string() {
        assert!(matches!(
            QueueRecord::new("not json").document_url(),
            Err(IngestError::MalformedMessage(_))
        ));
        assert!(matches!(
            QueueRecord::new(r#"{"judgementPdfLink":42}"#).document_url(),
            Err(IngestError::MalformedMessage(_))
        ));
    }

    #[test]
    fn state_labels() {
        assert_eq!(ProcessingState::JobSubmitted.as_str(), "job_submitted");
    }
}
