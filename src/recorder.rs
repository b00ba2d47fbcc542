use tracing::{error, info};

use crate::error::IngestError;
use crate::model::JobRecord;
use crate::store::RecordStore;

/// Create or merge the status record for `record_id`. Re-applying the same
/// tuple leaves the store unchanged.
pub async fn record_status(
    store: &dyn RecordStore,
    record_id: &str,
    status: &str,
    job_id: &str,
) -> Result<(), IngestError> {
    let record = JobRecord {
        unique_id: record_id.to_string(),
        status: status.to_string(),
        job_id: job_id.to_string(),
    };
    if let Err(err) = store.upsert(&record).await {
        error!(%record_id, %job_id, error = %err, "failed to record job status");
        return Err(IngestError::storage_write(format!("record {record_id}"), err));
    }
    info!(%record_id, %job_id, %status, "updated job record");
    Ok(())
}
