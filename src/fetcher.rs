use std::time::Duration;
use tracing::{error, info, instrument};

use crate::error::TransportError;
use crate::transport::HttpTransport;

/// Download the document at `url`. No retries: a failure is fatal for the
/// message and redelivery is left to the queue.
#[instrument(skip(transport))]
pub async fn fetch_document(
    transport: &dyn HttpTransport,
    url: &str,
    timeout: Duration,
) -> Result<Vec<u8>, TransportError> {
    match transport.fetch(url, timeout).await {
        Ok(bytes) => {
            info!(%url, len = bytes.len(), "downloaded document");
            Ok(bytes)
        }
        Err(err) => {
            error!(%url, error = %err, "failed to download document");
            Err(err)
        }
    }
}
