//! Stable object keys for downloaded documents and the write into the raw bucket.
use tracing::{error, info, warn};

use crate::error::IngestError;
use crate::store::BlobStore;

pub const PDF_CONTENT_TYPE: &str = "application/pdf";
const PDF_SUFFIX: &str = ".pdf";

/// Location of an archived document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchivedObject {
    pub bucket: String,
    /// Final filename, always ending in `.pdf`.
    pub filename: String,
    /// `<prefix>/<filename>`
    pub key: String,
}

impl ArchivedObject {
    /// `s3://<bucket>/<key>` form of this object in an arbitrary bucket.
    pub fn location_in(&self, bucket: &str) -> String {
        format!("s3://{}/{}", bucket, self.key)
    }
}

/// Last `/`-delimited segment of the URL path, ignoring query and fragment.
///
/// Works on the raw text so the name is never percent-encoded or otherwise
/// normalized: `https://x/CR 100_a.pdf` yields `CR 100_a.pdf`.
pub fn last_path_segment(source_url: &str) -> String {
    let end = source_url.find(['?', '#']).unwrap_or(source_url.len());
    let without_query = &source_url[..end];
    let path = match without_query.split_once("://") {
        Some((_, rest)) => rest.find('/').map(|idx| &rest[idx..]).unwrap_or_default(),
        None => without_query,
    };
    path.rsplit('/').next().unwrap_or_default().to_string()
}

/// Filename the document is stored under; a pure function of the URL.
pub fn object_filename(source_url: &str) -> String {
    let mut filename = last_path_segment(source_url);
    if !filename.ends_with(PDF_SUFFIX) {
        filename.push_str(PDF_SUFFIX);
    }
    filename
}

/// Full object key: `<prefix>/<filename>`.
pub fn object_key(prefix: &str, source_url: &str) -> (String, String) {
    let filename = object_filename(source_url);
    let key = format!("{}/{}", prefix.trim_matches('/'), filename);
    (filename, key)
}

/// Store `bytes` in `bucket` under the key derived from `source_url`.
pub async fn archive(
    store: &dyn BlobStore,
    bucket: &str,
    prefix: &str,
    source_url: &str,
    bytes: &[u8],
) -> Result<ArchivedObject, IngestError> {
    let (filename, key) = object_key(prefix, source_url);
    if filename == PDF_SUFFIX {
        warn!(url = %source_url, %key, "URL has no filename; using degenerate key");
    }

    if let Err(err) = store.put(bucket, &key, bytes, PDF_CONTENT_TYPE).await {
        error!(url = %source_url, %bucket, %key, error = %err, "failed to archive document");
        return Err(IngestError::storage_write(format!("{bucket}/{key}"), err));
    }
    info!(url = %source_url, "uploaded to s3://{}/{}", bucket, key);

    Ok(ArchivedObject {
        bucket: bucket.to_string(),
        filename,
        key,
    })
}
