use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{TransportError, TransportErrorKind};

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Bodies of failed responses are truncated to this many bytes in errors.
const ERROR_BODY_LIMIT: usize = 512;

/// HTTP operations the pipeline needs. Both fail on non-2xx, network errors and timeouts.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// GET `url` and return the response body.
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<Vec<u8>, TransportError>;

    /// POST `payload` as JSON to `url` and return the raw response body.
    async fn post_json(
        &self,
        url: &str,
        payload: &Value,
        timeout: Duration,
    ) -> Result<String, TransportError>;
}

#[derive(Clone)]
pub struct ReqwestTransport {
    http: Client,
}

impl fmt::Debug for ReqwestTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReqwestTransport").finish_non_exhaustive()
    }
}

impl ReqwestTransport {
    pub fn new() -> Result<Self, reqwest::Error> {
        let http = Client::builder()
            .user_agent(concat!("judgement-ingest/", env!("CARGO_PKG_VERSION")))
            .no_proxy()
            .build()?;
        Ok(Self::with_client(http))
    }

    pub fn with_client(http: Client) -> Self {
        Self { http }
    }

    async fn check(url: &str, res: reqwest::Response) -> Result<reqwest::Response, TransportError> {
        let status = res.status();
        if status.is_success() {
            return Ok(res);
        }
        let mut body = res.text().await.unwrap_or_default();
        if body.len() > ERROR_BODY_LIMIT {
            let mut cut = ERROR_BODY_LIMIT;
            while !body.is_char_boundary(cut) {
                cut -= 1;
            }
            body.truncate(cut);
        }
        warn!(%url, %status, "remote returned error status");
        Err(TransportError::new(
            url,
            TransportErrorKind::Status { status, body },
        ))
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<Vec<u8>, TransportError> {
        let res = self
            .http
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| TransportError::from_reqwest(url, e))?;
        let res = Self::check(url, res).await?;
        let bytes = res
            .bytes()
            .await
            .map_err(|e| TransportError::from_reqwest(url, e))?;
        debug!(%url, len = bytes.len(), "fetched body");
        Ok(bytes.to_vec())
    }

    async fn post_json(
        &self,
        url: &str,
        payload: &Value,
        timeout: Duration,
    ) -> Result<String, TransportError> {
        let res = self
            .http
            .post(url)
            .header("Content-Type", "application/json")
            .json(payload)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| TransportError::from_reqwest(url, e))?;
        let res = Self::check(url, res).await?;
        res.text()
            .await
            .map_err(|e| TransportError::from_reqwest(url, e))
    }
}
