use serde_json::Value;
use std::time::Duration;
use tracing::{error, info, instrument};

use crate::archive::ArchivedObject;
use crate::error::IngestError;
use crate::model::JobRequest;
use crate::transport::HttpTransport;

/// Input lives in the raw bucket, output goes to the processed bucket under the same key.
pub fn build_job_request(
    object: &ArchivedObject,
    input_bucket: &str,
    output_bucket: &str,
) -> JobRequest {
    JobRequest {
        input_file_path: object.location_in(input_bucket),
        output_file_path: object.location_in(output_bucket),
    }
}

/// Extract `job_id` from a processing-service response body.
///
/// Strings are taken as-is, numbers as their decimal text. Anything else,
/// including a non-JSON body, is a contract violation.
pub fn parse_job_id(url: &str, body: &str) -> Result<String, IngestError> {
    let protocol = |reason: String| IngestError::Protocol {
        url: url.to_string(),
        reason,
    };
    let value: Value = serde_json::from_str(body)
        .map_err(|e| protocol(format!("response is not JSON: {e}")))?;
    match value.get("job_id") {
        Some(Value::String(id)) if !id.trim().is_empty() => Ok(id.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        Some(Value::Null) | None => Err(protocol("response has no job_id".into())),
        Some(other) => Err(protocol(format!("unusable job_id {other}"))),
    }
}

/// Submit a processing job and return its identifier.
#[instrument(skip(transport, request), fields(input = %request.input_file_path))]
pub async fn submit_job(
    transport: &dyn HttpTransport,
    service_url: &str,
    request: &JobRequest,
    timeout: Duration,
) -> Result<String, IngestError> {
    let payload = serde_json::to_value(request).map_err(|e| IngestError::Protocol {
        url: service_url.to_string(),
        reason: format!("failed to encode job request: {e}"),
    })?;

    let body = transport
        .post_json(service_url, &payload, timeout)
        .await
        .map_err(|err| {
            error!(url = %service_url, error = %err, "job submission failed");
            IngestError::from(err)
        })?;

    let job_id = parse_job_id(service_url, &body).map_err(|err| {
        error!(url = %service_url, error = %err, "job submission returned no usable id");
        err
    })?;
    info!(%job_id, "received job id");
    Ok(job_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn object() -> ArchivedObject {
        ArchivedObject {
            bucket: "judgement-pdfs".into(),
            filename: "CR_100_07-Jan-2023.pdf".into(),
            key: "judgements/CR_100_07-Jan-2023.pdf".into(),
        }
    }

    #[test]
    fn request_points_at_both_buckets() {
        let req = build_job_request(&object(), "judgement-pdfs", "judgement-jsons");
        assert_eq!(
            req.input_file_path,
            "s3://judgement-pdfs/judgements/CR_100_07-Jan-2023.pdf"
        );
        assert_eq!(
            req.output_file_path,
            "s3://judgement-jsons/judgements/CR_100_07-Jan-2023.pdf"
        );
        let json = serde_json::to_value(&req).unwrap();
        assert!(json.get("input_file_path").is_some());
        assert!(json.get("output_file_path").is_some());
    }

    #[test]
    fn parses_string_and_numeric_ids() {
        assert_eq!(parse_job_id("u", r#"{"job_id":"abc-1"}"#).unwrap(), "abc-1");
        assert_eq!(parse_job_id("u", r#"{"job_id":101,"id":5}"#).unwrap(), "101");
    }

    #[test]
    fn missing_or_bad_id_is_protocol_error() {
        for body in [
            r#"{"id":101}"#,
            r#"{"job_id":null}"#,
            r#"{"job_id":""}"#,
            r#"{"job_id":{"x":1}}"#,
            "<html>ok</html>",
            "[]",
        ] {
            assert!(
                matches!(parse_job_id("u", body), Err(IngestError::Protocol { .. })),
                "{body}"
            );
        }
    }
}
