//! Configuration loader and validator for the judgement ingestion worker.
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
}

/// Root configuration struct mirroring the YAML schema exactly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    pub ingest: Ingest,
    pub storage: Storage,
}

/// Pipeline settings: where documents go and who processes them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Ingest {
    pub input_bucket: String,
    pub output_bucket: String,
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
    pub job_service_url: String,
    #[serde(default = "default_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_initial_status")]
    pub initial_status: String,
    /// Abort the remaining records of a batch on the first failure.
    #[serde(default)]
    pub fail_fast: bool,
}

/// Local backing stores.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Storage {
    pub blob_root: String,
    pub database_url: String,
}

fn default_key_prefix() -> String {
    "judgements".into()
}

fn default_timeout_secs() -> u64 {
    crate::transport::DEFAULT_TIMEOUT.as_secs()
}

fn default_initial_status() -> String {
    "pending ocr".into()
}

impl Ingest {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Config {
    /// Ensure the blob root exists.
    pub fn ensure_dirs(&self) -> Result<(), std::io::Error> {
        if self.storage.blob_root.trim().is_empty() {
            return Ok(());
        }
        fs::create_dir_all(&self.storage.blob_root)
    }

    /// Database URL, honouring a `DATABASE_URL` override from the environment.
    pub fn database_url(&self) -> String {
        std::env::var("DATABASE_URL").unwrap_or_else(|_| self.storage.database_url.clone())
    }
}

/// Load configuration from a YAML file and validate it.
/// - If `path` is None, uses `config.yaml` in the current working directory.
pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path.unwrap_or_else(|| Path::new("config.yaml"));
    let content = fs::read_to_string(path)?;
    let cfg: Config = serde_yaml::from_str(&content)?;
    validate(&cfg)?;
    Ok(cfg)
}

/// Validate a configuration instance.
pub fn validate(cfg: &Config) -> Result<(), ConfigError> {
    let ingest = &cfg.ingest;
    if ingest.input_bucket.trim().is_empty() {
        return Err(ConfigError::Invalid("ingest.input_bucket must be non-empty"));
    }
    if ingest.output_bucket.trim().is_empty() {
        return Err(ConfigError::Invalid("ingest.output_bucket must be non-empty"));
    }
    if ingest.key_prefix.trim_matches('/').trim().is_empty() {
        return Err(ConfigError::Invalid("ingest.key_prefix must be non-empty"));
    }
    match Url::parse(&ingest.job_service_url) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => {}
        _ => {
            return Err(ConfigError::Invalid(
                "ingest.job_service_url must be an absolute http(s) URL",
            ))
        }
    }
    if ingest.request_timeout_secs == 0 {
        return Err(ConfigError::Invalid("ingest.request_timeout_secs must be > 0"));
    }
    if ingest.initial_status.trim().is_empty() {
        return Err(ConfigError::Invalid("ingest.initial_status must be non-empty"));
    }

    if cfg.storage.blob_root.trim().is_empty() {
        return Err(ConfigError::Invalid("storage.blob_root must be non-empty"));
    }
    if cfg.storage.database_url.trim().is_empty() {
        return Err(ConfigError::Invalid("storage.database_url must be non-empty"));
    }

    Ok(())
}

/// Returns a complete, valid example configuration.
pub fn example() -> &'static str {
    r#"ingest:
  input_bucket: "judgement-pdfs"
  output_bucket: "judgement-jsons"
  key_prefix: "judgements"
  job_service_url: "https://jobs.example.com/v1/jobs"
  request_timeout_secs: 5
  initial_status: "pending ocr"
  fail_fast: false

storage:
  blob_root: "./data/blobs"
  database_url: "sqlite://./data/records.db"
"#
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample() -> Config {
        serde_yaml::from_str(example()).unwrap()
    }

    #[test]
    fn parse_example_ok() {
        let cfg = sample();
        validate(&cfg).unwrap();
        assert_eq!(cfg.ingest.request_timeout(), Duration::from_secs(5));
        assert!(!cfg.ingest.fail_fast);
    }

    #[test]
    fn defaults_fill_optional_fields() {
        let yaml = r#"ingest:
  input_bucket: "in"
  output_bucket: "out"
  job_service_url: "http://localhost:9000/jobs"
storage:
  blob_root: "/tmp/blobs"
  database_url: "sqlite::memory:"
"#;
        let cfg: Config = serde_yaml::from_str(yaml).unwrap();
        validate(&cfg).unwrap();
        assert_eq!(cfg.ingest.key_prefix, "judgements");
        assert_eq!(cfg.ingest.request_timeout_secs, 5);
        assert_eq!(cfg.ingest.initial_status, "pending ocr");
    }

    #[test]
    fn invalid_buckets() {
        let mut cfg = sample();
        cfg.ingest.input_bucket = "".into();
        match validate(&cfg).unwrap_err() {
            ConfigError::Invalid(msg) => assert!(msg.contains("input_bucket")),
            _ => panic!("wrong error"),
        }

        let mut cfg = sample();
        cfg.ingest.output_bucket = "  ".into();
        match validate(&cfg).unwrap_err() {
            ConfigError::Invalid(msg) => assert!(msg.contains("output_bucket")),
            _ => panic!("wrong error"),
        }
    }

    #[test]
    fn invalid_job_service_url() {
        let mut cfg = sample();
        cfg.ingest.job_service_url = "not a url".into();
        assert!(matches!(validate(&cfg), Err(ConfigError::Invalid(_))));

        let mut cfg = sample();
        cfg.ingest.job_service_url = "ftp://jobs.example.com".into();
        assert!(matches!(validate(&cfg), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn invalid_timeout_and_prefix() {
        let mut cfg = sample();
        cfg.ingest.request_timeout_secs = 0;
        assert!(matches!(validate(&cfg), Err(ConfigError::Invalid(_))));

        let mut cfg = sample();
        cfg.ingest.key_prefix = "/".into();
        assert!(matches!(validate(&cfg), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn ensure_dirs_creates_blob_root() {
        let td = tempdir().unwrap();
        let root = td.path().join("blobs");
        let mut cfg = sample();
        cfg.storage.blob_root = root.to_string_lossy().to_string();
        cfg.ensure_dirs().unwrap();
        assert!(root.exists());
    }

    #[test]
    fn load_from_file_ok() {
        let td = tempdir().unwrap();
        let p = td.path().join("config.yaml");
        fs::write(&p, example()).unwrap();
        let cfg = load(Some(&p)).unwrap();
        assert_eq!(cfg.ingest.input_bucket, "judgement-pdfs");
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let td = tempdir().unwrap();
        let err = load(Some(&td.path().join("nope.yaml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
