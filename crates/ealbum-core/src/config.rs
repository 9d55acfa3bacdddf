//! Configuration module
//!
//! Settings for the upload client: backend and storage endpoints, credentials, transport
//! selection, batching, chunked part sizing, progress policy, timeouts, and retry policy.
//! Values are read from the environment (after loading a `.env` file, if present).

use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_API_URL: &str = "http://localhost:3000";
const DEFAULT_API_VERSION: &str = "v1";
const BATCH_SIZE: usize = 10;
const PART_SIZE_MB: u64 = 10;
const MIN_PART_SIZE_MB: u64 = 5;
const LARGE_FILE_THRESHOLD_MB: u64 = 100;
const REQUEST_TIMEOUT_SECS: u64 = 60;
const PUT_MAX_RETRIES: u32 = 3;
const RETRY_BASE_DELAY_MS: u64 = 500;

const MB: u64 = 1024 * 1024;

/// Which transport moves file bytes to storage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportMode {
    /// Single PUT per file against a pre-signed URL
    Direct,
    /// One multi-part form POST per batch against the bulk ingest endpoint
    Form,
    /// Chunked multipart upload per file
    Chunked,
    /// Form for regular files, chunked for files at or above the large-file threshold
    Auto,
}

impl FromStr for TransportMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "direct" | "put" | "presigned" => Ok(TransportMode::Direct),
            "form" | "multipart-form" | "bulk" => Ok(TransportMode::Form),
            "chunked" | "multipart" => Ok(TransportMode::Chunked),
            "auto" => Ok(TransportMode::Auto),
            other => Err(anyhow::anyhow!(
                "Invalid transport '{}'. Must be one of: direct, form, chunked, auto",
                other
            )),
        }
    }
}

impl fmt::Display for TransportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransportMode::Direct => "direct",
            TransportMode::Form => "form",
            TransportMode::Chunked => "chunked",
            TransportMode::Auto => "auto",
        };
        f.write_str(name)
    }
}

/// How per-file progress rolls up into the overall percentage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProgressPolicy {
    /// Each file contributes `bytes_uploaded / total_bytes`
    #[default]
    Bytes,
    /// Each completed file contributes `1 / total_files`
    Count,
}

impl FromStr for ProgressPolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "bytes" | "byte" => Ok(ProgressPolicy::Bytes),
            "count" | "files" => Ok(ProgressPolicy::Count),
            other => Err(anyhow::anyhow!(
                "Invalid progress policy '{}'. Must be 'bytes' or 'count'",
                other
            )),
        }
    }
}

/// Upload client configuration
#[derive(Clone)]
pub struct UploaderConfig {
    pub api_url: String,
    pub storage_url: String,
    pub api_version: String,
    pub api_token: Option<String>,
    pub transport: TransportMode,
    pub batch_size: usize,
    pub part_size_bytes: u64,
    pub large_file_threshold_bytes: u64,
    pub progress_policy: ProgressPolicy,
    pub request_timeout: Duration,
    pub put_max_retries: u32,
    pub retry_base_delay: Duration,
}

impl fmt::Debug for UploaderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploaderConfig")
            .field("api_url", &self.api_url)
            .field("storage_url", &self.storage_url)
            .field("api_version", &self.api_version)
            .field("api_token", &self.api_token.as_ref().map(|_| "<redacted>"))
            .field("transport", &self.transport)
            .field("batch_size", &self.batch_size)
            .field("part_size_bytes", &self.part_size_bytes)
            .field("large_file_threshold_bytes", &self.large_file_threshold_bytes)
            .field("progress_policy", &self.progress_policy)
            .field("request_timeout", &self.request_timeout)
            .field("put_max_retries", &self.put_max_retries)
            .field("retry_base_delay", &self.retry_base_delay)
            .finish()
    }
}

impl Default for UploaderConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            storage_url: DEFAULT_API_URL.to_string(),
            api_version: DEFAULT_API_VERSION.to_string(),
            api_token: None,
            transport: TransportMode::Auto,
            batch_size: BATCH_SIZE,
            part_size_bytes: PART_SIZE_MB * MB,
            large_file_threshold_bytes: LARGE_FILE_THRESHOLD_MB * MB,
            progress_policy: ProgressPolicy::Bytes,
            request_timeout: Duration::from_secs(REQUEST_TIMEOUT_SECS),
            put_max_retries: PUT_MAX_RETRIES,
            retry_base_delay: Duration::from_millis(RETRY_BASE_DELAY_MS),
        }
    }
}

impl UploaderConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();
        Self::from_vars(|key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable lookup.
    pub fn from_vars<F>(lookup: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let api_url = get("EALBUM_API_URL")
            .or_else(|| get("API_URL"))
            .unwrap_or_else(|| DEFAULT_API_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        let storage_url = get("EALBUM_STORAGE_URL")
            .map(|u| u.trim_end_matches('/').to_string())
            .unwrap_or_else(|| api_url.clone());

        let transport = match get("EALBUM_TRANSPORT") {
            Some(v) => v.parse()?,
            None => TransportMode::Auto,
        };

        let progress_policy = match get("EALBUM_PROGRESS_POLICY") {
            Some(v) => v.parse()?,
            None => ProgressPolicy::default(),
        };

        let config = Self {
            api_url,
            storage_url,
            api_version: get("EALBUM_API_VERSION").unwrap_or_else(|| DEFAULT_API_VERSION.to_string()),
            api_token: get("EALBUM_API_TOKEN").or_else(|| get("JWT_TOKEN")),
            transport,
            batch_size: parse_or(get("EALBUM_BATCH_SIZE"), "EALBUM_BATCH_SIZE", BATCH_SIZE)?,
            part_size_bytes: parse_mb(get("EALBUM_PART_SIZE_MB"), "EALBUM_PART_SIZE_MB", PART_SIZE_MB)?,
            large_file_threshold_bytes: parse_mb(
                get("EALBUM_LARGE_FILE_THRESHOLD_MB"),
                "EALBUM_LARGE_FILE_THRESHOLD_MB",
                LARGE_FILE_THRESHOLD_MB,
            )?,
            progress_policy,
            request_timeout: Duration::from_secs(parse_or(
                get("EALBUM_REQUEST_TIMEOUT_SECS"),
                "EALBUM_REQUEST_TIMEOUT_SECS",
                REQUEST_TIMEOUT_SECS,
            )?),
            put_max_retries: parse_or(
                get("EALBUM_PUT_MAX_RETRIES"),
                "EALBUM_PUT_MAX_RETRIES",
                PUT_MAX_RETRIES,
            )?,
            retry_base_delay: Duration::from_millis(parse_or(
                get("EALBUM_RETRY_BASE_DELAY_MS"),
                "EALBUM_RETRY_BASE_DELAY_MS",
                RETRY_BASE_DELAY_MS,
            )?),
        };

        Ok(config)
    }

    /// API path prefix, e.g. `/api/v1`
    pub fn api_prefix(&self) -> String {
        format!("/api/{}", self.api_version)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        for (name, url) in [
            ("EALBUM_API_URL", &self.api_url),
            ("EALBUM_STORAGE_URL", &self.storage_url),
        ] {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(anyhow::anyhow!(
                    "{} must be an http(s) URL, got '{}'",
                    name,
                    url
                ));
            }
        }

        if self.batch_size == 0 {
            return Err(anyhow::anyhow!("EALBUM_BATCH_SIZE must be greater than 0"));
        }

        if self.part_size_bytes < MIN_PART_SIZE_MB * MB {
            return Err(anyhow::anyhow!(
                "EALBUM_PART_SIZE_MB must be at least {} MB",
                MIN_PART_SIZE_MB
            ));
        }

        if self.transport == TransportMode::Auto
            && self.large_file_threshold_bytes < self.part_size_bytes
        {
            return Err(anyhow::anyhow!(
                "EALBUM_LARGE_FILE_THRESHOLD_MB must not be smaller than EALBUM_PART_SIZE_MB"
            ));
        }

        if self.request_timeout.is_zero() {
            return Err(anyhow::anyhow!(
                "EALBUM_REQUEST_TIMEOUT_SECS must be greater than 0"
            ));
        }

        Ok(())
    }
}

fn parse_or<T>(value: Option<String>, name: &str, default: T) -> Result<T, anyhow::Error>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match value {
        Some(v) => v
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("Invalid value for {}: '{}' ({})", name, v, e)),
        None => Ok(default),
    }
}

/// Parse a size given in MB and convert it to bytes.
fn parse_mb(value: Option<String>, name: &str, default: u64) -> Result<u64, anyhow::Error> {
    parse_or(value, name, default)?
        .checked_mul(MB)
        .ok_or_else(|| anyhow::anyhow!("Value for {} is too large", name))
}
