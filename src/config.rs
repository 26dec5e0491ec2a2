use crate::retry::RetryConfig;

pub const DEFAULT_BACKEND: &str = "http://127.0.0.1:8000";

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the analysis backend (content serving and job submission)
    pub backend_base: String,
    /// Lines of a tabular preview kept, header included
    pub max_preview_rows: usize,
    pub http_timeout_secs: u64,
    /// Jobs run synchronously on the backend and can take a long time
    pub job_timeout_secs: u64,
    pub fetch_retries: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            backend_base: DEFAULT_BACKEND.to_string(),
            max_preview_rows: 20,
            http_timeout_secs: 30,
            job_timeout_secs: 3600,
            fetch_retries: 2,
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            backend_base: std::env::var("CELLPILOT_BACKEND").unwrap_or(d.backend_base),
            max_preview_rows: std::env::var("PREVIEW_ROWS").ok().and_then(|v| v.parse().ok()).filter(|n| *n > 0).unwrap_or(d.max_preview_rows),
            http_timeout_secs: std::env::var("HTTP_TIMEOUT_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(d.http_timeout_secs),
            job_timeout_secs: std::env::var("JOB_TIMEOUT_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(d.job_timeout_secs),
            fetch_retries: std::env::var("FETCH_RETRIES").ok().and_then(|v| v.parse().ok()).unwrap_or(d.fetch_retries),
        }
    }

    pub fn fetch_retry(&self) -> RetryConfig {
        RetryConfig {
            max_retries: self.fetch_retries,
            ..RetryConfig::default()
        }
    }
}
