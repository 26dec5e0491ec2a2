//! HTTP access to the analysis backend.
//!
//! Two seams: [`ContentService`] serves result content for previews and
//! [`JobService`] uploads datasets and runs jobs. [`HttpBackend`] implements
//! both against the FastAPI server the desktop app talks to.

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;
use url::Url;

use crate::config::ClientConfig;
use crate::jobs::JobKind;
use crate::logging::{log, obj, v_str, Domain, Level, ProfileScope};
use crate::preview::TextKind;
use crate::record::SummaryDatum;
use crate::retry::{
    is_retryable_http_error, is_retryable_network_error, retry_async, Attempt, RetryConfig,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("backend returned status {0}")]
    Status(u16),
    #[error("request failed: {0}")]
    Transport(String),
}

#[derive(Debug, Error)]
pub enum SubmitError {
    /// Non-success response; `detail` is the backend's message or a fallback
    #[error("{detail}")]
    Rejected { status: u16, detail: String },
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("invalid response: {0}")]
    Decode(String),
}

impl SubmitError {
    /// Text for the blocking notification shown to the user.
    pub fn detail(&self) -> String {
        self.to_string()
    }
}

#[async_trait]
pub trait ContentService: Send + Sync {
    async fn fetch_text(&self, path: &str, kind: TextKind) -> Result<String, FetchError>;
    /// Dereferenceable locator for image content; no request is made.
    fn image_locator(&self, path: &str) -> String;
}

#[async_trait]
pub trait JobService: Send + Sync {
    async fn upload(&self, input_path: &str, name: &str) -> Result<SummaryDatum, SubmitError>;
    async fn submit(&self, kind: JobKind, body: Value) -> Result<Value, SubmitError>;
}

pub struct HttpBackend {
    client: Client,
    job_client: Client,
    base: Url,
    retry: RetryConfig,
}

impl HttpBackend {
    pub fn new(cfg: &ClientConfig) -> Result<Self> {
        let mut base = Url::parse(&cfg.backend_base)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(Self {
            client: Client::builder()
                .timeout(Duration::from_secs(cfg.http_timeout_secs))
                .build()?,
            job_client: Client::builder()
                .timeout(Duration::from_secs(cfg.job_timeout_secs))
                .build()?,
            base,
            retry: cfg.fetch_retry(),
        })
    }

    fn endpoint(&self, route: &str) -> Url {
        self.base.join(route).unwrap_or_else(|_| self.base.clone())
    }

    /// `<base>/<route>?path=<urlencoded path>`
    pub fn content_url(&self, route: &str, path: &str) -> Url {
        let mut url = self.endpoint(route);
        url.query_pairs_mut().append_pair("path", path);
        url
    }

    pub async fn ping(&self) -> Result<bool> {
        let resp = self.client.get(self.endpoint("ping")).send().await?;
        if !resp.status().is_success() {
            return Ok(false);
        }
        let body: Value = resp.json().await?;
        Ok(body.get("ok").and_then(Value::as_bool).unwrap_or(false))
    }

    async fn post_json(
        &self,
        route: &str,
        body: &Value,
        fallback: &str,
    ) -> Result<Value, SubmitError> {
        let resp = self.job_client.post(self.endpoint(route)).json(body).send().await?;
        let status = resp.status();
        let text = resp.text().await?;
        let value: Value = serde_json::from_str(&text).unwrap_or(Value::Null);

        if !status.is_success() {
            let detail = value
                .get("detail")
                .map(detail_text)
                .unwrap_or_else(|| fallback.to_string());
            log(
                Level::Warn,
                Domain::Backend,
                "rejected",
                obj(&[
                    ("route", v_str(route)),
                    ("status", json!(status.as_u16())),
                    ("detail", v_str(&detail)),
                ]),
            );
            return Err(SubmitError::Rejected {
                status: status.as_u16(),
                detail,
            });
        }
        if !value.is_object() {
            return Err(SubmitError::Decode(format!("{} returned a non-object body", route)));
        }
        Ok(value)
    }
}

/// FastAPI puts a string in `detail` for handled errors and a list of
/// objects for validation failures.
fn detail_text(detail: &Value) -> String {
    match detail {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[async_trait]
impl ContentService for HttpBackend {
    async fn fetch_text(&self, path: &str, kind: TextKind) -> Result<String, FetchError> {
        let url = self.content_url(kind.endpoint(), path);
        let _scope = ProfileScope::with_context("fetch_text", &[("path", v_str(path))]);
        retry_async(&self.retry, kind.endpoint(), || {
            let url = url.clone();
            async move {
                match self.client.get(url).send().await {
                    Ok(resp) if resp.status().is_success() => match resp.text().await {
                        Ok(text) => Attempt::Done(text),
                        Err(e) => Attempt::Fail(FetchError::Transport(e.to_string())),
                    },
                    Ok(resp) => {
                        let code = resp.status().as_u16();
                        if is_retryable_http_error(code) {
                            Attempt::Retry(FetchError::Status(code))
                        } else {
                            Attempt::Fail(FetchError::Status(code))
                        }
                    }
                    Err(e) if is_retryable_network_error(&e) => {
                        Attempt::Retry(FetchError::Transport(e.to_string()))
                    }
                    Err(e) => Attempt::Fail(FetchError::Transport(e.to_string())),
                }
            }
        })
        .await
    }

    fn image_locator(&self, path: &str) -> String {
        self.content_url("preview_img", path).to_string()
    }
}

#[async_trait]
impl JobService for HttpBackend {
    async fn upload(&self, input_path: &str, name: &str) -> Result<SummaryDatum, SubmitError> {
        let body = json!({ "input_path": input_path, "name": name });
        let resp = self.post_json("adata_upload", &body, "Upload failed").await?;
        let summary = resp.get("summary").cloned().unwrap_or(Value::Null);
        serde_json::from_value(summary).map_err(|e| SubmitError::Decode(e.to_string()))
    }

    async fn submit(&self, kind: JobKind, body: Value) -> Result<Value, SubmitError> {
        self.post_json(kind.endpoint(), &body, kind.failure_message()).await
    }
}
