//! HTTP client for the messaging endpoint.
//!
//! Two operations against an abstract chat/topic messaging API: text sends
//! (`POST {base}/messages`, JSON body) and document uploads
//! (`POST {base}/documents`, raw bytes with query metadata). Rate-limit
//! responses are retried with the server's wait hint; every other failure
//! closes the shared [`CooldownGate`].

use std::error::Error as StdError;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use reqwest::StatusCode;
use reqwest::header::RETRY_AFTER;
use serde::Serialize;
use tracing::{debug, warn};

use crate::chunk::chunk_text;
use crate::cooldown::CooldownGate;
use crate::types::{
    DeliveryOutcome, DeliveryRequest, FailureKind, MAX_CAPTION_CHARS, Payload,
};

/// Per-call HTTP timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Largest document the endpoint accepts.
pub const MAX_DOCUMENT_BYTES: u64 = 50 * 1024 * 1024;

/// Extra attempts after the first rate-limited response.
const RATE_LIMIT_RETRIES: u32 = 3;

/// Wait applied when the rate-limit response carries no usable hint.
const DEFAULT_RETRY_HINT: Duration = Duration::from_secs(60);

/// Slack added on top of the server's wait hint.
const RETRY_HINT_SLACK: Duration = Duration::from_secs(1);

/// Errors from client construction.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}

#[derive(Serialize)]
struct TextMessage<'a> {
    chat_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    topic_id: Option<i64>,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    formatting: Option<&'a str>,
}

/// Sends text and documents to the messaging endpoint.
pub struct DeliveryClient {
    http: reqwest::Client,
    base_url: String,
    gate: Arc<CooldownGate>,
}

impl DeliveryClient {
    pub fn new(base_url: impl Into<String>, gate: Arc<CooldownGate>) -> Result<Self, Error> {
        let http = reqwest::Client::builder()
            .timeout(DEFAULT_REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.into(),
            gate,
        })
    }

    pub fn gate(&self) -> &Arc<CooldownGate> {
        &self.gate
    }

    /// Performs one delivery. All failures come back as outcome values.
    ///
    /// When the cooldown gate is closed this returns a failure without any
    /// network attempt and without logging above debug; the caller decides
    /// whether the suppression is worth surfacing.
    pub async fn send(&self, request: &DeliveryRequest) -> DeliveryOutcome {
        if self.gate.is_cooled_down() {
            let remaining = self.gate.remaining();
            debug!(remaining_secs = remaining.as_secs(), "send suppressed by cooldown");
            return DeliveryOutcome::failure_with_wait(
                FailureKind::CooldownActive,
                format!("cooling down for {}s", remaining.as_secs()),
                remaining,
            );
        }

        match &request.payload {
            Payload::Text(text) => self.send_text(request, text).await,
            Payload::Document(path) => self.send_document(request, path).await,
        }
    }

    async fn send_text(&self, request: &DeliveryRequest, text: &str) -> DeliveryOutcome {
        for chunk in chunk_text(text) {
            let body = TextMessage {
                chat_id: request.chat.chat_id,
                topic_id: request.chat.topic_id,
                text: &chunk,
                formatting: request.formatting.as_deref(),
            };
            let url = format!("{}/messages", self.base_url);
            let outcome = self
                .post_with_retry(|| self.http.post(&url).json(&body))
                .await;
            if !outcome.ok {
                return outcome;
            }
        }
        DeliveryOutcome::success()
    }

    async fn send_document(&self, request: &DeliveryRequest, path: &Path) -> DeliveryOutcome {
        // Local preconditions never touch the cooldown gate: failing here is
        // our problem, not the endpoint's.
        let size = match std::fs::metadata(path) {
            Ok(meta) => meta.len(),
            Err(_) => {
                return DeliveryOutcome::failure(
                    FailureKind::LocalValidation,
                    format!("file not found: {}", path.display()),
                );
            }
        };
        if size == 0 {
            return DeliveryOutcome::failure(
                FailureKind::LocalValidation,
                format!("file is empty: {}", path.display()),
            );
        }
        if size > MAX_DOCUMENT_BYTES {
            return DeliveryOutcome::failure(
                FailureKind::LocalValidation,
                format!(
                    "file too large: {} bytes (limit {MAX_DOCUMENT_BYTES})",
                    size
                ),
            );
        }

        let bytes = match tokio::fs::read(path).await {
            Ok(b) => b,
            Err(e) => {
                return DeliveryOutcome::failure(
                    FailureKind::LocalValidation,
                    format!("failed to read {}: {e}", path.display()),
                );
            }
        };

        let caption = fit_caption(request.caption.as_deref(), path);
        let mut query: Vec<(&str, String)> = vec![
            ("chat_id", request.chat.chat_id.to_string()),
            ("caption", caption),
        ];
        if let Some(topic) = request.chat.topic_id {
            query.push(("topic_id", topic.to_string()));
        }

        let url = format!("{}/documents", self.base_url);
        self.post_with_retry(|| {
            self.http
                .post(&url)
                .query(&query)
                .body(bytes.clone())
        })
        .await
    }

    /// POSTs with bounded retry on explicit rate-limit responses.
    ///
    /// 429 honors the server's wait hint (plus slack) up to
    /// [`RATE_LIMIT_RETRIES`] extra attempts, then escalates to the gate.
    /// Any other failure triggers the gate immediately, no retry.
    async fn post_with_retry<F>(&self, build: F) -> DeliveryOutcome
    where
        F: Fn() -> reqwest::RequestBuilder,
    {
        let mut attempt: u32 = 0;
        loop {
            let response = match build().send().await {
                Ok(resp) => resp,
                Err(e) => {
                    self.gate.trigger_default();
                    let kind = classify_connect_error(&e);
                    warn!(error = %e, kind = ?kind, "delivery request failed");
                    return DeliveryOutcome::failure_with_wait(
                        kind,
                        connect_failure_reason(kind, &e),
                        self.gate.remaining(),
                    );
                }
            };

            let status = response.status();
            if status.is_success() {
                return DeliveryOutcome::success();
            }

            if status == StatusCode::TOO_MANY_REQUESTS {
                if attempt < RATE_LIMIT_RETRIES {
                    attempt += 1;
                    let hint = retry_hint(response).await;
                    debug!(
                        attempt,
                        hint_secs = hint.as_secs(),
                        "rate limited, waiting before retry"
                    );
                    tokio::time::sleep(hint + RETRY_HINT_SLACK).await;
                    continue;
                }
                self.gate.trigger_default();
                warn!("rate limit retries exhausted");
                return DeliveryOutcome::failure_with_wait(
                    FailureKind::RateLimited,
                    format!("rate limited after {RATE_LIMIT_RETRIES} retries"),
                    self.gate.remaining(),
                );
            }

            self.gate.trigger_default();
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "endpoint rejected delivery");
            return DeliveryOutcome::failure_with_wait(
                FailureKind::Http,
                format!("HTTP {}: {}", status.as_u16(), snippet(&body)),
                self.gate.remaining(),
            );
        }
    }
}

/// Extracts the server's retry hint from a rate-limit response.
///
/// Prefers the `Retry-After` header, falls back to `parameters.retry_after`
/// (or a top-level `retry_after`) in the JSON body, then to
/// [`DEFAULT_RETRY_HINT`].
async fn retry_hint(response: reqwest::Response) -> Duration {
    if let Some(secs) = response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
    {
        return Duration::from_secs(secs);
    }

    if let Ok(body) = response.text().await
        && let Ok(value) = serde_json::from_str::<serde_json::Value>(&body)
    {
        let hint = value
            .pointer("/parameters/retry_after")
            .or_else(|| value.get("retry_after"))
            .and_then(serde_json::Value::as_u64);
        if let Some(secs) = hint {
            return Duration::from_secs(secs);
        }
    }

    DEFAULT_RETRY_HINT
}

/// Distinguishes "endpoint refusing us" from "network is down".
fn classify_connect_error(e: &reqwest::Error) -> FailureKind {
    if e.is_timeout() {
        return FailureKind::Offline;
    }

    let mut chain = String::new();
    let mut source: Option<&dyn StdError> = Some(e);
    while let Some(err) = source {
        chain.push_str(&err.to_string().to_lowercase());
        chain.push(' ');
        source = err.source();
    }

    if chain.contains("refused") || chain.contains("reset") {
        FailureKind::EndpointBlocked
    } else {
        FailureKind::Offline
    }
}

fn connect_failure_reason(kind: FailureKind, e: &reqwest::Error) -> String {
    match kind {
        FailureKind::EndpointBlocked => {
            format!("endpoint unreachable, possibly blocked: {e}")
        }
        _ => format!("network error: {e}"),
    }
}

/// Caps a caption to the endpoint limit, defaulting to the file name.
fn fit_caption(caption: Option<&str>, path: &Path) -> String {
    let caption = match caption {
        Some(c) if !c.is_empty() => c,
        _ => {
            return path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
        }
    };
    caption.chars().take(MAX_CAPTION_CHARS).collect()
}

fn snippet(body: &str) -> &str {
    let end = body
        .char_indices()
        .nth(200)
        .map(|(i, _)| i)
        .unwrap_or(body.len());
    &body[..end]
}
