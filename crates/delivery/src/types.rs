//! Request and outcome values exchanged with the delivery client.

use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;

/// Hard limit on document captions, enforced before upload.
pub const MAX_CAPTION_CHARS: usize = 1024;

/// Destination chat plus optional topic within it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChatAddress {
    pub chat_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic_id: Option<i64>,
}

impl ChatAddress {
    pub fn new(chat_id: i64, topic_id: Option<i64>) -> Self {
        Self { chat_id, topic_id }
    }
}

/// What gets sent: a text message or a file upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Text(String),
    Document(PathBuf),
}

/// An immutable delivery order. Built once, never mutated by the client.
#[derive(Debug, Clone)]
pub struct DeliveryRequest {
    pub chat: ChatAddress,
    pub payload: Payload,
    /// Caption for document uploads; the file name is used when absent.
    pub caption: Option<String>,
    /// Formatting mode for text sends (endpoint-defined, e.g. "markdown").
    pub formatting: Option<String>,
}

impl DeliveryRequest {
    pub fn text(chat: ChatAddress, text: impl Into<String>) -> Self {
        Self {
            chat,
            payload: Payload::Text(text.into()),
            caption: None,
            formatting: None,
        }
    }

    pub fn document(chat: ChatAddress, path: impl Into<PathBuf>) -> Self {
        Self {
            chat,
            payload: Payload::Document(path.into()),
            caption: None,
            formatting: None,
        }
    }

    pub fn with_caption(mut self, caption: impl Into<String>) -> Self {
        self.caption = Some(caption.into());
        self
    }

    pub fn with_formatting(mut self, formatting: impl Into<String>) -> Self {
        self.formatting = Some(formatting.into());
        self
    }
}

/// Why a delivery failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Problem on our side (missing, empty, or oversized file). Never
    /// triggers the cooldown gate.
    LocalValidation,
    /// The shared gate was already closed; no network attempt was made.
    CooldownActive,
    /// Explicit rate-limit signal, retry budget exhausted.
    RateLimited,
    /// Non-success HTTP status other than the rate-limit signal.
    Http,
    /// Connection actively refused or reset: the endpoint looks blocked
    /// rather than the local network being down.
    EndpointBlocked,
    /// Generic connect failure or timeout.
    Offline,
}

/// Result of one delivery attempt, returned as a value (never an `Err`).
#[derive(Debug, Clone)]
pub struct DeliveryOutcome {
    pub ok: bool,
    /// Additional wait the caller should observe before trying again.
    pub extra_wait: Duration,
    pub error: Option<String>,
    pub kind: Option<FailureKind>,
}

impl DeliveryOutcome {
    pub fn success() -> Self {
        Self {
            ok: true,
            extra_wait: Duration::ZERO,
            error: None,
            kind: None,
        }
    }

    pub fn failure(kind: FailureKind, reason: impl Into<String>) -> Self {
        Self {
            ok: false,
            extra_wait: Duration::ZERO,
            error: Some(reason.into()),
            kind: Some(kind),
        }
    }

    pub fn failure_with_wait(
        kind: FailureKind,
        reason: impl Into<String>,
        extra_wait: Duration,
    ) -> Self {
        Self {
            extra_wait,
            ..Self::failure(kind, reason)
        }
    }
}
