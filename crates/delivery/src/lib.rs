//! Outbound delivery to the remote messaging endpoint.
//!
//! [`DeliveryClient`] performs the HTTP calls (send-text, send-document) with
//! bounded retry on explicit rate-limit responses. Every other failure class
//! routes into the shared [`CooldownGate`], which suppresses all sends for a
//! fixed window. Failures are returned as [`DeliveryOutcome`] values; nothing
//! in this crate panics the host or raises past the caller.

mod chunk;
mod client;
mod cooldown;
mod types;

pub use chunk::{MAX_TEXT_CHUNK_CHARS, chunk_text};
pub use client::{DEFAULT_REQUEST_TIMEOUT, DeliveryClient, Error, MAX_DOCUMENT_BYTES};
pub use cooldown::{CooldownGate, DEFAULT_COOLDOWN};
pub use types::{
    ChatAddress, DeliveryOutcome, DeliveryRequest, FailureKind, MAX_CAPTION_CHARS, Payload,
};
