//! HTTP Protocol
//!
//! Endpoint paths and the request/response bodies of the ingest API. Field names are
//! camelCase on the wire.

use serde::{Deserialize, Serialize};

// --- API Endpoints ---

/// Synchronous item create (`POST`) and lookup (`GET ?itemId=`).
pub const ENDPOINT_TEXT: &str = "/text";
/// Asynchronous message publish.
pub const ENDPOINT_SNS: &str = "/sns";
/// Queue state counts.
pub const ENDPOINT_QUEUE_STATS: &str = "/queue/stats";
/// Dead-lettered envelopes, oldest first.
pub const ENDPOINT_DEAD_LETTERS: &str = "/queue/dead-letters";
/// Returns every dead-lettered envelope to the queue.
pub const ENDPOINT_REDRIVE: &str = "/queue/dead-letters/redrive";

// --- Data Transfer Objects ---

/// Body of `POST /text`. The server generates `itemId` when it is omitted.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTextRequest {
    pub title: String,
    #[serde(default)]
    pub item_id: Option<String>,
}

/// Query string of `GET /text`.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetTextParams {
    pub item_id: Option<String>,
}

/// Body of `POST /sns`.
#[derive(Debug, Serialize, Deserialize)]
pub struct PublishRequest {
    pub message: String,
}

/// Body of every non-2xx response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RedriveResponse {
    pub redriven: usize,
}
