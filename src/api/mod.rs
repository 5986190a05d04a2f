//! Ingest HTTP API
//!
//! The thin HTTP shell over the item service, the topic and the queue. Handlers receive their
//! dependencies through axum `Extension` layers and translate domain errors into status codes
//! through `ApiError`.
//!
//! ## Routes
//! - **`GET /text?itemId=`**: read an item (200 / 400 / 404).
//! - **`POST /text`**: create an item synchronously (201 / 400 / 503).
//! - **`POST /sns`**: publish a message for asynchronous persistence (202 / 400 / 503).
//! - **`/queue/...`**: operator views of the queue: stats, dead letters, redrive.

pub mod error;
pub mod handlers;
pub mod protocol;

pub use error::ApiError;

use crate::items::ItemService;
use crate::queue::DurableQueue;
use crate::topic::Topic;
use handlers::*;
use protocol::*;

use axum::Router;
use axum::extract::Extension;
use axum::routing::{get, post};
use std::sync::Arc;

pub fn router(items: Arc<ItemService>, topic: Arc<Topic>, queue: Arc<DurableQueue>) -> Router {
    Router::new()
        .route(ENDPOINT_TEXT, get(handle_get_text).post(handle_create_text))
        .route(ENDPOINT_SNS, post(handle_publish))
        .route(ENDPOINT_QUEUE_STATS, get(handle_queue_stats))
        .route(ENDPOINT_DEAD_LETTERS, get(handle_dead_letters))
        .route(ENDPOINT_REDRIVE, post(handle_redrive))
        .layer(Extension(items))
        .layer(Extension(topic))
        .layer(Extension(queue))
}
