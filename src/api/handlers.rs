use super::error::ApiError;
use super::protocol::{CreateTextRequest, GetTextParams, PublishRequest, RedriveResponse};
use crate::items::{Item, ItemService};
use crate::queue::{DeadLetter, DurableQueue, Message, QueueStats};
use crate::topic::{PublishReceipt, Topic};

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Extension, Query};
use axum::http::StatusCode;
use axum::Json;
use std::sync::Arc;

pub async fn handle_get_text(
    Extension(items): Extension<Arc<ItemService>>,
    params: Result<Query<GetTextParams>, QueryRejection>,
) -> Result<Json<Item>, ApiError> {
    let Query(params) = params?;

    let Some(item_id) = params.item_id else {
        return Err(ApiError::Validation(
            "missing query parameter 'itemId'".to_string(),
        ));
    };

    let item = items.get(&item_id).await?;
    Ok(Json(item))
}

pub async fn handle_create_text(
    Extension(items): Extension<Arc<ItemService>>,
    body: Result<Json<CreateTextRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Item>), ApiError> {
    let Json(req) = body?;

    let item = match req.item_id {
        Some(item_id) => Item {
            item_id,
            title: req.title,
        },
        None => Item::with_generated_id(req.title),
    };

    let created = items.create(item).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// Accepts a message for asynchronous processing. The response only confirms
/// that the topic handed it to its subscribers.
pub async fn handle_publish(
    Extension(topic): Extension<Arc<Topic>>,
    body: Result<Json<PublishRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<PublishReceipt>), ApiError> {
    let Json(req) = body?;

    let receipt = topic.publish(Message::new(req.message))?;
    Ok((StatusCode::ACCEPTED, Json(receipt)))
}

pub async fn handle_queue_stats(
    Extension(queue): Extension<Arc<DurableQueue>>,
) -> Json<QueueStats> {
    Json(queue.stats())
}

pub async fn handle_dead_letters(
    Extension(queue): Extension<Arc<DurableQueue>>,
) -> Json<Vec<DeadLetter>> {
    Json(queue.dead_letters())
}

pub async fn handle_redrive(
    Extension(queue): Extension<Arc<DurableQueue>>,
) -> Json<RedriveResponse> {
    let redriven = queue.redrive_dead_letters();
    Json(RedriveResponse { redriven })
}
