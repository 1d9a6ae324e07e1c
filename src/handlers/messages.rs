use crate::auth::AuthUser;
use crate::error::{AppError, AppResult};
use crate::messages;
use crate::models::{
    required, JsonBody, Message, MessageDetail, MessageEnvelope, ReadReceipt, SendMessageRequest,
};
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};

fn is_participant(user: &AuthUser, message: &MessageDetail) -> bool {
    message.from_user.username == user.username || message.to_user.username == user.username
}

fn is_recipient(user: &AuthUser, message: &MessageDetail) -> bool {
    message.to_user.username == user.username
}

/// GET /messages/:id, visible to the sender and the recipient only.
pub async fn get_message(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> AppResult<Json<MessageEnvelope<MessageDetail>>> {
    let message = messages::get_by_id(&state.pool, id).await?;
    if !is_participant(&user, &message) {
        return Err(AppError::unauthorized());
    }
    Ok(Json(MessageEnvelope { message }))
}

/// POST /messages. The sender is always the token's user.
pub async fn send_message(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    JsonBody(payload): JsonBody<SendMessageRequest>,
) -> AppResult<(StatusCode, Json<MessageEnvelope<Message>>)> {
    let (Some(to_username), Some(body)) = (required(payload.to_username), required(payload.body))
    else {
        return Err(AppError::missing_inputs());
    };

    let message = messages::create(&state.pool, &user.username, &to_username, &body).await?;
    Ok((StatusCode::CREATED, Json(MessageEnvelope { message })))
}

/// POST /messages/:id/read. Only the recipient may mark a message read.
pub async fn mark_read(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> AppResult<(StatusCode, Json<MessageEnvelope<ReadReceipt>>)> {
    let message = messages::get_by_id(&state.pool, id).await?;
    if !is_recipient(&user, &message) {
        return Err(AppError::unauthorized());
    }

    let message = messages::mark_read(&state.pool, id).await?;
    Ok((StatusCode::CREATED, Json(MessageEnvelope { message })))
}
