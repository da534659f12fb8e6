use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use uuid::Uuid;
use validator::Validate;

use crate::auth::middleware::AuthUser;
use crate::dto::{ChatReply, DeleteResponse};
use crate::error::AppResult;
use crate::models::conversation::{
    ChatMessageRequest, Conversation, ConversationDetail, CreateConversationRequest,
};
use crate::AppState;

pub async fn list_conversations(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> AppResult<Json<Vec<Conversation>>> {
    Ok(Json(state.conversations.list(auth_user.id).await?))
}

/// The body is optional; without one the session gets the default title.
pub async fn create_conversation(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    body: Option<Json<CreateConversationRequest>>,
) -> AppResult<(StatusCode, Json<ConversationDetail>)> {
    let body = body.map(|Json(body)| body).unwrap_or_default();
    body.validate()?;
    let detail = state.conversations.start(auth_user.id, body.title).await?;
    Ok((StatusCode::CREATED, Json(detail)))
}

pub async fn get_conversation(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(conversation_id): Path<Uuid>,
) -> AppResult<Json<ConversationDetail>> {
    let detail = state
        .conversations
        .open(auth_user.id, conversation_id)
        .await?;
    Ok(Json(detail))
}

pub async fn delete_conversation(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(conversation_id): Path<Uuid>,
) -> AppResult<Json<DeleteResponse>> {
    state
        .conversations
        .delete(auth_user.id, conversation_id)
        .await?;
    Ok(Json(DeleteResponse {
        deleted: true,
        id: conversation_id,
    }))
}

pub async fn send_message(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(conversation_id): Path<Uuid>,
    Json(body): Json<ChatMessageRequest>,
) -> AppResult<Json<ChatReply>> {
    body.validate()?;
    let reply = state
        .conversations
        .send(auth_user.id, conversation_id, &body.message)
        .await?;
    Ok(Json(reply))
}
