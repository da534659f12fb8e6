use axum::{extract::State, Extension, Json};
use validator::Validate;

use crate::auth::middleware::AuthUser;
use crate::dto::{ClassifyRequest, ClassifyResponse, MessageReply, MessageRequest, TriageRequest};
use crate::error::AppResult;
use crate::services::triage::TriageDecision;
use crate::AppState;

/// Triage the message, record it, and reply. Crisis messages get the fixed
/// crisis response and never reach the generator.
pub async fn send_message(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Json(body): Json<MessageRequest>,
) -> AppResult<Json<MessageReply>> {
    body.validate()?;

    let reply = state
        .pipeline
        .respond(auth_user.id, &body.message, &body.history)
        .await;

    tracing::info!(
        user_id = %auth_user.id,
        mode = ?reply.decision.mode,
        source = ?reply.source,
        "Message answered"
    );

    Ok(Json(reply))
}

/// Triage and record only; no reply is generated.
pub async fn triage_message(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Json(body): Json<TriageRequest>,
) -> AppResult<Json<TriageDecision>> {
    body.validate()?;
    Ok(Json(state.pipeline.evaluate(auth_user.id, &body.message).await))
}

pub async fn classify_texts(
    State(state): State<AppState>,
    Json(body): Json<ClassifyRequest>,
) -> AppResult<Json<ClassifyResponse>> {
    body.validate()?;
    let moods = state.classifier.classify_batch(body.texts.as_slice()).await;
    Ok(Json(ClassifyResponse { moods }))
}
