use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use uuid::Uuid;
use validator::Validate;

use crate::auth::middleware::AuthUser;
use crate::dto::DeleteResponse;
use crate::error::{AppError, AppResult};
use crate::models::mood::{CreateMoodRequest, MoodEntry, MoodQuery, UpdateMoodRequest};
use crate::services::moods::MoodSummary;
use crate::AppState;

fn check_range(query: &MoodQuery) -> AppResult<()> {
    if query.is_reversed() {
        return Err(AppError::Validation(
            "start_date must not be after end_date".into(),
        ));
    }
    Ok(())
}

pub async fn create_mood(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Json(body): Json<CreateMoodRequest>,
) -> AppResult<(StatusCode, Json<MoodEntry>)> {
    body.validate()?;
    let entry = state.moods.record_mood(auth_user.id, body).await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

pub async fn list_moods(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Query(query): Query<MoodQuery>,
) -> AppResult<Json<Vec<MoodEntry>>> {
    check_range(&query)?;
    let entries = state
        .moods
        .list_moods(auth_user.id, query.start_date, query.end_date)
        .await?;
    Ok(Json(entries))
}

pub async fn mood_summary(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Query(query): Query<MoodQuery>,
) -> AppResult<Json<MoodSummary>> {
    check_range(&query)?;
    let summary = state
        .moods
        .mood_summary(auth_user.id, query.start_date, query.end_date)
        .await?;
    Ok(Json(summary))
}

pub async fn get_mood(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(entry_id): Path<Uuid>,
) -> AppResult<Json<MoodEntry>> {
    Ok(Json(state.moods.get_mood(auth_user.id, entry_id).await?))
}

pub async fn update_mood(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(entry_id): Path<Uuid>,
    Json(body): Json<UpdateMoodRequest>,
) -> AppResult<Json<MoodEntry>> {
    body.validate()?;
    let entry = state.moods.update_mood(auth_user.id, entry_id, body).await?;
    Ok(Json(entry))
}

pub async fn delete_mood(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(entry_id): Path<Uuid>,
) -> AppResult<Json<DeleteResponse>> {
    state.moods.delete_mood(auth_user.id, entry_id).await?;
    Ok(Json(DeleteResponse {
        deleted: true,
        id: entry_id,
    }))
}
