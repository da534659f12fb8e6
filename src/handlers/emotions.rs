use axum::{
    extract::{Query, State},
    Extension, Json,
};

use crate::auth::middleware::AuthUser;
use crate::dto::{EmotionEventQuery, EmotionEventView};
use crate::error::AppResult;
use crate::AppState;

const DEFAULT_LIMIT: usize = 50;
const MAX_LIMIT: usize = 200;

pub async fn recent_emotions(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Query(query): Query<EmotionEventQuery>,
) -> AppResult<Json<Vec<EmotionEventView>>> {
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let events = state.stores.events.recent(auth_user.id, limit).await?;

    let views = events
        .into_iter()
        .map(|event| EmotionEventView {
            wellness_score: state.policy.wellness_score_for_label(&event.emotion),
            event,
        })
        .collect();
    Ok(Json(views))
}
