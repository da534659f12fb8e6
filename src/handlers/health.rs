use axum::{extract::State, http::StatusCode, Json};
use serde_json::{json, Value};

use crate::AppState;

pub async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "moodwell-api",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

pub async fn readyz(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let moods_ok = state.stores.moods.ping().await.is_ok();
    let events_ok = state.stores.events.ping().await.is_ok();
    let conversations_ok = state.stores.conversations.ping().await.is_ok();

    let check = |ok: bool| if ok { "ok" } else { "failed" };
    let checks = json!({
        "mood_store": check(moods_ok),
        "event_log": check(events_ok),
        "conversation_store": check(conversations_ok),
    });

    if moods_ok && events_ok && conversations_ok {
        (
            StatusCode::OK,
            Json(json!({ "status": "ready", "checks": checks })),
        )
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "not_ready", "checks": checks })),
        )
    }
}
