use axum::{extract::State, Json};

use crate::services::catalog::ResourceCatalog;
use crate::AppState;

pub async fn list_resources(State(state): State<AppState>) -> Json<ResourceCatalog> {
    Json(state.catalog.as_ref().clone())
}
