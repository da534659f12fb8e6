use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Label recorded in the event log when a message takes the crisis path.
pub const DISTRESS_LABEL: &str = "distress";

/// Append-only analytics record of a message and the emotion detected in it.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct EmotionEvent {
    pub id: Uuid,
    pub user_id: Uuid,
    pub message: String,
    pub emotion: String,
    #[sqlx(rename = "logged_at")]
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewEmotionEvent {
    pub user_id: Uuid,
    pub message: String,
    pub emotion: String,
    /// Defaults to the time of the write when omitted.
    pub timestamp: Option<DateTime<Utc>>,
}
