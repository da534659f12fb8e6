//! # Moodwell: Request/Response DTOs
//!
//! API contract types that aren't plain models.
//!
//! Conventions:
//! - `*Request`  → deserialized from client JSON body or query params
//! - `*Response` / `*Reply` → serialized to client JSON
//! - Validation is expressed via `validator` derive macros

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::models::conversation::{ChatMessage, Sender};
use crate::models::emotion_event::EmotionEvent;
use crate::models::mood::Mood;
use crate::services::generator::ReplySource;
use crate::services::triage::TriageDecision;

// ============================================================================
// Common
// ============================================================================

/// Standard delete confirmation
#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub deleted: bool,
    pub id: Uuid,
}

// ============================================================================
// Messages & triage
// ============================================================================

/// How many earlier turns a client may send with a message.
pub const MAX_HISTORY_TURNS: usize = 20;

/// One earlier turn of the conversation, supplied by the client.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct HistoryTurn {
    pub sender: Sender,
    #[validate(length(max = 5000, message = "History turns must be at most 5000 characters"))]
    pub text: String,
}

impl From<&ChatMessage> for HistoryTurn {
    fn from(message: &ChatMessage) -> Self {
        Self {
            sender: message.sender,
            text: message.text.clone(),
        }
    }
}

/// POST /api/messages
#[derive(Debug, Deserialize, Validate)]
#[validate(schema(function = "validate_history_len"))]
pub struct MessageRequest {
    #[validate(length(min = 1, max = 5000, message = "Message must be 1-5000 characters"))]
    pub message: String,

    /// Recent turns, oldest first. Only the last few are used.
    #[serde(default)]
    #[validate]
    pub history: Vec<HistoryTurn>,
}

fn validate_history_len(req: &MessageRequest) -> Result<(), ValidationError> {
    if req.history.len() > MAX_HISTORY_TURNS {
        let mut err = ValidationError::new("history_len");
        err.message = Some(format!("At most {} history turns are accepted", MAX_HISTORY_TURNS).into());
        return Err(err);
    }
    Ok(())
}

/// POST /api/triage
#[derive(Debug, Deserialize, Validate)]
pub struct TriageRequest {
    #[validate(length(min = 1, max = 5000, message = "Message must be 1-5000 characters"))]
    pub message: String,
}

/// Reply to POST /api/messages: the text to show plus the triage signals
/// that produced it.
#[derive(Debug, Serialize)]
pub struct MessageReply {
    pub reply: String,
    pub source: ReplySource,
    #[serde(flatten)]
    pub decision: TriageDecision,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_error: Option<String>,
}

/// POST /api/classify
#[derive(Debug, Deserialize, Validate)]
pub struct ClassifyRequest {
    #[validate(length(min = 1, max = 32, message = "Provide 1-32 texts"))]
    pub texts: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ClassifyResponse {
    pub moods: Vec<Mood>,
}

/// Reply to POST /api/chats/:id/messages: both stored turns plus the
/// triage signals.
#[derive(Debug, Serialize)]
pub struct ChatReply {
    pub user_message: ChatMessage,
    pub bot_message: ChatMessage,
    #[serde(flatten)]
    pub reply: MessageReply,
}

// ============================================================================
// Emotion events
// ============================================================================

/// GET /api/emotions
#[derive(Debug, Deserialize)]
pub struct EmotionEventQuery {
    pub limit: Option<usize>,
}

/// An event as returned to its owner, scored with the same table triage uses.
#[derive(Debug, Serialize)]
pub struct EmotionEventView {
    #[serde(flatten)]
    pub event: EmotionEvent,
    pub wellness_score: u8,
}
