//! Server-side chat sessions. The transcript lives in the store, so the
//! generator's history comes from stored turns rather than the client.

use std::sync::Arc;

use uuid::Uuid;

use super::pipeline::{TriagePipeline, HISTORY_TURNS};
use crate::dto::{ChatReply, HistoryTurn};
use crate::models::conversation::{Conversation, ConversationDetail, NewChatMessage, Sender};
use crate::store::{ConversationStore, StoreError, StoreResult};

pub const DEFAULT_TITLE: &str = "New Therapy Session";

pub const GREETING: &str = "Hello there! I'm your AI therapist, here to support you. \
Share whatever is on your mind and I'll listen and respond to how you're feeling.";

const TITLE_WORDS: usize = 5;
const TITLE_MAX_CHARS: usize = 30;

pub struct ConversationService {
    store: Arc<dyn ConversationStore>,
    pipeline: Arc<TriagePipeline>,
}

impl ConversationService {
    pub fn new(store: Arc<dyn ConversationStore>, pipeline: Arc<TriagePipeline>) -> Self {
        Self { store, pipeline }
    }

    async fn owned(&self, caller: Uuid, id: Uuid) -> StoreResult<Conversation> {
        let conversation = self.store.get(id).await?.ok_or(StoreError::NotFound)?;
        if conversation.user_id != caller {
            tracing::warn!(user_id = %caller, conversation_id = %id, "Conversation access denied");
            return Err(StoreError::Unauthorized);
        }
        Ok(conversation)
    }

    /// Opens a session seeded with the greeting.
    pub async fn start(&self, caller: Uuid, title: Option<String>) -> StoreResult<ConversationDetail> {
        let title = title.unwrap_or_else(|| DEFAULT_TITLE.to_string());
        let conversation = self.store.create(caller, &title).await?;
        let greeting = self
            .store
            .append(
                conversation.id,
                NewChatMessage {
                    sender: Sender::System,
                    text: GREETING.to_string(),
                },
            )
            .await?;

        tracing::info!(user_id = %caller, conversation_id = %conversation.id, "Conversation started");
        Ok(ConversationDetail {
            conversation: Conversation {
                updated_at: greeting.created_at,
                ..conversation
            },
            messages: vec![greeting],
        })
    }

    pub async fn list(&self, caller: Uuid) -> StoreResult<Vec<Conversation>> {
        self.store.list(caller).await
    }

    pub async fn open(&self, caller: Uuid, id: Uuid) -> StoreResult<ConversationDetail> {
        let conversation = self.owned(caller, id).await?;
        let messages = self.store.messages(id).await?;
        Ok(ConversationDetail {
            conversation,
            messages,
        })
    }

    pub async fn delete(&self, caller: Uuid, id: Uuid) -> StoreResult<()> {
        self.owned(caller, id).await?;
        if !self.store.delete(id).await? {
            return Err(StoreError::NotFound);
        }
        tracing::info!(user_id = %caller, conversation_id = %id, "Conversation deleted");
        Ok(())
    }

    /// Stores the user's turn, runs it through the pipeline with the stored
    /// history, and stores the reply.
    pub async fn send(&self, caller: Uuid, id: Uuid, text: &str) -> StoreResult<ChatReply> {
        self.owned(caller, id).await?;

        let prior = self.store.messages(id).await?;
        let skip = prior.len().saturating_sub(HISTORY_TURNS);
        let history: Vec<HistoryTurn> = prior[skip..].iter().map(HistoryTurn::from).collect();
        let first_from_user = !prior.iter().any(|m| m.sender == Sender::User);

        let user_message = self
            .store
            .append(
                id,
                NewChatMessage {
                    sender: Sender::User,
                    text: text.to_string(),
                },
            )
            .await?;

        if first_from_user {
            if let Some(title) = title_from_message(text) {
                self.store.rename(id, &title).await?;
            }
        }

        let reply = self.pipeline.respond(caller, text, &history).await;

        let bot_message = self
            .store
            .append(
                id,
                NewChatMessage {
                    sender: Sender::Bot,
                    text: reply.reply.clone(),
                },
            )
            .await?;

        Ok(ChatReply {
            user_message,
            bot_message,
            reply,
        })
    }
}

/// First few words of the opening message, shortened with an ellipsis.
/// `None` for messages too short to say anything.
pub fn title_from_message(text: &str) -> Option<String> {
    if text.trim().chars().count() <= 3 {
        return None;
    }

    let title = text
        .split_whitespace()
        .take(TITLE_WORDS)
        .collect::<Vec<_>>()
        .join(" ");
    if title.chars().count() > TITLE_MAX_CHARS {
        let head: String = title.chars().take(TITLE_MAX_CHARS - 3).collect();
        return Some(format!("{}...", head));
    }
    Some(title)
}
