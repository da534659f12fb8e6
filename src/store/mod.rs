//! Mood history, emotion event and conversation persistence.
//!
//! Every repository has a Postgres and an in-memory implementation behind
//! the same trait. The backend is picked once in [`connect`]; everything
//! downstream only sees the trait objects in [`Stores`].

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use crate::config::{Config, StoreBackend};
use crate::models::conversation::{ChatMessage, Conversation, NewChatMessage};
use crate::models::emotion_event::{EmotionEvent, NewEmotionEvent};
use crate::models::mood::{MoodEntry, NewMoodEntry, UpdateMoodRequest};

pub mod memory;
pub mod postgres;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("entry not found")]
    NotFound,

    #[error("entry belongs to another user")]
    Unauthorized,

    #[error("store backend unavailable: {0}")]
    Unavailable(#[source] anyhow::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => StoreError::NotFound,
            other => StoreError::Unavailable(other.into()),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait MoodStore: Send + Sync {
    /// Appends an entry. No deduplication; several entries per day are fine.
    async fn add(&self, entry: NewMoodEntry) -> StoreResult<Uuid>;

    async fn get(&self, id: Uuid) -> StoreResult<Option<MoodEntry>>;

    /// Applies only the supplied fields. `None` when the id is absent.
    async fn update(&self, id: Uuid, changes: UpdateMoodRequest) -> StoreResult<Option<MoodEntry>>;

    /// `false` when the id is absent.
    async fn delete(&self, id: Uuid) -> StoreResult<bool>;

    /// Inclusive on both bounds, most recent date first.
    async fn query(
        &self,
        user_id: Uuid,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> StoreResult<Vec<MoodEntry>>;

    async fn ping(&self) -> StoreResult<()>;
}

/// Append-only analytics trail; no update or delete.
#[async_trait]
pub trait EmotionEventLog: Send + Sync {
    async fn log(&self, event: NewEmotionEvent) -> StoreResult<Uuid>;

    /// Most recent first.
    async fn recent(&self, user_id: Uuid, limit: usize) -> StoreResult<Vec<EmotionEvent>>;

    async fn ping(&self) -> StoreResult<()>;
}

/// Chat sessions and their transcripts.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    async fn create(&self, user_id: Uuid, title: &str) -> StoreResult<Conversation>;

    async fn get(&self, id: Uuid) -> StoreResult<Option<Conversation>>;

    /// Most recently updated first.
    async fn list(&self, user_id: Uuid) -> StoreResult<Vec<Conversation>>;

    /// Removes the conversation and its messages. `false` when absent.
    async fn delete(&self, id: Uuid) -> StoreResult<bool>;

    /// Oldest first. Empty when the conversation is absent.
    async fn messages(&self, id: Uuid) -> StoreResult<Vec<ChatMessage>>;

    /// Appends a message and bumps `updated_at` to its timestamp.
    /// `NotFound` when the conversation is absent.
    async fn append(&self, id: Uuid, message: NewChatMessage) -> StoreResult<ChatMessage>;

    /// `false` when the conversation is absent.
    async fn rename(&self, id: Uuid, title: &str) -> StoreResult<bool>;

    async fn ping(&self) -> StoreResult<()>;
}

#[derive(Clone)]
pub struct Stores {
    pub moods: Arc<dyn MoodStore>,
    pub events: Arc<dyn EmotionEventLog>,
    pub conversations: Arc<dyn ConversationStore>,
}

impl Stores {
    pub fn in_memory() -> Self {
        Self {
            moods: Arc::new(memory::InMemoryMoodStore::new()),
            events: Arc::new(memory::InMemoryEventLog::new()),
            conversations: Arc::new(memory::InMemoryConversationStore::new()),
        }
    }
}

pub async fn connect(config: &Config) -> anyhow::Result<Stores> {
    match &config.store_backend {
        StoreBackend::Postgres {
            database_url,
            max_connections,
        } => {
            let pool = crate::db::create_pool(database_url, *max_connections).await?;
            sqlx::migrate!("./migrations").run(&pool).await?;
            tracing::info!("Database migrations applied");

            Ok(Stores {
                moods: Arc::new(postgres::PgMoodStore::new(pool.clone())),
                events: Arc::new(postgres::PgEventLog::new(pool.clone())),
                conversations: Arc::new(postgres::PgConversationStore::new(pool)),
            })
        }
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory storage; mood history is lost on restart");
            Ok(Stores::in_memory())
        }
    }
}
