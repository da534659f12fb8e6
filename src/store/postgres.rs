use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::{ConversationStore, EmotionEventLog, MoodStore, StoreError, StoreResult};
use crate::models::conversation::{ChatMessage, Conversation, NewChatMessage};
use crate::models::emotion_event::{EmotionEvent, NewEmotionEvent};
use crate::models::mood::{MoodEntry, NewMoodEntry, UpdateMoodRequest};

#[derive(Clone)]
pub struct PgMoodStore {
    db: PgPool,
}

impl PgMoodStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl MoodStore for PgMoodStore {
    async fn add(&self, entry: NewMoodEntry) -> StoreResult<Uuid> {
        let id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO mood_entries (id, user_id, date, mood, note)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(entry.user_id)
        .bind(entry.date)
        .bind(entry.mood)
        .bind(&entry.note)
        .fetch_one(&self.db)
        .await?;

        Ok(id)
    }

    async fn get(&self, id: Uuid) -> StoreResult<Option<MoodEntry>> {
        let entry = sqlx::query_as::<_, MoodEntry>("SELECT * FROM mood_entries WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.db)
            .await?;

        Ok(entry)
    }

    async fn update(&self, id: Uuid, changes: UpdateMoodRequest) -> StoreResult<Option<MoodEntry>> {
        let entry = sqlx::query_as::<_, MoodEntry>(
            r#"
            UPDATE mood_entries SET
                mood = COALESCE($2, mood),
                note = COALESCE($3, note)
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(changes.mood)
        .bind(&changes.note)
        .fetch_optional(&self.db)
        .await?;

        Ok(entry)
    }

    async fn delete(&self, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM mood_entries WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn query(
        &self,
        user_id: Uuid,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> StoreResult<Vec<MoodEntry>> {
        let entries = sqlx::query_as::<_, MoodEntry>(
            r#"
            SELECT * FROM mood_entries
            WHERE user_id = $1
              AND ($2::date IS NULL OR date >= $2)
              AND ($3::date IS NULL OR date <= $3)
            ORDER BY date DESC, created_at DESC
            "#,
        )
        .bind(user_id)
        .bind(start_date)
        .bind(end_date)
        .fetch_all(&self.db)
        .await?;

        Ok(entries)
    }

    async fn ping(&self) -> StoreResult<()> {
        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.db)
            .await?;
        Ok(())
    }
}

#[derive(Clone)]
pub struct PgEventLog {
    db: PgPool,
}

impl PgEventLog {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl EmotionEventLog for PgEventLog {
    async fn log(&self, event: NewEmotionEvent) -> StoreResult<Uuid> {
        let id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO emotion_events (id, user_id, message, emotion, logged_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(event.user_id)
        .bind(&event.message)
        .bind(&event.emotion)
        .bind(event.timestamp.unwrap_or_else(Utc::now))
        .fetch_one(&self.db)
        .await?;

        Ok(id)
    }

    async fn recent(&self, user_id: Uuid, limit: usize) -> StoreResult<Vec<EmotionEvent>> {
        let events = sqlx::query_as::<_, EmotionEvent>(
            r#"
            SELECT * FROM emotion_events
            WHERE user_id = $1
            ORDER BY logged_at DESC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(limit as i64)
        .fetch_all(&self.db)
        .await?;

        Ok(events)
    }

    async fn ping(&self) -> StoreResult<()> {
        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.db)
            .await?;
        Ok(())
    }
}

#[derive(Clone)]
pub struct PgConversationStore {
    db: PgPool,
}

impl PgConversationStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ConversationStore for PgConversationStore {
    async fn create(&self, user_id: Uuid, title: &str) -> StoreResult<Conversation> {
        let conversation = sqlx::query_as::<_, Conversation>(
            r#"
            INSERT INTO conversations (id, user_id, title)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(title)
        .fetch_one(&self.db)
        .await?;

        Ok(conversation)
    }

    async fn get(&self, id: Uuid) -> StoreResult<Option<Conversation>> {
        let conversation =
            sqlx::query_as::<_, Conversation>("SELECT * FROM conversations WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.db)
                .await?;

        Ok(conversation)
    }

    async fn list(&self, user_id: Uuid) -> StoreResult<Vec<Conversation>> {
        let conversations = sqlx::query_as::<_, Conversation>(
            r#"
            SELECT * FROM conversations
            WHERE user_id = $1
            ORDER BY updated_at DESC, created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.db)
        .await?;

        Ok(conversations)
    }

    async fn delete(&self, id: Uuid) -> StoreResult<bool> {
        // chat_messages rows go with it (ON DELETE CASCADE)
        let result = sqlx::query("DELETE FROM conversations WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn messages(&self, id: Uuid) -> StoreResult<Vec<ChatMessage>> {
        let messages = sqlx::query_as::<_, ChatMessage>(
            r#"
            SELECT id, conversation_id, sender, text, created_at
            FROM chat_messages
            WHERE conversation_id = $1
            ORDER BY seq ASC
            "#,
        )
        .bind(id)
        .fetch_all(&self.db)
        .await?;

        Ok(messages)
    }

    async fn append(&self, id: Uuid, message: NewChatMessage) -> StoreResult<ChatMessage> {
        let now = Utc::now();
        let mut tx = self.db.begin().await?;

        let touched = sqlx::query("UPDATE conversations SET updated_at = $2 WHERE id = $1")
            .bind(id)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        if touched.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }

        let stored = sqlx::query_as::<_, ChatMessage>(
            r#"
            INSERT INTO chat_messages (id, conversation_id, sender, text, created_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, conversation_id, sender, text, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(id)
        .bind(message.sender)
        .bind(&message.text)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(stored)
    }

    async fn rename(&self, id: Uuid, title: &str) -> StoreResult<bool> {
        let result = sqlx::query("UPDATE conversations SET title = $2 WHERE id = $1")
            .bind(id)
            .bind(title)
            .execute(&self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn ping(&self) -> StoreResult<()> {
        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.db)
            .await?;
        Ok(())
    }
}
