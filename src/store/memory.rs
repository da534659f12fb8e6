use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use super::{ConversationStore, EmotionEventLog, MoodStore, StoreError, StoreResult};
use crate::models::conversation::{ChatMessage, Conversation, NewChatMessage};
use crate::models::emotion_event::{EmotionEvent, NewEmotionEvent};
use crate::models::mood::{MoodEntry, NewMoodEntry, UpdateMoodRequest};

type Partition<T> = Arc<Mutex<Vec<T>>>;

/// Rows split by owner. Each user's rows sit behind their own lock; the
/// shared maps are held only to find a partition or record a row's owner.
struct Partitions<T> {
    users: RwLock<HashMap<Uuid, Partition<T>>>,
    owners: RwLock<HashMap<Uuid, Uuid>>,
}

impl<T> Default for Partitions<T> {
    fn default() -> Self {
        Self {
            users: RwLock::new(HashMap::new()),
            owners: RwLock::new(HashMap::new()),
        }
    }
}

impl<T> Partitions<T> {
    /// The user's partition, created on first use.
    async fn partition(&self, user_id: Uuid) -> Partition<T> {
        if let Some(partition) = self.users.read().await.get(&user_id) {
            return partition.clone();
        }
        self.users
            .write()
            .await
            .entry(user_id)
            .or_insert_with(|| Arc::new(Mutex::new(Vec::new())))
            .clone()
    }

    async fn existing(&self, user_id: Uuid) -> Option<Partition<T>> {
        self.users.read().await.get(&user_id).cloned()
    }

    async fn remember(&self, id: Uuid, user_id: Uuid) {
        self.owners.write().await.insert(id, user_id);
    }

    async fn forget(&self, id: Uuid) {
        self.owners.write().await.remove(&id);
    }

    /// Partition holding the row with this id, if any.
    async fn holding(&self, id: Uuid) -> Option<Partition<T>> {
        let user_id = *self.owners.read().await.get(&id)?;
        self.existing(user_id).await
    }
}

/// Process-local mood history for development and tests.
/// Entries are kept in insertion order within each user's partition.
#[derive(Clone, Default)]
pub struct InMemoryMoodStore {
    rows: Arc<Partitions<MoodEntry>>,
}

impl InMemoryMoodStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MoodStore for InMemoryMoodStore {
    async fn add(&self, entry: NewMoodEntry) -> StoreResult<Uuid> {
        let id = Uuid::new_v4();
        self.rows.remember(id, entry.user_id).await;
        self.rows
            .partition(entry.user_id)
            .await
            .lock()
            .await
            .push(MoodEntry {
                id,
                user_id: entry.user_id,
                date: entry.date,
                mood: entry.mood,
                note: entry.note,
                created_at: Utc::now(),
            });
        Ok(id)
    }

    async fn get(&self, id: Uuid) -> StoreResult<Option<MoodEntry>> {
        let Some(partition) = self.rows.holding(id).await else {
            return Ok(None);
        };
        let entries = partition.lock().await;
        Ok(entries.iter().find(|e| e.id == id).cloned())
    }

    async fn update(&self, id: Uuid, changes: UpdateMoodRequest) -> StoreResult<Option<MoodEntry>> {
        let Some(partition) = self.rows.holding(id).await else {
            return Ok(None);
        };
        let mut entries = partition.lock().await;
        let Some(entry) = entries.iter_mut().find(|e| e.id == id) else {
            return Ok(None);
        };

        if let Some(mood) = changes.mood {
            entry.mood = mood;
        }
        if let Some(note) = changes.note {
            entry.note = Some(note);
        }
        Ok(Some(entry.clone()))
    }

    async fn delete(&self, id: Uuid) -> StoreResult<bool> {
        let Some(partition) = self.rows.holding(id).await else {
            return Ok(false);
        };
        let removed = {
            let mut entries = partition.lock().await;
            let before = entries.len();
            entries.retain(|e| e.id != id);
            entries.len() != before
        };
        if removed {
            self.rows.forget(id).await;
        }
        Ok(removed)
    }

    async fn query(
        &self,
        user_id: Uuid,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> StoreResult<Vec<MoodEntry>> {
        let Some(partition) = self.rows.existing(user_id).await else {
            return Ok(Vec::new());
        };
        let entries = partition.lock().await;
        // Newest insert first, then a stable sort keeps that order within a day.
        let mut matched: Vec<MoodEntry> = entries
            .iter()
            .rev()
            .filter(|e| start_date.map_or(true, |start| e.date >= start))
            .filter(|e| end_date.map_or(true, |end| e.date <= end))
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.date.cmp(&a.date));
        Ok(matched)
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct InMemoryEventLog {
    rows: Arc<Partitions<EmotionEvent>>,
}

impl InMemoryEventLog {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EmotionEventLog for InMemoryEventLog {
    async fn log(&self, event: NewEmotionEvent) -> StoreResult<Uuid> {
        let id = Uuid::new_v4();
        self.rows
            .partition(event.user_id)
            .await
            .lock()
            .await
            .push(EmotionEvent {
                id,
                user_id: event.user_id,
                message: event.message,
                emotion: event.emotion,
                timestamp: event.timestamp.unwrap_or_else(Utc::now),
            });
        Ok(id)
    }

    async fn recent(&self, user_id: Uuid, limit: usize) -> StoreResult<Vec<EmotionEvent>> {
        let Some(partition) = self.rows.existing(user_id).await else {
            return Ok(Vec::new());
        };
        let events = partition.lock().await;
        let mut matched: Vec<EmotionEvent> = events.iter().rev().cloned().collect();
        matched.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        matched.truncate(limit);
        Ok(matched)
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}

struct StoredConversation {
    conversation: Conversation,
    messages: Vec<ChatMessage>,
}

#[derive(Clone, Default)]
pub struct InMemoryConversationStore {
    rows: Arc<Partitions<StoredConversation>>,
}

impl InMemoryConversationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConversationStore for InMemoryConversationStore {
    async fn create(&self, user_id: Uuid, title: &str) -> StoreResult<Conversation> {
        let now = Utc::now();
        let conversation = Conversation {
            id: Uuid::new_v4(),
            user_id,
            title: title.to_string(),
            created_at: now,
            updated_at: now,
        };

        self.rows.remember(conversation.id, user_id).await;
        self.rows
            .partition(user_id)
            .await
            .lock()
            .await
            .push(StoredConversation {
                conversation: conversation.clone(),
                messages: Vec::new(),
            });
        Ok(conversation)
    }

    async fn get(&self, id: Uuid) -> StoreResult<Option<Conversation>> {
        let Some(partition) = self.rows.holding(id).await else {
            return Ok(None);
        };
        let stored = partition.lock().await;
        Ok(stored
            .iter()
            .find(|s| s.conversation.id == id)
            .map(|s| s.conversation.clone()))
    }

    async fn list(&self, user_id: Uuid) -> StoreResult<Vec<Conversation>> {
        let Some(partition) = self.rows.existing(user_id).await else {
            return Ok(Vec::new());
        };
        let stored = partition.lock().await;
        let mut conversations: Vec<Conversation> = stored
            .iter()
            .rev()
            .map(|s| s.conversation.clone())
            .collect();
        conversations.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(conversations)
    }

    async fn delete(&self, id: Uuid) -> StoreResult<bool> {
        let Some(partition) = self.rows.holding(id).await else {
            return Ok(false);
        };
        let removed = {
            let mut stored = partition.lock().await;
            let before = stored.len();
            stored.retain(|s| s.conversation.id != id);
            stored.len() != before
        };
        if removed {
            self.rows.forget(id).await;
        }
        Ok(removed)
    }

    async fn messages(&self, id: Uuid) -> StoreResult<Vec<ChatMessage>> {
        let Some(partition) = self.rows.holding(id).await else {
            return Ok(Vec::new());
        };
        let stored = partition.lock().await;
        Ok(stored
            .iter()
            .find(|s| s.conversation.id == id)
            .map(|s| s.messages.clone())
            .unwrap_or_default())
    }

    async fn append(&self, id: Uuid, message: NewChatMessage) -> StoreResult<ChatMessage> {
        let partition = self.rows.holding(id).await.ok_or(StoreError::NotFound)?;
        let mut stored = partition.lock().await;
        let entry = stored
            .iter_mut()
            .find(|s| s.conversation.id == id)
            .ok_or(StoreError::NotFound)?;

        let message = ChatMessage {
            id: Uuid::new_v4(),
            conversation_id: id,
            sender: message.sender,
            text: message.text,
            created_at: Utc::now(),
        };
        entry.conversation.updated_at = message.created_at;
        entry.messages.push(message.clone());
        Ok(message)
    }

    async fn rename(&self, id: Uuid, title: &str) -> StoreResult<bool> {
        let Some(partition) = self.rows.holding(id).await else {
            return Ok(false);
        };
        let mut stored = partition.lock().await;
        match stored.iter_mut().find(|s| s.conversation.id == id) {
            Some(entry) => {
                entry.conversation.title = title.to_string();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}
