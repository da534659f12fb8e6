use std::cmp::Reverse;
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::tables::{wellness_table, MoodTable, TableError};
use crate::models::mood::{CreateMoodRequest, Mood, MoodEntry, NewMoodEntry, UpdateMoodRequest};
use crate::store::{MoodStore, StoreError, StoreResult};

#[derive(Debug, Serialize, PartialEq)]
pub struct MoodCount {
    pub mood: Mood,
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct MoodSummary {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub total_entries: usize,
    /// One row per mood in vocabulary order, zeros included.
    pub counts: Vec<MoodCount>,
    pub dominant_mood: Option<Mood>,
    pub average_wellness: Option<u8>,
}

/// Caller-scoped mood history operations. Every read or write of an existing
/// entry checks that it belongs to the caller.
pub struct MoodService {
    store: Arc<dyn MoodStore>,
    wellness: MoodTable<u8>,
}

impl MoodService {
    pub fn new(store: Arc<dyn MoodStore>) -> Result<Self, TableError> {
        Ok(Self {
            store,
            wellness: wellness_table()?,
        })
    }

    async fn owned(&self, caller: Uuid, id: Uuid) -> StoreResult<MoodEntry> {
        let entry = self.store.get(id).await?.ok_or(StoreError::NotFound)?;
        if entry.user_id != caller {
            tracing::warn!(user_id = %caller, entry_id = %id, "Mood entry access denied");
            return Err(StoreError::Unauthorized);
        }
        Ok(entry)
    }

    pub async fn record_mood(&self, caller: Uuid, req: CreateMoodRequest) -> StoreResult<MoodEntry> {
        let id = self
            .store
            .add(NewMoodEntry {
                user_id: caller,
                date: req.date.unwrap_or_else(|| Utc::now().date_naive()),
                mood: req.mood,
                note: req.note,
            })
            .await?;

        self.store.get(id).await?.ok_or(StoreError::NotFound)
    }

    pub async fn get_mood(&self, caller: Uuid, id: Uuid) -> StoreResult<MoodEntry> {
        self.owned(caller, id).await
    }

    pub async fn list_moods(
        &self,
        caller: Uuid,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> StoreResult<Vec<MoodEntry>> {
        self.store.query(caller, start_date, end_date).await
    }

    pub async fn update_mood(
        &self,
        caller: Uuid,
        id: Uuid,
        changes: UpdateMoodRequest,
    ) -> StoreResult<MoodEntry> {
        let existing = self.owned(caller, id).await?;
        if changes.is_empty() {
            return Ok(existing);
        }
        self.store
            .update(id, changes)
            .await?
            .ok_or(StoreError::NotFound)
    }

    pub async fn delete_mood(&self, caller: Uuid, id: Uuid) -> StoreResult<()> {
        self.owned(caller, id).await?;
        if !self.store.delete(id).await? {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    pub async fn mood_summary(
        &self,
        caller: Uuid,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> StoreResult<MoodSummary> {
        let entries = self.store.query(caller, start_date, end_date).await?;

        let counts: Vec<MoodCount> = Mood::ALL
            .into_iter()
            .map(|mood| MoodCount {
                mood,
                count: entries.iter().filter(|e| e.mood == mood).count(),
            })
            .collect();

        // Ties go to the lower-wellness mood so a bad stretch isn't hidden.
        let dominant_mood = counts
            .iter()
            .filter(|c| c.count > 0)
            .max_by_key(|c| (c.count, Reverse(*self.wellness.get(c.mood))))
            .map(|c| c.mood);

        let average_wellness = if entries.is_empty() {
            None
        } else {
            let total: u32 = entries
                .iter()
                .map(|e| u32::from(*self.wellness.get(e.mood)))
                .sum();
            Some((total as f64 / entries.len() as f64).round() as u8)
        };

        Ok(MoodSummary {
            start_date,
            end_date,
            total_entries: entries.len(),
            counts,
            dominant_mood,
            average_wellness,
        })
    }
}
