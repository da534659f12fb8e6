use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

/// Closed mood vocabulary shared by the classifier, the triage tables and the
/// mood history.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, Hash)]
#[sqlx(type_name = "mood_label", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Mood {
    Happy,
    Excited,
    Neutral,
    Anxious,
    Sad,
    Angry,
}

impl Mood {
    pub const ALL: [Mood; 6] = [
        Mood::Happy,
        Mood::Excited,
        Mood::Neutral,
        Mood::Anxious,
        Mood::Sad,
        Mood::Angry,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Mood::Happy => "happy",
            Mood::Excited => "excited",
            Mood::Neutral => "neutral",
            Mood::Anxious => "anxious",
            Mood::Sad => "sad",
            Mood::Angry => "angry",
        }
    }

    /// Strict parse. Returns `None` for anything outside the vocabulary.
    pub fn parse(label: &str) -> Option<Mood> {
        let label = label.trim().to_lowercase();
        Mood::ALL.into_iter().find(|m| m.as_str() == label)
    }
}

impl Default for Mood {
    fn default() -> Self {
        Self::Neutral
    }
}

impl std::fmt::Display for Mood {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct MoodEntry {
    pub id: Uuid,
    pub user_id: Uuid,
    pub date: NaiveDate,
    pub mood: Mood,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Everything needed to append an entry; the store assigns `id` and
/// `created_at`.
#[derive(Debug, Clone)]
pub struct NewMoodEntry {
    pub user_id: Uuid,
    pub date: NaiveDate,
    pub mood: Mood,
    pub note: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateMoodRequest {
    pub date: Option<NaiveDate>,
    pub mood: Mood,
    #[validate(length(max = 1000, message = "Note must be at most 1000 characters"))]
    pub note: Option<String>,
}

/// Partial update, only supplied fields change.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateMoodRequest {
    pub mood: Option<Mood>,
    #[validate(length(max = 1000, message = "Note must be at most 1000 characters"))]
    pub note: Option<String>,
}

impl UpdateMoodRequest {
    pub fn is_empty(&self) -> bool {
        self.mood.is_none() && self.note.is_none()
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct MoodQuery {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl MoodQuery {
    /// Both bounds are inclusive; a reversed range is a caller error.
    pub fn is_reversed(&self) -> bool {
        matches!((self.start_date, self.end_date), (Some(start), Some(end)) if start > end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!(Mood::parse("SAD"), Some(Mood::Sad));
        assert_eq!(Mood::parse(" Excited "), Some(Mood::Excited));
    }

    #[test]
    fn test_unknown_label_is_rejected() {
        assert_eq!(Mood::parse("melancholy"), None);
        assert_eq!(Mood::parse(""), None);
    }

    #[test]
    fn test_reversed_range_detection() {
        let day = |s: &str| NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap();
        let query = MoodQuery {
            start_date: Some(day("2024-02-01")),
            end_date: Some(day("2024-01-01")),
        };
        assert!(query.is_reversed());
        assert!(!MoodQuery::default().is_reversed());
        assert!(!MoodQuery {
            start_date: Some(day("2024-01-01")),
            end_date: Some(day("2024-01-01")),
        }
        .is_reversed());
    }

    #[test]
    fn test_serde_uses_lowercase_labels() {
        let json = serde_json::to_string(&Mood::Anxious).unwrap();
        assert_eq!(json, "\"anxious\"");
        let back: Mood = serde_json::from_str("\"angry\"").unwrap();
        assert_eq!(back, Mood::Angry);
    }
}
