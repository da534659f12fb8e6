//! Triage: decide between the deterministic crisis response and a generated
//! supportive reply, before anything is sent to the generator.

use std::sync::Arc;

use serde::{Serialize, Serializer};

use super::catalog::ResourceCatalog;
use super::classifier::EmotionClassifier;
use super::crisis::CrisisDetector;
use super::tables::{
    mood_prompt_table, wellness_table, MoodTable, TableError, LOW_WELLNESS_THRESHOLD,
};
use crate::models::emotion_event::DISTRESS_LABEL;
use crate::models::mood::Mood;
use crate::models::resource::{CalmingTechnique, EmergencyResource};

/// Wellness reported for every crisis decision.
pub const CRISIS_WELLNESS_SCORE: u8 = 20;

pub const CRISIS_MESSAGE: &str = "I'm really concerned about what you've shared, and I'm glad \
you told me. You don't have to face this alone. Please reach out right now to one of the \
crisis lines below; they are free, confidential and available 24/7. If you are in immediate \
danger, call your local emergency number. While you reach out, the grounding exercises below \
can help you get through the next few minutes.";

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResponseMode {
    Crisis,
    Therapeutic,
}

/// Mood as reported by triage. Crisis decisions carry a distress marker that
/// sits outside the normal vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoodSignal {
    Detected(Mood),
    Distress,
}

impl MoodSignal {
    pub fn as_str(&self) -> &'static str {
        match self {
            MoodSignal::Detected(mood) => mood.as_str(),
            MoodSignal::Distress => DISTRESS_LABEL,
        }
    }
}

impl Serialize for MoodSignal {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TriageDecision {
    pub mode: ResponseMode,
    pub mood: MoodSignal,
    pub wellness_score: u8,
    /// Tone instruction for the generator. Absent on the crisis path.
    pub prompt_fragment: Option<String>,
    /// Keyword signal.
    pub is_crisis: bool,
    /// Score signal: crisis, or wellness below the low threshold.
    pub show_resources: bool,
    pub resources: Vec<EmergencyResource>,
    pub calming_techniques: Vec<CalmingTechnique>,
}

pub struct TriagePolicy {
    detector: Arc<CrisisDetector>,
    classifier: Arc<EmotionClassifier>,
    catalog: Arc<ResourceCatalog>,
    wellness: MoodTable<u8>,
    prompts: MoodTable<&'static str>,
}

impl TriagePolicy {
    pub fn new(
        detector: Arc<CrisisDetector>,
        classifier: Arc<EmotionClassifier>,
        catalog: Arc<ResourceCatalog>,
    ) -> Result<Self, TableError> {
        Ok(Self {
            detector,
            classifier,
            catalog,
            wellness: wellness_table()?,
            prompts: mood_prompt_table()?,
        })
    }

    pub fn wellness_score(&self, mood: Mood) -> u8 {
        *self.wellness.get(mood)
    }

    /// Score for a recorded emotion label. The distress marker scores like a
    /// crisis decision; other labels outside the vocabulary get the default.
    pub fn wellness_score_for_label(&self, label: &str) -> u8 {
        if label == DISTRESS_LABEL {
            return CRISIS_WELLNESS_SCORE;
        }
        *self.wellness.get_label(label)
    }

    pub fn prompt_fragment(&self, mood: Mood) -> &'static str {
        self.prompts.get(mood)
    }

    pub async fn decide(&self, text: &str) -> TriageDecision {
        if self.detector.is_crisis(text) {
            return self.crisis_decision();
        }

        let mood = self.classifier.classify(text).await;
        let wellness_score = self.wellness_score(mood);
        let show_resources = wellness_score < LOW_WELLNESS_THRESHOLD;

        let (resources, calming_techniques) = if show_resources {
            (self.catalog.crisis_resources(), self.catalog.techniques())
        } else {
            (Vec::new(), Vec::new())
        };

        TriageDecision {
            mode: ResponseMode::Therapeutic,
            mood: MoodSignal::Detected(mood),
            wellness_score,
            prompt_fragment: Some(self.prompt_fragment(mood).to_string()),
            is_crisis: false,
            show_resources,
            resources,
            calming_techniques,
        }
    }

    fn crisis_decision(&self) -> TriageDecision {
        TriageDecision {
            mode: ResponseMode::Crisis,
            mood: MoodSignal::Distress,
            wellness_score: CRISIS_WELLNESS_SCORE,
            prompt_fragment: None,
            is_crisis: true,
            show_resources: true,
            resources: self.catalog.crisis_resources(),
            calming_techniques: self.catalog.techniques(),
        }
    }
}
