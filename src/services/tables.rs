//! Mood-keyed lookup tables used by triage: wellness scores and persona tone
//! fragments. Tables must cover the whole vocabulary; construction fails
//! otherwise.

use std::collections::HashMap;

use crate::models::mood::Mood;

/// Score reported for any label outside the mood vocabulary.
pub const DEFAULT_WELLNESS_SCORE: u8 = 60;

/// Scores below this raise the secondary `show_resources` signal.
pub const LOW_WELLNESS_THRESHOLD: u8 = 40;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum TableError {
    #[error("{table} table has no entry for mood '{mood}'")]
    MissingMood { table: &'static str, mood: Mood },

    #[error("{table} table lists mood '{mood}' twice")]
    DuplicateMood { table: &'static str, mood: Mood },
}

#[derive(Debug, Clone)]
pub struct MoodTable<T> {
    entries: HashMap<Mood, T>,
    fallback: T,
}

impl<T> MoodTable<T> {
    pub fn try_new(
        table: &'static str,
        entries: impl IntoIterator<Item = (Mood, T)>,
        fallback: T,
    ) -> Result<Self, TableError> {
        let mut map = HashMap::new();
        for (mood, value) in entries {
            if map.insert(mood, value).is_some() {
                return Err(TableError::DuplicateMood { table, mood });
            }
        }
        if let Some(mood) = Mood::ALL.into_iter().find(|m| !map.contains_key(m)) {
            return Err(TableError::MissingMood { table, mood });
        }

        Ok(Self {
            entries: map,
            fallback,
        })
    }

    pub fn get(&self, mood: Mood) -> &T {
        self.entries.get(&mood).unwrap_or(&self.fallback)
    }

    /// Looks up a raw label; anything outside the vocabulary gets the fallback.
    pub fn get_label(&self, label: &str) -> &T {
        Mood::parse(label)
            .map(|mood| self.get(mood))
            .unwrap_or(&self.fallback)
    }
}

pub fn wellness_table() -> Result<MoodTable<u8>, TableError> {
    MoodTable::try_new(
        "wellness",
        [
            (Mood::Happy, 85),
            (Mood::Excited, 90),
            (Mood::Neutral, 70),
            (Mood::Anxious, 40),
            (Mood::Sad, 30),
            (Mood::Angry, 35),
        ],
        DEFAULT_WELLNESS_SCORE,
    )
}

pub const BASE_PERSONA_PROMPT: &str = "\
You are a calm, empathetic mental health companion. Your responses should be:
- Warm and supportive, using phrases like \"It's okay to feel that way\" or \"You're doing your best\"
- Non-judgmental and validating of the user's feelings
- Thoughtful but concise
- Focused on helping the user explore their thoughts and feelings
- Encouraging and gentle in your approach

Always prioritize a compassionate tone while providing helpful guidance.
";

const HAPPY_PROMPT: &str = "
The user is feeling happy. While maintaining your supportive approach:
- Celebrate their positive emotions
- Help them savor this feeling
- Explore what's contributing to their happiness
- Encourage them to build on these positive experiences
";

const EXCITED_PROMPT: &str = "
The user is feeling excited. While maintaining your supportive approach:
- Share in their enthusiasm
- Help them channel this energy into something meaningful
- Ask what they are looking forward to
- Gently encourage balance if the excitement feels overwhelming
";

const NEUTRAL_PROMPT: &str = "
The user hasn't shown strong emotional signals. Maintain your general supportive approach and:
- Be attentive to emotional cues in their messages
- Adjust your tone as the conversation progresses
- Use open-ended questions to explore how they're feeling
";

const ANXIOUS_PROMPT: &str = "
The user is feeling anxious. While maintaining your supportive approach:
- Help them feel grounded with calm responses
- Acknowledge their anxiety without minimizing it
- Use reassuring phrases like \"Many people experience anxiety\"
- Suggest breathing or grounding techniques if appropriate
- Focus on what they can control in the present moment
";

const SAD_PROMPT: &str = "
The user is feeling sad. While maintaining your supportive approach:
- Be especially gentle and compassionate
- Validate that sadness is a normal human emotion
- Offer comfort with phrases like \"I hear how difficult this is for you\"
- Provide hope while acknowledging their current feelings
- Suggest small, manageable ways to care for themselves
";

const ANGRY_PROMPT: &str = "
The user is feeling angry. While maintaining your supportive approach:
- Acknowledge their anger as valid without judgment
- Help them express their feelings in a constructive way
- Use phrases like \"It makes sense that you feel this way\"
- Guide them toward understanding what's beneath the anger
- Offer perspective while respecting their emotions
";

pub fn mood_prompt_table() -> Result<MoodTable<&'static str>, TableError> {
    MoodTable::try_new(
        "mood prompt",
        [
            (Mood::Happy, HAPPY_PROMPT),
            (Mood::Excited, EXCITED_PROMPT),
            (Mood::Neutral, NEUTRAL_PROMPT),
            (Mood::Anxious, ANXIOUS_PROMPT),
            (Mood::Sad, SAD_PROMPT),
            (Mood::Angry, ANGRY_PROMPT),
        ],
        NEUTRAL_PROMPT,
    )
}
