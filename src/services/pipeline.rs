//! The single entry point every message-handling route goes through.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use super::generator::{generate_with_retry, ReplySource, ResponseGenerator, RetryPolicy};
use super::tables::BASE_PERSONA_PROMPT;
use super::triage::{MoodSignal, ResponseMode, TriageDecision, TriagePolicy, CRISIS_MESSAGE};
use crate::dto::{HistoryTurn, MessageReply};
use crate::models::conversation::Sender;
use crate::models::emotion_event::NewEmotionEvent;
use crate::models::mood::{Mood, NewMoodEntry};
use crate::store::{EmotionEventLog, MoodStore};

/// How many earlier turns are quoted back to the generator.
pub const HISTORY_TURNS: usize = 5;

pub struct TriagePipeline {
    policy: Arc<TriagePolicy>,
    moods: Arc<dyn MoodStore>,
    events: Arc<dyn EmotionEventLog>,
    generator: Arc<dyn ResponseGenerator>,
    retry: RetryPolicy,
}

impl TriagePipeline {
    pub fn new(
        policy: Arc<TriagePolicy>,
        moods: Arc<dyn MoodStore>,
        events: Arc<dyn EmotionEventLog>,
        generator: Arc<dyn ResponseGenerator>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            policy,
            moods,
            events,
            generator,
            retry,
        }
    }

    /// Triage a message and record it. Record failures are logged and
    /// swallowed; the decision is returned either way.
    pub async fn evaluate(&self, user_id: Uuid, text: &str) -> TriageDecision {
        let decision = self.policy.decide(text).await;

        if let Err(e) = self
            .events
            .log(NewEmotionEvent {
                user_id,
                message: text.to_string(),
                emotion: decision.mood.as_str().to_string(),
                timestamp: None,
            })
            .await
        {
            tracing::warn!(user_id = %user_id, error = %e, "Failed to record emotion event");
        }

        if let Some(mood) = auto_log_mood(&decision) {
            let entry = NewMoodEntry {
                user_id,
                date: Utc::now().date_naive(),
                mood,
                note: None,
            };
            match self.moods.add(entry).await {
                Ok(id) => tracing::debug!(user_id = %user_id, entry_id = %id, mood = %mood, "Mood auto-logged"),
                Err(e) => tracing::warn!(user_id = %user_id, error = %e, "Failed to auto-log mood"),
            }
        }

        decision
    }

    /// Triage, then either the fixed crisis reply or a generated one.
    pub async fn respond(&self, user_id: Uuid, text: &str, history: &[HistoryTurn]) -> MessageReply {
        let decision = self.evaluate(user_id, text).await;

        let (reply, source, generation_error) = match decision.mode {
            ResponseMode::Crisis => (CRISIS_MESSAGE.to_string(), ReplySource::Crisis, None),
            ResponseMode::Therapeutic => {
                let fragment = decision.prompt_fragment.as_deref().unwrap_or_default();
                let prompt = compose_prompt(fragment, history, text);
                let generation =
                    generate_with_retry(self.generator.as_ref(), &prompt, self.retry).await;
                (generation.text, generation.source, generation.error)
            }
        };

        MessageReply {
            reply,
            source,
            decision,
            generation_error,
        }
    }
}

/// Therapeutic, non-neutral moods go into the mood history.
fn auto_log_mood(decision: &TriageDecision) -> Option<Mood> {
    match (decision.mode, decision.mood) {
        (ResponseMode::Therapeutic, MoodSignal::Detected(mood)) if mood != Mood::Neutral => {
            Some(mood)
        }
        _ => None,
    }
}

pub fn compose_prompt(fragment: &str, history: &[HistoryTurn], message: &str) -> String {
    let mut prompt = format!("{}{}\n\n", BASE_PERSONA_PROMPT, fragment);

    let skip = history.len().saturating_sub(HISTORY_TURNS);
    let recent: Vec<String> = history[skip..]
        .iter()
        .map(|turn| {
            let who = match turn.sender {
                Sender::User => "User",
                Sender::Bot | Sender::System => "AI",
            };
            format!("{}: {}", who, turn.text)
        })
        .collect();
    if !recent.is_empty() {
        prompt.push_str("Recent conversation:\n");
        prompt.push_str(&recent.join("\n"));
        prompt.push_str("\n\n");
    }

    prompt.push_str("User: ");
    prompt.push_str(message);
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::generator::testing::ScriptedGenerator;
    use crate::services::generator::FALLBACK_REPLY;
    use crate::services::triage::testing::keyword_policy;
    use crate::store::memory::{InMemoryEventLog, InMemoryMoodStore};
    use crate::store::{StoreError, StoreResult};
    use async_trait::async_trait;
    use std::time::Duration;

    struct Harness {
        pipeline: TriagePipeline,
        moods: Arc<InMemoryMoodStore>,
        events: Arc<InMemoryEventLog>,
        generator: Arc<ScriptedGenerator>,
    }

    fn harness(generator: ScriptedGenerator) -> Harness {
        let moods = Arc::new(InMemoryMoodStore::new());
        let events = Arc::new(InMemoryEventLog::new());
        let generator = Arc::new(generator);
        let pipeline = TriagePipeline::new(
            Arc::new(keyword_policy()),
            moods.clone(),
            events.clone(),
            generator.clone(),
            RetryPolicy {
                max_attempts: 2,
                delay: Duration::from_millis(1),
            },
        );
        Harness {
            pipeline,
            moods,
            events,
            generator,
        }
    }

    fn turn(sender: Sender, text: &str) -> HistoryTurn {
        HistoryTurn {
            sender,
            text: text.to_string(),
        }
    }

    #[tokio::test]
    async fn test_crisis_never_reaches_the_generator() {
        let h = harness(ScriptedGenerator::replying("should not be used"));
        let user = Uuid::new_v4();

        let reply = h.pipeline.respond(user, "I want to kill myself", &[]).await;

        assert_eq!(reply.decision.mode, ResponseMode::Crisis);
        assert_eq!(reply.decision.resources.len(), 5);
        assert_eq!(reply.source, ReplySource::Crisis);
        assert_eq!(reply.reply, CRISIS_MESSAGE);
        assert_eq!(h.generator.calls(), 0);

        let events = h.events.recent(user, 10).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].emotion, "distress");
        assert!(h.moods.query(user, None, None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_crisis_reply_survives_a_dead_generator() {
        let h = harness(ScriptedGenerator::failing());
        let reply = h
            .pipeline
            .respond(Uuid::new_v4(), "I feel hopeless and trapped", &[])
            .await;

        assert_eq!(reply.source, ReplySource::Crisis);
        assert!(reply.generation_error.is_none());
        assert_eq!(h.generator.calls(), 0);
    }

    #[tokio::test]
    async fn test_happy_message_is_generated_and_logged() {
        let h = harness(ScriptedGenerator::replying("That's wonderful to hear!"));
        let user = Uuid::new_v4();

        let reply = h.pipeline.respond(user, "I am so happy today", &[]).await;

        assert_eq!(reply.decision.mode, ResponseMode::Therapeutic);
        assert_eq!(reply.decision.mood, MoodSignal::Detected(Mood::Happy));
        assert_eq!(reply.decision.wellness_score, 85);
        assert!(!reply.decision.show_resources);
        assert_eq!(reply.source, ReplySource::Generated);
        assert_eq!(reply.reply, "That's wonderful to hear!");
        assert_eq!(h.generator.calls(), 1);

        let logged = h.moods.query(user, None, None).await.unwrap();
        assert_eq!(logged.len(), 1);
        assert_eq!(logged[0].mood, Mood::Happy);
        assert_eq!(logged[0].date, Utc::now().date_naive());

        let events = h.events.recent(user, 10).await.unwrap();
        assert_eq!(events[0].emotion, "happy");
        assert_eq!(events[0].message, "I am so happy today");
    }

    #[tokio::test]
    async fn test_neutral_message_skips_mood_history() {
        let h = harness(ScriptedGenerator::replying("Tell me more."));
        let user = Uuid::new_v4();

        let decision = h.pipeline.evaluate(user, "went to the shop").await;

        assert_eq!(decision.mood, MoodSignal::Detected(Mood::Neutral));
        assert!(h.moods.query(user, None, None).await.unwrap().is_empty());
        assert_eq!(h.events.recent(user, 10).await.unwrap().len(), 1);
        // evaluate alone never generates.
        assert_eq!(h.generator.calls(), 0);
    }

    #[tokio::test]
    async fn test_generator_outage_falls_back() {
        let h = harness(ScriptedGenerator::failing());
        let reply = h
            .pipeline
            .respond(Uuid::new_v4(), "so sad about the move", &[])
            .await;

        assert_eq!(reply.source, ReplySource::Fallback);
        assert_eq!(reply.reply, FALLBACK_REPLY);
        assert!(reply.generation_error.is_some());
        assert!(reply.decision.show_resources);
        assert_eq!(h.generator.calls(), 2);
    }

    #[tokio::test]
    async fn test_prompt_carries_persona_tone_and_history() {
        let h = harness(ScriptedGenerator::replying("ok"));
        let history: Vec<HistoryTurn> = (0..7)
            .map(|i| {
                let sender = if i % 2 == 0 { Sender::User } else { Sender::Bot };
                turn(sender, &format!("turn {}", i))
            })
            .collect();

        h.pipeline
            .respond(Uuid::new_v4(), "worried about tomorrow", &history)
            .await;

        let prompts = h.generator.prompts.lock().unwrap();
        let prompt = &prompts[0];
        assert!(prompt.starts_with(BASE_PERSONA_PROMPT));
        assert!(prompt.contains("The user is feeling anxious"));
        assert!(!prompt.contains("turn 1\n"));
        assert!(prompt.contains("User: turn 2"));
        assert!(prompt.contains("AI: turn 5"));
        assert!(prompt.ends_with("User: worried about tomorrow"));
    }

    #[test]
    fn test_compose_prompt_without_history() {
        let prompt = compose_prompt("\nBe kind.\n", &[], "hi");
        assert!(!prompt.contains("Recent conversation"));
        assert!(prompt.ends_with("Be kind.\n\n\nUser: hi"));
    }

    struct DownStore;

    #[async_trait]
    impl EmotionEventLog for DownStore {
        async fn log(&self, _event: NewEmotionEvent) -> StoreResult<Uuid> {
            Err(StoreError::Unavailable(anyhow::anyhow!("connection refused")))
        }

        async fn recent(
            &self,
            _user_id: Uuid,
            _limit: usize,
        ) -> StoreResult<Vec<crate::models::emotion_event::EmotionEvent>> {
            Err(StoreError::Unavailable(anyhow::anyhow!("connection refused")))
        }

        async fn ping(&self) -> StoreResult<()> {
            Err(StoreError::Unavailable(anyhow::anyhow!("connection refused")))
        }
    }

    #[tokio::test]
    async fn test_event_log_outage_does_not_block_crisis_reply() {
        let generator = Arc::new(ScriptedGenerator::default());
        let pipeline = TriagePipeline::new(
            Arc::new(keyword_policy()),
            Arc::new(InMemoryMoodStore::new()),
            Arc::new(DownStore),
            generator.clone(),
            RetryPolicy::default(),
        );

        let reply = pipeline
            .respond(Uuid::new_v4(), "thinking about an overdose", &[])
            .await;
        assert_eq!(reply.decision.mode, ResponseMode::Crisis);
        assert_eq!(generator.calls(), 0);
    }
}
