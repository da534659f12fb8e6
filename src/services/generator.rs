use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use crate::config::Config;

/// Sent when the generator gives nothing usable after all attempts.
pub const FALLBACK_REPLY: &str = "I'm here with you, but I'm having trouble finding the right words \
right now. Could you tell me a little more about what's on your mind?";

/// Opaque text-completion collaborator.
#[async_trait]
pub trait ResponseGenerator: Send + Sync {
    async fn generate_text(&self, prompt: &str) -> anyhow::Result<String>;
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_attempts: config.generator_max_attempts,
            delay: config.generator_retry_delay(),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            delay: Duration::from_millis(500),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ReplySource {
    Generated,
    Fallback,
    Crisis,
}

#[derive(Debug, Clone)]
pub struct Generation {
    pub text: String,
    pub source: ReplySource,
    /// Last failure, kept for diagnostics when the fallback was used.
    pub error: Option<String>,
}

/// Calls the generator up to `max_attempts` times with a fixed pause between
/// attempts, then settles for [`FALLBACK_REPLY`]. Never fails.
pub async fn generate_with_retry(
    generator: &dyn ResponseGenerator,
    prompt: &str,
    policy: RetryPolicy,
) -> Generation {
    let attempts = policy.max_attempts.max(1);
    let mut last_error = None;

    for attempt in 1..=attempts {
        match generator.generate_text(prompt).await {
            Ok(text) if !text.trim().is_empty() => {
                return Generation {
                    text: text.trim().to_string(),
                    source: ReplySource::Generated,
                    error: None,
                };
            }
            Ok(_) => last_error = Some("generator returned empty text".to_string()),
            Err(e) => last_error = Some(e.to_string()),
        }

        tracing::warn!(
            attempt,
            max_attempts = attempts,
            error = last_error.as_deref().unwrap_or_default(),
            "Response generation failed"
        );
        if attempt < attempts {
            tokio::time::sleep(policy.delay).await;
        }
    }

    Generation {
        text: FALLBACK_REPLY.to_string(),
        source: ReplySource::Fallback,
        error: last_error,
    }
}

pub struct ClaudeGenerator {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
}

impl ClaudeGenerator {
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        // Bounded per-attempt timeout so a hung provider can't stall a reply.
        let client = reqwest::Client::builder()
            .timeout(config.generator_timeout())
            .build()?;

        Ok(Self {
            client,
            api_url: config.claude_api_url.trim_end_matches('/').to_string(),
            api_key: config.claude_api_key.clone(),
            model: config.claude_model.clone(),
        })
    }
}

#[async_trait]
impl ResponseGenerator for ClaudeGenerator {
    async fn generate_text(&self, prompt: &str) -> anyhow::Result<String> {
        if self.api_key.is_empty() {
            anyhow::bail!("CLAUDE_API_KEY is not configured");
        }

        let response = self
            .client
            .post(format!("{}/v1/messages", self.api_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&serde_json::json!({
                "model": self.model,
                "max_tokens": 1024,
                "messages": [{
                    "role": "user",
                    "content": prompt
                }]
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Claude API error {}: {}", status, body);
        }

        let claude_response: serde_json::Value = response.json().await?;
        claude_response["content"][0]["text"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| anyhow::anyhow!("Claude API response had no text content"))
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Replays scripted outcomes and counts invocations. Once the script runs
    /// out it keeps answering with a canned reply.
    #[derive(Default)]
    pub struct ScriptedGenerator {
        script: Mutex<VecDeque<anyhow::Result<String>>>,
        calls: AtomicUsize,
        pub prompts: Mutex<Vec<String>>,
    }

    impl ScriptedGenerator {
        pub fn replying(reply: &str) -> Self {
            let generator = Self::default();
            generator.push(Ok(reply.to_string()));
            generator
        }

        pub fn failing() -> Self {
            let generator = Self::default();
            for _ in 0..8 {
                generator.push(Err(anyhow::anyhow!("provider timed out")));
            }
            generator
        }

        pub fn push(&self, outcome: anyhow::Result<String>) {
            self.script.lock().unwrap().push_back(outcome);
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ResponseGenerator for ScriptedGenerator {
        async fn generate_text(&self, prompt: &str) -> anyhow::Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok("Thanks for sharing that with me.".to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::ScriptedGenerator;
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn quick() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 2,
            delay: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn test_first_attempt_success() {
        let generator = ScriptedGenerator::replying("  You're doing your best.  ");
        let generation = generate_with_retry(&generator, "prompt", quick()).await;

        assert_eq!(generation.source, ReplySource::Generated);
        assert_eq!(generation.text, "You're doing your best.");
        assert_eq!(generator.calls(), 1);
    }

    #[tokio::test]
    async fn test_retries_once_then_succeeds() {
        let generator = ScriptedGenerator::default();
        generator.push(Err(anyhow::anyhow!("503")));
        generator.push(Ok("Second time lucky.".into()));

        let generation = generate_with_retry(&generator, "prompt", quick()).await;
        assert_eq!(generation.source, ReplySource::Generated);
        assert_eq!(generation.text, "Second time lucky.");
        assert_eq!(generator.calls(), 2);
    }

    #[tokio::test]
    async fn test_falls_back_after_two_attempts() {
        let generator = ScriptedGenerator::failing();
        let generation = generate_with_retry(&generator, "prompt", quick()).await;

        assert_eq!(generation.source, ReplySource::Fallback);
        assert_eq!(generation.text, FALLBACK_REPLY);
        assert_eq!(generation.error.as_deref(), Some("provider timed out"));
        assert_eq!(generator.calls(), 2);
    }

    #[tokio::test]
    async fn test_empty_text_counts_as_failure() {
        let generator = ScriptedGenerator::default();
        generator.push(Ok("   ".into()));
        generator.push(Ok(String::new()));

        let generation = generate_with_retry(&generator, "prompt", quick()).await;
        assert_eq!(generation.source, ReplySource::Fallback);
        assert_eq!(generator.calls(), 2);
    }

    fn claude_config(url: &str, key: &str) -> Config {
        Config::from_lookup(|k| match k {
            "JWT_SECRET" => Some("test".into()),
            "STORE_BACKEND" => Some("memory".into()),
            "CLAUDE_API_URL" => Some(url.to_string()),
            "CLAUDE_API_KEY" => Some(key.to_string()),
            _ => None,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_claude_generator_reads_first_text_block() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .and(header("x-api-key", "sk-test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "content": [{"type": "text", "text": "It's okay to feel that way."}]
            })))
            .mount(&mock_server)
            .await;

        let generator = ClaudeGenerator::from_config(&claude_config(&mock_server.uri(), "sk-test"))
            .unwrap();
        let text = generator.generate_text("hello").await.unwrap();
        assert_eq!(text, "It's okay to feel that way.");
    }

    #[tokio::test]
    async fn test_claude_generator_error_status_falls_back() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .respond_with(ResponseTemplate::new(529).set_body_string("overloaded"))
            .expect(2)
            .mount(&mock_server)
            .await;

        let generator = ClaudeGenerator::from_config(&claude_config(&mock_server.uri(), "sk-test"))
            .unwrap();
        let generation = generate_with_retry(&generator, "hello", quick()).await;

        assert_eq!(generation.source, ReplySource::Fallback);
        assert!(generation.error.unwrap().contains("529"));
    }

    #[tokio::test]
    async fn test_missing_api_key_fails_without_network() {
        let generator =
            ClaudeGenerator::from_config(&claude_config("http://127.0.0.1:9", "")).unwrap();
        assert!(generator.generate_text("hello").await.is_err());
    }
}
