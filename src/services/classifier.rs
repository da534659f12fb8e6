//! Emotion classification over a lazily loaded text-classification model.
//!
//! The model is loaded at most once per classifier (first caller wins, the
//! rest wait on the same initialisation) and shared by every later call.
//! Failures of any kind degrade to `Mood::Neutral`; nothing here returns an
//! error to the caller.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::OnceCell;

use crate::config::Config;
use crate::models::mood::Mood;

/// Inputs longer than this many characters are truncated before inference.
pub const MAX_INPUT_CHARS: usize = 512;

/// A loaded model. Returns one raw label per input, in input order.
#[async_trait]
pub trait EmotionModel: Send + Sync {
    async fn predict(&self, inputs: &[String]) -> anyhow::Result<Vec<String>>;
}

/// Builds the model. Expected to be slow; called through the classifier's
/// memoised accessor only.
#[async_trait]
pub trait ModelLoader: Send + Sync {
    async fn load(&self) -> anyhow::Result<Arc<dyn EmotionModel>>;
}

/// Maps the model's emotion labels onto the mood vocabulary.
pub fn mood_for_label(label: &str) -> Mood {
    match label.trim().to_lowercase().as_str() {
        "joy" => Mood::Happy,
        "surprise" => Mood::Excited,
        "neutral" => Mood::Neutral,
        "fear" => Mood::Anxious,
        "sadness" => Mood::Sad,
        "anger" | "disgust" => Mood::Angry,
        _ => Mood::Neutral,
    }
}

fn prepare(text: &str) -> Option<String> {
    if text.trim().is_empty() {
        return None;
    }
    Some(text.chars().take(MAX_INPUT_CHARS).collect())
}

pub struct EmotionClassifier {
    loader: Arc<dyn ModelLoader>,
    model: OnceCell<Arc<dyn EmotionModel>>,
}

impl EmotionClassifier {
    pub fn new(loader: Arc<dyn ModelLoader>) -> Self {
        Self {
            loader,
            model: OnceCell::new(),
        }
    }

    /// Memoised model accessor. A failed load leaves the cell empty so the
    /// next call tries again.
    async fn model(&self) -> anyhow::Result<&Arc<dyn EmotionModel>> {
        self.model
            .get_or_try_init(|| async {
                tracing::info!("Loading emotion model");
                let model = self.loader.load().await?;
                tracing::info!("Emotion model ready");
                Ok(model)
            })
            .await
    }

    async fn predict(&self, inputs: &[String]) -> anyhow::Result<Vec<Mood>> {
        let model = self.model().await?;
        let labels = model.predict(inputs).await?;
        if labels.len() != inputs.len() {
            bail!(
                "model returned {} labels for {} inputs",
                labels.len(),
                inputs.len()
            );
        }
        Ok(labels.iter().map(|l| mood_for_label(l)).collect())
    }

    pub async fn classify(&self, text: &str) -> Mood {
        let Some(input) = prepare(text) else {
            return Mood::Neutral;
        };

        match self.predict(&[input]).await {
            Ok(moods) => moods.into_iter().next().unwrap_or_default(),
            Err(e) => {
                tracing::warn!(error = %e, "Emotion classification failed, defaulting to neutral");
                Mood::Neutral
            }
        }
    }

    /// Order-preserving. Blank inputs are `Neutral` and never reach the model.
    pub async fn classify_batch<S>(&self, texts: &[S]) -> Vec<Mood>
    where
        S: AsRef<str> + Sync,
    {
        let mut moods = vec![Mood::Neutral; texts.len()];
        let (positions, inputs): (Vec<usize>, Vec<String>) = texts
            .iter()
            .enumerate()
            .filter_map(|(i, t)| prepare(t.as_ref()).map(|input| (i, input)))
            .unzip();

        if inputs.is_empty() {
            return moods;
        }

        match self.predict(&inputs).await {
            Ok(predicted) => {
                for (pos, mood) in positions.into_iter().zip(predicted) {
                    moods[pos] = mood;
                }
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    batch_size = texts.len(),
                    "Batch emotion classification failed, defaulting to neutral"
                );
            }
        }
        moods
    }
}

// ============================================================================
// Hosted inference endpoint (Hugging Face Inference API shape)
// ============================================================================

#[derive(Debug, Deserialize)]
struct LabelScore {
    label: String,
    score: f64,
}

pub struct InferenceApiModel {
    client: reqwest::Client,
    endpoint: String,
    token: Option<String>,
}

#[async_trait]
impl EmotionModel for InferenceApiModel {
    async fn predict(&self, inputs: &[String]) -> anyhow::Result<Vec<String>> {
        let mut request = self.client.post(&self.endpoint).json(&json!({
            "inputs": inputs,
            "options": { "wait_for_model": true },
        }));
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            bail!("Emotion model error {}: {}", status, body);
        }

        let scored: Vec<Vec<LabelScore>> = response.json().await?;
        scored
            .into_iter()
            .map(|candidates| {
                candidates
                    .into_iter()
                    .max_by(|a, b| a.score.total_cmp(&b.score))
                    .map(|top| top.label)
                    .context("model returned no labels for an input")
            })
            .collect()
    }
}

pub struct InferenceApiLoader {
    base_url: String,
    model: String,
    token: Option<String>,
    timeout: Duration,
}

impl InferenceApiLoader {
    pub fn new(base_url: &str, model: &str, token: Option<String>, timeout: Duration) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            token,
            timeout,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            &config.classifier_api_url,
            &config.classifier_model,
            config.hf_api_token.clone(),
            config.classifier_timeout(),
        )
    }
}

#[async_trait]
impl ModelLoader for InferenceApiLoader {
    async fn load(&self) -> anyhow::Result<Arc<dyn EmotionModel>> {
        let client = reqwest::Client::builder().timeout(self.timeout).build()?;
        let model = InferenceApiModel {
            client,
            endpoint: format!("{}/models/{}", self.base_url, self.model),
            token: self.token.clone(),
        };

        // First request makes the hosted model load; fail the init if it can't.
        model
            .predict(&["hello".to_string()])
            .await
            .context("Emotion model warm-up failed")?;

        Ok(Arc::new(model))
    }
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Echoes back input lengths so truncation is observable.
    struct LengthModel;

    #[async_trait]
    impl EmotionModel for LengthModel {
        async fn predict(&self, inputs: &[String]) -> anyhow::Result<Vec<String>> {
            Ok(inputs.iter().map(|i| i.chars().count().to_string()).collect())
        }
    }

    /// Records every input it sees.
    #[derive(Default)]
    struct RecordingModel {
        seen: std::sync::Mutex<Vec<String>>,
    }

    #[async_trait]
    impl EmotionModel for RecordingModel {
        async fn predict(&self, inputs: &[String]) -> anyhow::Result<Vec<String>> {
            self.seen.lock().unwrap().extend(inputs.iter().cloned());
            Ok(inputs.iter().map(|_| "joy".to_string()).collect())
        }
    }

    #[test]
    fn test_label_mapping_table() {
        assert_eq!(mood_for_label("joy"), Mood::Happy);
        assert_eq!(mood_for_label("surprise"), Mood::Excited);
        assert_eq!(mood_for_label("neutral"), Mood::Neutral);
        assert_eq!(mood_for_label("fear"), Mood::Anxious);
        assert_eq!(mood_for_label("sadness"), Mood::Sad);
        assert_eq!(mood_for_label("anger"), Mood::Angry);
        assert_eq!(mood_for_label("disgust"), Mood::Angry);
        assert_eq!(mood_for_label("Joy"), Mood::Happy);
        assert_eq!(mood_for_label("contempt"), Mood::Neutral);
    }

    #[tokio::test]
    async fn test_classify_maps_model_labels() {
        let classifier = keyword_classifier();

        assert_eq!(classifier.classify("I am so happy today").await, Mood::Happy);
        assert_eq!(classifier.classify("so worried about exams").await, Mood::Anxious);
        assert_eq!(classifier.classify("that was gross").await, Mood::Angry);
        assert_eq!(classifier.classify("went to the shop").await, Mood::Neutral);
    }

    #[tokio::test]
    async fn test_blank_input_skips_the_model() {
        let loader = Arc::new(StubLoader::new(Arc::new(KeywordModel)));
        let classifier = EmotionClassifier::new(loader.clone());

        assert_eq!(classifier.classify("").await, Mood::Neutral);
        assert_eq!(classifier.classify("   ").await, Mood::Neutral);
        assert_eq!(loader.load_count(), 0);
    }

    #[tokio::test]
    async fn test_model_errors_degrade_to_neutral() {
        let classifier = EmotionClassifier::new(Arc::new(StubLoader::new(Arc::new(BrokenModel))));

        assert_eq!(classifier.classify("anything").await, Mood::Neutral);
        assert_eq!(
            classifier
                .classify_batch(&["I am so happy", "", "so sad"])
                .await,
            vec![Mood::Neutral; 3]
        );
    }

    #[tokio::test]
    async fn test_load_failure_degrades_and_retries_next_call() {
        let mut loader = StubLoader::new(Arc::new(KeywordModel));
        loader.fail_first = 1;
        let loader = Arc::new(loader);
        let classifier = EmotionClassifier::new(loader.clone());

        assert_eq!(classifier.classify("I am so happy").await, Mood::Neutral);
        assert_eq!(classifier.classify("I am so happy").await, Mood::Happy);
        assert_eq!(classifier.classify("so sad").await, Mood::Sad);
        assert_eq!(loader.load_count(), 2);
    }

    #[tokio::test]
    async fn test_long_input_is_truncated() {
        let recorder = Arc::new(RecordingModel::default());
        let classifier = EmotionClassifier::new(Arc::new(StubLoader::new(recorder.clone())));

        let long = "é".repeat(MAX_INPUT_CHARS * 2);
        classifier.classify(&long).await;

        let seen = recorder.seen.lock().unwrap();
        assert_eq!(seen[0].chars().count(), MAX_INPUT_CHARS);
    }

    #[tokio::test]
    async fn test_batch_preserves_order_around_blank_inputs() {
        let classifier = keyword_classifier();
        let moods = classifier
            .classify_batch(&[
                "so sad".to_string(),
                String::new(),
                "I am thrilled".to_string(),
                "furious".to_string(),
            ])
            .await;

        assert_eq!(
            moods,
            vec![Mood::Sad, Mood::Neutral, Mood::Excited, Mood::Angry]
        );
        assert!(classifier.classify_batch::<&str>(&[]).await.is_empty());
    }

    #[tokio::test]
    async fn test_label_count_mismatch_degrades_batch() {
        struct ShortModel;

        #[async_trait]
        impl EmotionModel for ShortModel {
            async fn predict(&self, _inputs: &[String]) -> anyhow::Result<Vec<String>> {
                Ok(vec!["joy".into()])
            }
        }

        let classifier = EmotionClassifier::new(Arc::new(StubLoader::new(Arc::new(ShortModel))));
        assert_eq!(
            classifier.classify_batch(&["a", "b"]).await,
            vec![Mood::Neutral, Mood::Neutral]
        );
    }

    #[tokio::test]
    async fn test_unmapped_numeric_labels_are_neutral() {
        let classifier = EmotionClassifier::new(Arc::new(StubLoader::new(Arc::new(LengthModel))));
        assert_eq!(classifier.classify("hello").await, Mood::Neutral);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_first_use_loads_once() {
        let mut loader = StubLoader::new(Arc::new(KeywordModel));
        loader.delay = Duration::from_millis(50);
        let loader = Arc::new(loader);
        let classifier = Arc::new(EmotionClassifier::new(loader.clone()));

        let mut tasks = tokio::task::JoinSet::new();
        for _ in 0..16 {
            let classifier = classifier.clone();
            tasks.spawn(async move { classifier.classify("I am so happy").await });
        }
        while let Some(result) = tasks.join_next().await {
            assert_eq!(result.unwrap(), Mood::Happy);
        }

        assert_eq!(loader.load_count(), 1);
    }

    #[tokio::test]
    async fn test_inference_api_picks_top_scoring_label() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models/emotion-test"))
            .and(header("authorization", "Bearer hf-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([[
                {"label": "neutral", "score": 0.05},
                {"label": "sadness", "score": 0.91},
                {"label": "fear", "score": 0.04}
            ]])))
            .mount(&mock_server)
            .await;

        let loader = InferenceApiLoader::new(
            &mock_server.uri(),
            "emotion-test",
            Some("hf-token".into()),
            Duration::from_secs(5),
        );
        let classifier = EmotionClassifier::new(Arc::new(loader));

        assert_eq!(classifier.classify("my dog died").await, Mood::Sad);
    }

    #[tokio::test]
    async fn test_inference_api_outage_is_neutral() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models/emotion-test"))
            .respond_with(ResponseTemplate::new(503).set_body_string("loading"))
            .mount(&mock_server)
            .await;

        let loader = InferenceApiLoader::new(
            &mock_server.uri(),
            "emotion-test",
            None,
            Duration::from_secs(5),
        );
        let classifier = EmotionClassifier::new(Arc::new(loader));

        assert_eq!(classifier.classify("my dog died").await, Mood::Neutral);
    }
}
