//! Crisis keyword detector.
//!
//! Exact, case-folded substring containment against a fixed phrase set.
//! No stemming or fuzzy matching: paraphrases slip through and innocent
//! phrases can trip it. Apostrophe phrases are listed with both the ASCII
//! `'` and the typographic `’` that phone keyboards insert.

use serde::{Deserialize, Serialize};

use super::catalog::CatalogError;

const BUNDLED_KEYWORDS: &str = include_str!("../../data/crisis_keywords.json");

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeywordCategory {
    pub name: String,
    pub phrases: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrisisKeywordSet {
    pub version: String,
    pub categories: Vec<KeywordCategory>,
}

impl CrisisKeywordSet {
    pub fn bundled() -> Result<Self, CatalogError> {
        Self::from_json(BUNDLED_KEYWORDS)
    }

    pub fn from_json(contents: &str) -> Result<Self, CatalogError> {
        let set: CrisisKeywordSet =
            serde_json::from_str(contents).map_err(|source| CatalogError::Parse {
                artifact: "crisis keywords",
                source,
            })?;
        set.validate()?;
        Ok(set)
    }

    fn validate(&self) -> Result<(), CatalogError> {
        let invalid = |reason: String| CatalogError::Invalid {
            artifact: "crisis keywords",
            reason,
        };

        if self.categories.is_empty() {
            return Err(invalid("no categories".into()));
        }
        for category in &self.categories {
            if category.phrases.is_empty() {
                return Err(invalid(format!("category '{}' has no phrases", category.name)));
            }
            for phrase in &category.phrases {
                if phrase.trim().is_empty() {
                    return Err(invalid(format!("empty phrase in '{}'", category.name)));
                }
                if *phrase != phrase.to_lowercase() {
                    return Err(invalid(format!("phrase '{}' is not lowercase", phrase)));
                }
            }
        }
        Ok(())
    }

    pub fn phrases(&self) -> impl Iterator<Item = &str> {
        self.categories
            .iter()
            .flat_map(|c| c.phrases.iter().map(String::as_str))
    }
}

#[derive(Debug, Clone)]
pub struct CrisisDetector {
    keywords: CrisisKeywordSet,
}

impl CrisisDetector {
    pub fn new(keywords: CrisisKeywordSet) -> Self {
        tracing::debug!(
            version = %keywords.version,
            phrases = keywords.phrases().count(),
            "Crisis keyword set loaded"
        );
        Self { keywords }
    }

    pub fn bundled() -> Result<Self, CatalogError> {
        Ok(Self::new(CrisisKeywordSet::bundled()?))
    }

    pub fn keywords(&self) -> &CrisisKeywordSet {
        &self.keywords
    }

    /// True if the case-folded text contains any crisis phrase.
    pub fn is_crisis(&self, text: &str) -> bool {
        self.matched_category(text).is_some()
    }

    /// Name of the first category with a matching phrase.
    pub fn matched_category(&self, text: &str) -> Option<&str> {
        if text.is_empty() {
            return None;
        }
        let folded = text.to_lowercase();

        let category = self
            .keywords
            .categories
            .iter()
            .find(|c| c.phrases.iter().any(|p| folded.contains(p.as_str())))?;

        tracing::warn!(category = %category.name, "Crisis detected");
        Some(category.name.as_str())
    }
}
