//! Emergency contacts and calming techniques surfaced alongside crisis and
//! low-wellness responses. Bundled at compile time; read-only at runtime.

use serde::{Deserialize, Serialize};

use crate::models::resource::{CalmingTechnique, EmergencyResource};

const BUNDLED_RESOURCES: &str = include_str!("../../data/resources.json");

/// Crisis responses carry this many of the top-ranked resources.
pub const CRISIS_RESOURCE_COUNT: usize = 5;

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Failed to parse {artifact}: {source}")]
    Parse {
        artifact: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid {artifact}: {reason}")]
    Invalid {
        artifact: &'static str,
        reason: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceCatalog {
    pub version: String,
    /// Ranked, most broadly useful first.
    pub emergency_resources: Vec<EmergencyResource>,
    pub calming_techniques: Vec<CalmingTechnique>,
}

impl ResourceCatalog {
    pub fn bundled() -> Result<Self, CatalogError> {
        Self::from_json(BUNDLED_RESOURCES)
    }

    pub fn from_json(contents: &str) -> Result<Self, CatalogError> {
        let catalog: ResourceCatalog =
            serde_json::from_str(contents).map_err(|source| CatalogError::Parse {
                artifact: "resource catalog",
                source,
            })?;

        if catalog.emergency_resources.len() < CRISIS_RESOURCE_COUNT {
            return Err(CatalogError::Invalid {
                artifact: "resource catalog",
                reason: format!(
                    "need at least {} emergency resources, found {}",
                    CRISIS_RESOURCE_COUNT,
                    catalog.emergency_resources.len()
                ),
            });
        }
        if catalog.calming_techniques.is_empty() {
            return Err(CatalogError::Invalid {
                artifact: "resource catalog",
                reason: "no calming techniques".into(),
            });
        }

        Ok(catalog)
    }

    pub fn crisis_resources(&self) -> Vec<EmergencyResource> {
        self.emergency_resources
            .iter()
            .take(CRISIS_RESOURCE_COUNT)
            .cloned()
            .collect()
    }

    pub fn techniques(&self) -> Vec<CalmingTechnique> {
        self.calming_techniques.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::resource::TechniqueType;

    #[test]
    fn test_bundled_catalog_is_valid() {
        let catalog = ResourceCatalog::bundled().unwrap();

        assert!(catalog.emergency_resources.len() >= CRISIS_RESOURCE_COUNT);
        assert_eq!(catalog.crisis_resources().len(), 5);
        assert_eq!(
            catalog.crisis_resources()[0].name,
            catalog.emergency_resources[0].name
        );
        assert!(catalog
            .emergency_resources
            .iter()
            .all(|r| !r.contact.is_empty() && !r.category.is_empty()));
    }

    #[test]
    fn test_bundled_techniques_cover_every_type() {
        let catalog = ResourceCatalog::bundled().unwrap();
        for kind in [
            TechniqueType::Grounding,
            TechniqueType::Breathing,
            TechniqueType::Relaxation,
            TechniqueType::Visualization,
            TechniqueType::Meditation,
        ] {
            assert!(
                catalog.calming_techniques.iter().any(|t| t.technique_type == kind),
                "missing {:?} technique",
                kind
            );
        }
    }

    #[test]
    fn test_rejects_short_resource_list() {
        let json = r#"{
            "version": "t",
            "emergency_resources": [
                {"name": "a", "contact": "1", "description": "d", "category": "c"}
            ],
            "calming_techniques": [
                {"title": "t", "description": "d", "type": "breathing"}
            ]
        }"#;
        assert!(matches!(
            ResourceCatalog::from_json(json),
            Err(CatalogError::Invalid { .. })
        ));
    }

    #[test]
    fn test_rejects_unknown_technique_type() {
        let json = r#"{
            "version": "t",
            "emergency_resources": [],
            "calming_techniques": [
                {"title": "t", "description": "d", "type": "jogging"}
            ]
        }"#;
        assert!(matches!(
            ResourceCatalog::from_json(json),
            Err(CatalogError::Parse { .. })
        ));
    }
}
