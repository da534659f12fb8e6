use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmergencyResource {
    pub name: String,
    pub contact: String,
    pub description: String,
    pub category: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TechniqueType {
    Grounding,
    Breathing,
    Relaxation,
    Visualization,
    Meditation,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CalmingTechnique {
    pub title: String,
    pub description: String,
    #[serde(rename = "type")]
    pub technique_type: TechniqueType,
}
