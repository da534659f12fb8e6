pub mod catalog;
pub mod classifier;
pub mod conversations;
pub mod crisis;
pub mod generator;
pub mod moods;
pub mod pipeline;
pub mod tables;
pub mod triage;
