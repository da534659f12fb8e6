pub mod conversation;
pub mod emotion_event;
pub mod mood;
pub mod resource;
