pub mod conversations;
pub mod emotions;
pub mod health;
pub mod messages;
pub mod moods;
pub mod resources;
