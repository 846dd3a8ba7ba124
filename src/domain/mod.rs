pub mod event;
pub mod moderation;
