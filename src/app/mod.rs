pub mod moderation;
pub mod notifications;
pub mod ports;
