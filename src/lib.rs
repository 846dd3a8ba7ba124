pub mod app;
pub mod config;
pub mod domain;
pub mod http;
pub mod infra;
pub mod jobs;

use crate::app::moderation::ModerationService;

#[derive(Clone)]
pub struct AppState {
    pub moderation: ModerationService,
}
