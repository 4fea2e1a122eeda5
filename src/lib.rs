use axum::extract::FromRef;
use sqlx::PgPool;

pub mod auth;
pub mod channels;
pub mod comments;
pub mod config;
pub mod error;
pub mod leveling;
pub mod ranking;
pub mod response;
pub mod videos;

use config::settings::Settings;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub settings: Settings,
}

impl FromRef<AppState> for PgPool {
    fn from_ref(app_state: &AppState) -> PgPool {
        app_state.pool.clone()
    }
}

impl FromRef<AppState> for Settings {
    fn from_ref(app_state: &AppState) -> Settings {
        app_state.settings.clone()
    }
}
