//! JSON read API for the public site.
//!
//! Every handler answers with the envelope from [`response`]; failures go
//! through `SiteError`'s `IntoResponse` so status codes stay uniform.

pub mod health;
pub mod response;
mod routes;

use crate::config;
use crate::db::Pool;
use crate::settings::SettingsStore;
use crate::slug::SlugGenerator;
use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

pub use response::Envelope;

/// Shared state for HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    pub pool: Pool,
    pub settings: SettingsStore,
    pub slugs: SlugGenerator,
    pub content: config::Content,
}

impl AppState {
    pub fn new(pool: Pool, content: config::Content) -> Self {
        Self {
            settings: SettingsStore::with_pool(pool.clone()),
            slugs: SlugGenerator::new(content.slug_max_attempts),
            pool,
            content,
        }
    }
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/news", get(routes::news_index))
        .route("/news/{slug}", get(routes::news_show))
        .route("/pages", get(routes::pages_index))
        .route("/pages/{slug}", get(routes::pages_show))
        .route("/services", get(routes::services_index))
        .route("/services/{slug}", get(routes::services_show))
        .route("/sliders", get(routes::sliders_index))
        .route("/settings", get(routes::settings_index))
        .route("/settings/{group}", get(routes::settings_group))
        .route("/contact", post(routes::contact_store))
}

/// Full application router with state applied.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(health::healthz))
        .nest("/api", api_routes())
        .fallback(routes::fallback)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
