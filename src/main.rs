//! Note Taker Backend
//!
//! REST backend for notes with shared tags and owned todos, persisted in SQLite.

mod api;
mod auth;
mod config;
mod db;
mod errors;
mod models;
mod service;
mod validation;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use auth::TokenVerifier;
use config::{Config, LogFormat};
use db::{SqliteNoteStore, TagStore};
use service::{NoteService, TagResolver};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub notes: Arc<NoteService>,
    pub tags: Arc<dyn TagStore>,
    /// `None` when authentication is disabled
    pub verifier: Option<Arc<TokenVerifier>>,
}

impl AppState {
    /// Wire the service graph over one SQLite store.
    pub fn new(store: SqliteNoteStore, config: &Config) -> Result<Self, config::ConfigError> {
        let store = Arc::new(store);
        let resolver = TagResolver::new(store.clone());
        let notes = NoteService::new(store.clone(), resolver, config.page_limits);
        let verifier = TokenVerifier::from_config(&config.auth)?.map(Arc::new);

        Ok(Self {
            notes: Arc::new(notes),
            tags: store,
            verifier,
        })
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize logging
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    match config.log_format {
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
    }

    tracing::info!("Starting Note Taker Backend");
    tracing::info!("Environment: {}", config.app_env);
    tracing::info!("Database path: {:?}", config.db_path);
    tracing::info!("Bind address: {}", config.bind_addr);

    if !config.auth.enabled {
        tracing::warn!("ENABLE_AUTHENTICATION=false outside prod. Authentication is disabled!");
    }

    // Initialize database
    let pool = db::init_database(&config.db_path).await?;
    let state = AppState::new(SqliteNoteStore::new(pool), &config)?;

    // Build router
    let app = create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Create the application router with all routes.
pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let verifier = state.verifier.clone();

    // API routes
    let api_routes = Router::new()
        // Notes
        .route("/notes", get(api::list_notes).post(api::create_note))
        .route(
            "/notes/{id}",
            get(api::get_note)
                .patch(api::update_note)
                .delete(api::delete_note),
        )
        // Tags
        .route("/tags", get(api::list_tags))
        .layer(middleware::from_fn(move |req, next| {
            auth::jwt_auth_layer(verifier.clone(), req, next)
        }));

    // Health check and hooks (no auth required)
    let public_routes = Router::new()
        .route("/health", get(health_check))
        .route("/hooks/{hook}", post(api::receive_hook));

    Router::new()
        .nest("/api", api_routes)
        .merge(public_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> &'static str {
    "OK"
}
