//! Civic issue voting.
//!
//! The [`engine`] keeps community vote state responsive in the UI: votes are
//! applied optimistically to a single shared store and reconciled against a
//! remote [`authority`]. The crate also ships a reference vote authority
//! ([`create_router`]) with in-memory storage for development and testing.

pub mod api;
pub mod auth;
pub mod authority;
pub mod config;
pub mod engine;
pub mod errors;
pub mod ledger;
pub mod models;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use config::Config;
use ledger::VoteLedger;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub ledger: Arc<VoteLedger>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        Self {
            ledger: Arc::new(VoteLedger::new()),
            config: Arc::new(config),
        }
    }
}

/// Create the reference authority router with all routes.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let psk = state.config.api_psk.clone();

    let api_routes = Router::new()
        // Issues
        .route("/issues", get(api::list_issues).post(api::create_issue))
        .route("/issues/{id}", get(api::get_issue).delete(api::delete_issue))
        // Votes
        .route("/issues/{id}/upvote", post(api::upvote_issue))
        .route("/issues/{id}/downvote", post(api::downvote_issue))
        .layer(middleware::from_fn(move |req, next| {
            auth::psk_auth_layer(psk.clone(), req, next)
        }));

    // Health check (no auth required)
    let health_routes = Router::new().route("/health", get(health_check));

    Router::new()
        .nest("/api", api_routes)
        .merge(health_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> &'static str {
    "OK"
}
