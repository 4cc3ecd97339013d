//! Menagerie Kernel Library
//!
//! JsonSQL access gate, creature ranking store, chat command operations and
//! the HTTP API in front of them. The server binary is `menagerie`.

pub mod commands;
pub mod config;
pub mod db;
pub mod error;
pub mod jsonsql;
pub mod metrics;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;

pub use config::Config;
pub use state::AppState;

use axum::Router;
use tower_http::trace::TraceLayer;

/// Build the full HTTP router.
pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(routes::database::router(state.clone()))
        .merge(routes::images::router())
        .merge(routes::health::router())
        .merge(routes::metrics::router())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
