//! Route gateway: merges every endpoint subrouter and attaches shared state.

use axum::Router;

use crate::{Config, SharedStore};

mod forecast;
mod health;
mod readings;

// ---

/// State handed to every handler.
pub type AppState = (SharedStore, Config);

pub fn router(store: SharedStore, config: Config) -> Router {
    // ---
    Router::new()
        .merge(readings::router())
        .merge(forecast::router())
        .merge(health::router())
        .with_state((store, config))
}
