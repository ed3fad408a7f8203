pub mod config;
pub mod db;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;

use axum::Router;

/// Full HTTP surface with state attached.
pub fn app(state: state::AppState) -> Router {
    routes::routes::routes().with_state(state)
}
