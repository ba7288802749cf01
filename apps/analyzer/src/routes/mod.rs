pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::analysis::handlers;
use crate::errors::AppError;
use crate::state::AppState;

async fn not_found() -> AppError {
    AppError::NotFound("no such route".to_string())
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        .route("/api/analyze", post(handlers::handle_analyze))
        .fallback(not_found)
        .with_state(state)
}
