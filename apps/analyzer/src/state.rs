use std::sync::Arc;

use crate::analysis::orchestrator::Analyzer;

/// Shared application state injected into all route handlers via Axum extractors.
/// Read-only after startup; every request runs its own pipeline instance.
#[derive(Clone)]
pub struct AppState {
    pub analyzer: Arc<Analyzer>,
}
