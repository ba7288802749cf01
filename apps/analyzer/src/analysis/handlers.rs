//! Axum route handlers for the Analysis API.

use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::analysis::schema::StructuredAnalysis;
use crate::analysis::InquiryRequest;
use crate::errors::AppError;
use crate::state::AppState;

const UNNAMED_CLIENT: &str = "Unnamed client";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeResponse {
    pub id: Uuid,
    pub client_name: String,
    pub message: String,
    pub analysis: StructuredAnalysis,
    pub created_at: DateTime<Utc>,
}

/// POST /api/analyze
///
/// Runs the full analysis pipeline for one client inquiry and returns the
/// validated assessment. Nothing is persisted.
pub async fn handle_analyze(
    State(state): State<AppState>,
    Json(request): Json<InquiryRequest>,
) -> Result<Json<AnalyzeResponse>, AppError> {
    let id = Uuid::new_v4();
    let client_name = request
        .client_name
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .unwrap_or(UNNAMED_CLIENT)
        .to_string();
    info!("Analyzing inquiry {id} for {client_name}");

    let analysis = state.analyzer.analyze(&request).await?;
    info!(
        "Inquiry {id} analyzed: {} team roles proposed",
        analysis.roles().len()
    );

    Ok(Json(AnalyzeResponse {
        id,
        client_name,
        message: request.message,
        analysis,
        created_at: Utc::now(),
    }))
}
