// Inquiry analysis: the structured-extraction pipeline.
// Implements: token budget pre-flight, prompt building, sanitization, JSON repair,
// schema validation and the retrying orchestrator.
// All model calls go through llm_client — no direct HTTP calls here.

use serde::Deserialize;

pub mod budget;
pub mod error;
pub mod handlers;
pub mod orchestrator;
pub mod prompts;
pub mod repair;
pub mod sanitizer;
pub mod scanner;
pub mod schema;

/// A client inquiry as submitted by the caller. Never mutated by the pipeline.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InquiryRequest {
    pub message: String,
    #[serde(default)]
    pub client_name: Option<String>,
    /// Country or locale of the client; `country` is accepted as an alias.
    #[serde(default, alias = "country")]
    pub locale: Option<String>,
}
