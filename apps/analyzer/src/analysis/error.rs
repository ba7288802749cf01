use thiserror::Error;

use crate::analysis::budget::BudgetExceeded;
use crate::llm_client::LlmError;

/// Every way an analysis can fail, grouped by what the caller has to do about it.
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// Deployment problem: the operator must fix the environment.
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid inquiry: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    BudgetExceeded(#[from] BudgetExceeded),

    #[error("The model API key is invalid or expired ({0}). Check DEEPSEEK_API_KEY in the environment or .env file.")]
    Auth(String),

    #[error("The model account balance is insufficient ({0}). Top up the account at https://platform.deepseek.com/ and try again.")]
    Billing(String),

    #[error("The model API is rate limiting requests ({0}). Please try again later.")]
    RateLimited(String),

    #[error("Could not connect to the model API ({0}). Check the network connection.")]
    Transport(String),

    #[error("Model API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("The model returned an empty reply")]
    EmptyReply,

    #[error("Could not parse the model's JSON: {0}")]
    MalformedResponse(String),

    #[error("Incomplete analysis structure: {0}")]
    SchemaValidation(String),

    #[error("Analysis failed after {attempts} attempts: {last}")]
    RetriesExhausted {
        attempts: u32,
        last: Box<AnalysisError>,
    },
}

impl AnalysisError {
    /// Errors that must be surfaced immediately without another attempt.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            AnalysisError::Configuration(_)
                | AnalysisError::InvalidInput(_)
                | AnalysisError::BudgetExceeded(_)
                | AnalysisError::Auth(_)
                | AnalysisError::Billing(_)
        )
    }

    /// The underlying error of an exhausted run, or `self` otherwise.
    pub fn root(&self) -> &AnalysisError {
        match self {
            AnalysisError::RetriesExhausted { last, .. } => last.root(),
            other => other,
        }
    }
}

impl From<LlmError> for AnalysisError {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::Unauthorized { message, .. } => AnalysisError::Auth(message),
            LlmError::InsufficientBalance { message, .. } => AnalysisError::Billing(message),
            LlmError::RateLimited { message } => AnalysisError::RateLimited(message),
            LlmError::Transport(message) => AnalysisError::Transport(message),
            LlmError::Api { status, message } => AnalysisError::Api { status, message },
            LlmError::Decode(message) => AnalysisError::MalformedResponse(message),
            LlmError::EmptyContent => AnalysisError::EmptyReply,
        }
    }
}
