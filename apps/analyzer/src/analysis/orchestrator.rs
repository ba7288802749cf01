//! Retry orchestrator — drives the full pipeline for one inquiry.
//!
//! Each attempt runs prompt → model → sanitize → parse/repair → validate and
//! yields an `AttemptOutcome`. Fatal outcomes (auth, billing) end the run at
//! once; retryable ones are recorded and the next prompt carries the last
//! failure. Backoff is linear: `attempt × backoff_step`.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::analysis::budget::check_budget;
use crate::analysis::error::AnalysisError;
use crate::analysis::prompts::{build_system_prompt, build_user_prompt};
use crate::analysis::repair::parse_or_repair;
use crate::analysis::sanitizer::sanitize;
use crate::analysis::schema::StructuredAnalysis;
use crate::analysis::InquiryRequest;
use crate::config::LlmConfig;
use crate::llm_client::{ChatTransport, LlmClient};

const MAX_ATTEMPTS: u32 = 3;
const LOG_PREVIEW_CHARS: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff_step: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: MAX_ATTEMPTS,
            backoff_step: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// At least one attempt is always made.
    pub fn new(max_attempts: u32, backoff_step: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff_step,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay after the failed `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.backoff_step * attempt
    }
}

/// Result of one end-to-end attempt.
#[derive(Debug)]
pub enum AttemptOutcome {
    Success(StructuredAnalysis),
    RetryableFailure(AnalysisError),
    FatalFailure(AnalysisError),
}

impl From<Result<StructuredAnalysis, AnalysisError>> for AttemptOutcome {
    fn from(result: Result<StructuredAnalysis, AnalysisError>) -> Self {
        match result {
            Ok(analysis) => AttemptOutcome::Success(analysis),
            Err(e) if e.is_fatal() => AttemptOutcome::FatalFailure(e),
            Err(e) => AttemptOutcome::RetryableFailure(e),
        }
    }
}

/// A failed attempt, kept for corrective prompts and diagnostics.
#[derive(Debug)]
pub struct FailedAttempt {
    pub attempt: u32,
    pub error: AnalysisError,
}

/// The analysis entry point. Holds only immutable configuration, so one
/// instance serves any number of concurrent inquiries.
pub struct Analyzer {
    transport: Arc<dyn ChatTransport>,
    token_limit: usize,
    policy: RetryPolicy,
}

impl Analyzer {
    pub fn new(config: &LlmConfig) -> Result<Self, AnalysisError> {
        config.validate()?;
        let client = LlmClient::new(config)?;
        info!("LLM client initialized (model: {})", client.model());
        let policy = RetryPolicy::new(config.max_attempts, Duration::from_secs(1));
        Ok(Self::with_transport(Arc::new(client), config.token_limit).with_policy(policy))
    }

    pub fn with_transport(transport: Arc<dyn ChatTransport>, token_limit: usize) -> Self {
        Self {
            transport,
            token_limit,
            policy: RetryPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Turns an inquiry into a validated analysis, retrying recoverable failures.
    pub async fn analyze(
        &self,
        request: &InquiryRequest,
    ) -> Result<StructuredAnalysis, AnalysisError> {
        if request.message.trim().is_empty() {
            return Err(AnalysisError::InvalidInput(
                "message cannot be empty".to_string(),
            ));
        }

        let system = build_system_prompt();
        let first_prompt = build_user_prompt(request, 1, None);
        check_budget(&system, &first_prompt, self.token_limit)?;

        let max_attempts = self.policy.max_attempts();
        let mut history: Vec<FailedAttempt> = Vec::new();

        for attempt in 1..=max_attempts {
            info!("Analysis attempt {}/{}", attempt, max_attempts);

            let user = match history.last() {
                Some(failed) => {
                    build_user_prompt(request, attempt, Some(&failed.error.to_string()))
                }
                None => first_prompt.clone(),
            };

            let outcome = AttemptOutcome::from(self.run_attempt(&system, &user).await);
            match outcome {
                AttemptOutcome::Success(analysis) => {
                    info!("Analysis complete on attempt {attempt}, structure validated");
                    return Ok(analysis);
                }
                AttemptOutcome::FatalFailure(e) => {
                    error!("Attempt {attempt} failed with a non-retryable error: {e}");
                    return Err(e);
                }
                AttemptOutcome::RetryableFailure(e) => {
                    warn!("Attempt {attempt} failed: {e}");
                    history.push(FailedAttempt { attempt, error: e });

                    if attempt < max_attempts {
                        let delay = self.policy.backoff(attempt);
                        info!("Retrying in {}s", delay.as_secs_f32());
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        for failed in &history {
            debug!("attempt {} failed: {}", failed.attempt, failed.error);
        }

        let attempts = history.len() as u32;
        match history.pop() {
            Some(last) => Err(AnalysisError::RetriesExhausted {
                attempts,
                last: Box::new(last.error),
            }),
            None => Err(AnalysisError::Configuration(
                "retry policy allowed no attempts".to_string(),
            )),
        }
    }

    async fn run_attempt(
        &self,
        system: &str,
        user: &str,
    ) -> Result<StructuredAnalysis, AnalysisError> {
        let raw = self.transport.complete(system, user).await?;
        let sanitized = sanitize(&raw);

        let value = parse_or_repair(&sanitized).map_err(|e| {
            debug!("Unparseable reply (head): {}", preview(&raw));
            AnalysisError::MalformedResponse(e.to_string())
        })?;

        StructuredAnalysis::from_value(value)
    }
}

fn preview(text: &str) -> &str {
    match text.char_indices().nth(LOG_PREVIEW_CHARS) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
