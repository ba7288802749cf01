use std::time::Duration;

use anyhow::{Context, Result};

use crate::analysis::error::AnalysisError;

const DEFAULT_API_URL: &str = "https://api.deepseek.com/v1/chat/completions";
const DEFAULT_MODEL: &str = "deepseek-chat";
/// DeepSeek accepts roughly 131K tokens; keep some headroom.
const DEFAULT_TOKEN_LIMIT: usize = 128_000;
const DEFAULT_TIMEOUT_SECS: u64 = 120;
const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub llm: LlmConfig,
    pub port: u16,
    pub rust_log: String,
}

/// Everything the analysis pipeline needs to reach the model.
/// Built once at startup and passed by reference afterwards.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: String,
    pub api_url: String,
    pub model: String,
    pub token_limit: usize,
    pub request_timeout: Duration,
    pub max_attempts: u32,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            llm: LlmConfig::from_env()?,
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "3001".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

impl LlmConfig {
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("DEEPSEEK_API_KEY").unwrap_or_default();
        let token_limit = match std::env::var("LLM_TOKEN_LIMIT") {
            Ok(raw) => raw
                .parse::<usize>()
                .context("LLM_TOKEN_LIMIT must be a positive integer")?,
            Err(_) => DEFAULT_TOKEN_LIMIT,
        };
        let timeout_secs = match std::env::var("LLM_TIMEOUT_SECS") {
            Ok(raw) => raw
                .parse::<u64>()
                .context("LLM_TIMEOUT_SECS must be a number of seconds")?,
            Err(_) => DEFAULT_TIMEOUT_SECS,
        };
        let max_attempts = match std::env::var("LLM_MAX_ATTEMPTS") {
            Ok(raw) => raw
                .parse::<u32>()
                .context("LLM_MAX_ATTEMPTS must be a positive integer")?,
            Err(_) => DEFAULT_MAX_ATTEMPTS,
        };

        let config = LlmConfig {
            api_key,
            api_url: env_or("DEEPSEEK_API_URL", DEFAULT_API_URL),
            model: env_or("DEEPSEEK_MODEL", DEFAULT_MODEL),
            token_limit,
            request_timeout: Duration::from_secs(timeout_secs),
            max_attempts,
        };
        config.validate()?;
        Ok(config)
    }

    /// Rejects configurations the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), AnalysisError> {
        if self.api_key.trim().is_empty() {
            return Err(AnalysisError::Configuration(
                "DEEPSEEK_API_KEY is not set. Add it to the environment or the .env file."
                    .to_string(),
            ));
        }
        if self.token_limit == 0 {
            return Err(AnalysisError::Configuration(
                "LLM_TOKEN_LIMIT must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> LlmConfig {
        LlmConfig {
            api_key: "sk-test".to_string(),
            api_url: DEFAULT_API_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            token_limit: DEFAULT_TOKEN_LIMIT,
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    #[test]
    fn test_validate_accepts_complete_config() {
        assert!(sample().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_blank_api_key() {
        let config = LlmConfig {
            api_key: "   ".to_string(),
            ..sample()
        };
        let err = config.validate().unwrap_err();
        assert!(matches!(err, AnalysisError::Configuration(_)));
        assert!(err.to_string().contains("DEEPSEEK_API_KEY"));
    }

    #[test]
    fn test_validate_rejects_zero_token_limit() {
        let config = LlmConfig {
            token_limit: 0,
            ..sample()
        };
        assert!(matches!(
            config.validate(),
            Err(AnalysisError::Configuration(_))
        ));
    }
}
