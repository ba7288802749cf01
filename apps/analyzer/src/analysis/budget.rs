//! Token budget pre-flight — rejects oversized prompts before paying for a call.
//!
//! The estimate is a fixed heuristic of half a token per character. It only
//! has to catch inputs that are clearly too big
//! (typically pasted documents), not predict billing.

use tracing::{info, warn};

/// Warn once usage passes this share of the limit.
const WARN_RATIO: f64 = 0.8;

/// Token estimate for one prompt pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenBudget {
    pub system_tokens: usize,
    pub user_tokens: usize,
    pub total: usize,
    pub limit: usize,
}

impl TokenBudget {
    pub fn usage_percent(&self) -> f64 {
        self.total as f64 / self.limit as f64 * 100.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BudgetExceeded {
    pub total: usize,
    pub limit: usize,
    pub over: usize,
    pub percent: f64,
}

impl std::fmt::Display for BudgetExceeded {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "The inquiry is too large to analyze.\n\n\
             Current content: about {} tokens\n\
             API limit: {} tokens\n\
             Over the limit by: {} tokens ({:.1}%)\n\n\
             Suggestions:\n\
             1. Extract the key information (requirements, feature descriptions) and resubmit\n\
             2. Split a large document into several smaller parts and analyze them separately\n\
             3. For PDFs, copy only the text of the relevant pages",
            format_token_count(self.total),
            format_token_count(self.limit),
            format_token_count(self.over),
            self.percent
        )
    }
}

impl std::error::Error for BudgetExceeded {}

/// Approximates the token count of `text` as `ceil(chars × 0.5)`.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(2)
}

/// Renders a token count for humans: `1500` → `"1.5K"`, `999` → `"999"`.
pub fn format_token_count(tokens: usize) -> String {
    if tokens >= 1000 {
        format!("{:.1}K", tokens as f64 / 1000.0)
    } else {
        tokens.to_string()
    }
}

/// Estimates both prompts and fails when their sum exceeds `limit`.
pub fn check_budget(
    system: &str,
    user: &str,
    limit: usize,
) -> Result<TokenBudget, BudgetExceeded> {
    let system_tokens = estimate_tokens(system);
    let user_tokens = estimate_tokens(user);
    let budget = TokenBudget {
        system_tokens,
        user_tokens,
        total: system_tokens + user_tokens,
        limit,
    };

    info!(
        "Token estimate: system {} + user {} = {} tokens (limit {})",
        format_token_count(budget.system_tokens),
        format_token_count(budget.user_tokens),
        format_token_count(budget.total),
        format_token_count(budget.limit)
    );

    if budget.total > limit {
        let over = budget.total - limit;
        return Err(BudgetExceeded {
            total: budget.total,
            limit,
            over,
            percent: over as f64 / limit as f64 * 100.0,
        });
    }

    if budget.total as f64 > limit as f64 * WARN_RATIO {
        warn!(
            "Token count close to the limit ({:.1}%), analysis quality may suffer",
            budget.usage_percent()
        );
    }

    Ok(budget)
}
