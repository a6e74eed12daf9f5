//! Context-window budget and token estimation.
//!
//! Uses a character-based heuristic: one token is `chars_per_token`
//! characters (4 by default). The assembler never sees tokens, only the
//! character budgets derived here.

use ragline_config::BudgetConfig;
use ragline_core::error::{Error, Result};

/// Token budget for a single query.
///
/// `max_query_tokens = max_total_tokens - max_response_tokens` is what the
/// prompt may use; the context and history sections each get a fixed
/// fraction of it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TokenBudget {
    pub max_total_tokens: u32,
    pub max_response_tokens: u32,
    pub context_fraction: f32,
    pub history_fraction: f32,
    pub chars_per_token: f32,
}

impl Default for TokenBudget {
    fn default() -> Self {
        Self::from(&BudgetConfig::default())
    }
}

impl From<&BudgetConfig> for TokenBudget {
    fn from(config: &BudgetConfig) -> Self {
        Self {
            max_total_tokens: config.max_total_tokens,
            max_response_tokens: config.max_response_tokens,
            context_fraction: config.context_fraction,
            history_fraction: config.history_fraction,
            chars_per_token: config.chars_per_token,
        }
    }
}

impl From<&TokenBudget> for BudgetConfig {
    fn from(budget: &TokenBudget) -> Self {
        Self {
            max_total_tokens: budget.max_total_tokens,
            max_response_tokens: budget.max_response_tokens,
            context_fraction: budget.context_fraction,
            history_fraction: budget.history_fraction,
            chars_per_token: budget.chars_per_token,
        }
    }
}

impl TokenBudget {
    /// Reject budgets that cannot produce a usable prompt.
    pub fn validate(&self) -> Result<()> {
        BudgetConfig::from(self).check().map_err(Error::config)
    }

    /// Tokens available to the prompt.
    pub fn max_query_tokens(&self) -> u32 {
        self.max_total_tokens.saturating_sub(self.max_response_tokens)
    }

    /// Convert a (possibly fractional) token count to whole characters, floored.
    pub fn tokens_to_chars(&self, tokens: f64) -> usize {
        let raw = tokens * self.chars_per_token as f64;
        if raw <= 0.0 {
            return 0;
        }
        // f32 fractions such as 0.7 sit just below their decimal value.
        let nearest = raw.round();
        if (raw - nearest).abs() < 1e-3 {
            nearest as usize
        } else {
            raw.floor() as usize
        }
    }

    /// Character budget for the retrieved-passage section.
    pub fn max_context_chars(&self) -> usize {
        self.tokens_to_chars(self.context_fraction as f64 * self.max_query_tokens() as f64)
    }

    /// Character budget for the conversation-history section.
    pub fn max_history_chars(&self) -> usize {
        self.tokens_to_chars(self.history_fraction as f64 * self.max_query_tokens() as f64)
    }

    /// Estimate the token count for a string. Rounds up.
    pub fn estimate_tokens(&self, text: &str) -> usize {
        let chars = text.chars().count();
        if chars == 0 || self.chars_per_token <= 0.0 {
            return 0;
        }
        (chars as f64 / self.chars_per_token as f64).ceil() as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn budget(total: u32, response: u32, context: f32, history: f32) -> TokenBudget {
        TokenBudget {
            max_total_tokens: total,
            max_response_tokens: response,
            context_fraction: context,
            history_fraction: history,
            chars_per_token: 4.0,
        }
    }

    #[test]
    fn default_budget_derivation() {
        let b = TokenBudget::default();
        assert_eq!(b.max_query_tokens(), 3696);
        assert_eq!(b.max_context_chars(), 3696);
        assert_eq!(b.max_history_chars(), 3696);
    }

    #[test]
    fn char_budgets_are_floored() {
        // 0.3 * 99 * 4 = 118.8
        let b = budget(100, 1, 0.3, 0.0);
        assert_eq!(b.max_context_chars(), 118);
        assert_eq!(b.max_history_chars(), 0);
    }

    #[test]
    fn f32_fractions_do_not_lose_a_char() {
        let b = budget(1100, 100, 0.7, 0.3);
        assert_eq!(b.max_context_chars(), 2800);
        assert_eq!(b.max_history_chars(), 1200);
    }

    #[test]
    fn tokens_to_chars_scales() {
        let mut b = TokenBudget::default();
        b.chars_per_token = 3.5;
        assert_eq!(b.tokens_to_chars(10.0), 35);
        assert_eq!(b.tokens_to_chars(0.0), 0);
    }

    #[test]
    fn estimate_tokens_rounds_up_and_counts_chars() {
        let b = TokenBudget::default();
        assert_eq!(b.estimate_tokens(""), 0);
        assert_eq!(b.estimate_tokens("test"), 1);
        assert_eq!(b.estimate_tokens("hello"), 2);
        // Four multi-byte chars are one token, not three.
        assert_eq!(b.estimate_tokens("日本語字"), 1);
    }

    #[test]
    fn validate_accepts_defaults() {
        assert!(TokenBudget::default().validate().is_ok());
    }

    #[test]
    fn validate_rejects_bad_budgets() {
        assert!(budget(400, 400, 0.25, 0.25).validate().is_err());
        assert!(budget(4096, 400, 0.8, 0.3).validate().is_err());
        assert!(budget(4096, 400, -0.1, 0.3).validate().is_err());
        assert!(budget(4096, 400, 1.5, 0.0).validate().is_err());

        let mut b = TokenBudget::default();
        b.chars_per_token = 0.0;
        let err = b.validate().unwrap_err();
        assert_eq!(err.kind(), ragline_core::ErrorKind::ConfigurationError);
    }

    #[test]
    fn validate_rejects_nan_like_config_does() {
        let mut b = TokenBudget::default();
        b.chars_per_token = f32::NAN;
        let err = b.validate().unwrap_err();
        assert!(err.to_string().contains("chars_per_token must be greater than 0"));

        let mut b = TokenBudget::default();
        b.context_fraction = f32::NAN;
        assert!(b.validate().is_err());
    }

    #[test]
    fn validate_reports_the_same_rule_as_config() {
        let b = budget(4096, 400, 0.8, 0.3);
        let config = BudgetConfig::from(&b);
        let err = b.validate().unwrap_err();
        assert!(err.to_string().contains(&config.check().unwrap_err()));
    }
}
