//! Configuration for analysis runs

use crate::error::{AnalystError, Result};
use crate::market_data::LookbackPeriod;
use crate::prompts::ResponseLanguage;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for a single analysis run
///
/// Passed explicitly into [`SynthesisCoordinator::run`](crate::SynthesisCoordinator::run);
/// nothing here is read from ambient state, so concurrent runs with different
/// settings never interfere.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalystConfig {
    /// Simple moving average window (closes)
    pub sma_window: usize,

    /// RSI window (closes)
    pub rsi_window: usize,

    /// Seed for the bootstrap sampling of the prediction ensemble
    pub model_seed: u64,

    /// How much price history to fetch
    pub lookback: LookbackPeriod,

    /// Number of trees in the prediction ensemble
    pub n_estimators: usize,

    /// Upper bound for a single synthesis attempt
    pub synthesis_timeout: Duration,

    /// Pause before the synthesis retry
    pub synthesis_retry_backoff: Duration,
}

impl Default for AnalystConfig {
    fn default() -> Self {
        Self {
            sma_window: 20,
            rsi_window: 14,
            model_seed: 42,
            lookback: LookbackPeriod::default(),
            n_estimators: 50,
            synthesis_timeout: Duration::from_secs(60),
            synthesis_retry_backoff: Duration::from_secs(1),
        }
    }
}

impl AnalystConfig {
    /// Create a new configuration builder
    pub fn builder() -> AnalystConfigBuilder {
        AnalystConfigBuilder::default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.sma_window < 2 || self.rsi_window < 2 {
            return Err(AnalystError::Config(format!(
                "indicator windows must be at least 2 (sma={}, rsi={})",
                self.sma_window, self.rsi_window
            )));
        }

        if self.n_estimators == 0 {
            return Err(AnalystError::Config(
                "n_estimators must be greater than 0".to_string(),
            ));
        }

        if self.synthesis_timeout.is_zero() {
            return Err(AnalystError::Config(
                "synthesis_timeout must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

/// Builder for AnalystConfig
#[derive(Debug, Default)]
pub struct AnalystConfigBuilder {
    sma_window: Option<usize>,
    rsi_window: Option<usize>,
    model_seed: Option<u64>,
    lookback: Option<LookbackPeriod>,
    n_estimators: Option<usize>,
    synthesis_timeout: Option<Duration>,
    synthesis_retry_backoff: Option<Duration>,
}

impl AnalystConfigBuilder {
    pub fn sma_window(mut self, window: usize) -> Self {
        self.sma_window = Some(window);
        self
    }

    pub fn rsi_window(mut self, window: usize) -> Self {
        self.rsi_window = Some(window);
        self
    }

    pub fn model_seed(mut self, seed: u64) -> Self {
        self.model_seed = Some(seed);
        self
    }

    pub fn lookback(mut self, lookback: LookbackPeriod) -> Self {
        self.lookback = Some(lookback);
        self
    }

    pub fn n_estimators(mut self, n: usize) -> Self {
        self.n_estimators = Some(n);
        self
    }

    pub fn synthesis_timeout(mut self, timeout: Duration) -> Self {
        self.synthesis_timeout = Some(timeout);
        self
    }

    pub fn synthesis_retry_backoff(mut self, backoff: Duration) -> Self {
        self.synthesis_retry_backoff = Some(backoff);
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<AnalystConfig> {
        let defaults = AnalystConfig::default();

        let config = AnalystConfig {
            sma_window: self.sma_window.unwrap_or(defaults.sma_window),
            rsi_window: self.rsi_window.unwrap_or(defaults.rsi_window),
            model_seed: self.model_seed.unwrap_or(defaults.model_seed),
            lookback: self.lookback.unwrap_or(defaults.lookback),
            n_estimators: self.n_estimators.unwrap_or(defaults.n_estimators),
            synthesis_timeout: self.synthesis_timeout.unwrap_or(defaults.synthesis_timeout),
            synthesis_retry_backoff: self
                .synthesis_retry_backoff
                .unwrap_or(defaults.synthesis_retry_backoff),
        };

        config.validate()?;
        Ok(config)
    }
}

/// Settings for the LLM-backed synthesizer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynthesisSettings {
    /// Provider-specific model identifier
    pub model: String,

    /// Maximum tokens for the recommendation text
    pub max_tokens: usize,

    /// Sampling temperature
    pub temperature: Option<f32>,

    /// Language of the generated recommendation
    pub language: ResponseLanguage,
}

impl SynthesisSettings {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            max_tokens: 2048,
            temperature: Some(0.3),
            language: ResponseLanguage::default(),
        }
    }

    pub fn with_language(mut self, language: ResponseLanguage) -> Self {
        self.language = language;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AnalystConfig::default();
        assert_eq!(config.sma_window, 20);
        assert_eq!(config.rsi_window, 14);
        assert_eq!(config.model_seed, 42);
        assert_eq!(config.lookback, LookbackPeriod::OneYear);
        tokio_test::assert_ok!(config.validate());
    }

    #[test]
    fn test_config_builder() {
        let config = AnalystConfig::builder()
            .sma_window(5)
            .rsi_window(5)
            .model_seed(7)
            .synthesis_timeout(Duration::from_secs(10))
            .build()
            .unwrap();

        assert_eq!(config.sma_window, 5);
        assert_eq!(config.model_seed, 7);
        assert_eq!(config.n_estimators, 50);
        assert_eq!(config.synthesis_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_validation_rejects_tiny_window() {
        let err = tokio_test::assert_err!(AnalystConfig::builder().rsi_window(1).build());
        assert!(matches!(err, AnalystError::Config(_)));
    }

    #[test]
    fn test_validation_rejects_zero_trees_and_timeout() {
        let config = AnalystConfig {
            n_estimators: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = AnalystConfig {
            synthesis_timeout: Duration::ZERO,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_serde() {
        let json = serde_json::to_value(AnalystConfig::default()).unwrap();
        assert_eq!(json["lookback"], "1y");
        let back: AnalystConfig = serde_json::from_value(json).unwrap();
        assert_eq!(back, AnalystConfig::default());
    }
}
