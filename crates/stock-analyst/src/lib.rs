//! Multi-agent stock analysis pipeline
//!
//! Produces a trading recommendation for a ticker by combining three
//! independent signals and asking a language model to synthesize them:
//!
//! - `PredictionAgent`: bagged regression trees predicting the next close
//! - `TechnicalAgent`: latest RSI and trend against the moving average
//! - `FundamentalAgent`: P/E, market cap and analyst consensus
//!
//! # Architecture
//!
//! `SynthesisCoordinator` fetches price history and metadata once through a
//! [`MarketDataProvider`], derives a [`FeatureFrame`], runs the agents
//! concurrently and hands their results to a [`LanguageModelClient`].
//! One or two failed agents are reported as unavailable; the run only fails
//! when the price fetch fails, every agent fails, or synthesis fails twice.
//!
//! # Example
//!
//! ```rust,ignore
//! use analyst_llm::providers::AnthropicProvider;
//! use stock_analyst::{
//!     AnalystConfig, LlmSynthesizer, SynthesisCoordinator, SynthesisSettings, YahooFinanceProvider,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let provider = Arc::new(AnthropicProvider::from_env()?);
//!     let synthesizer = LlmSynthesizer::new(provider, SynthesisSettings::new("claude-sonnet-4-5"));
//!     let coordinator = SynthesisCoordinator::new(
//!         Arc::new(YahooFinanceProvider::from_env()?),
//!         Arc::new(synthesizer),
//!     );
//!
//!     let recommendation = coordinator.run("AAPL", &AnalystConfig::default()).await?;
//!     println!("{}", recommendation.synthesis);
//!     Ok(())
//! }
//! ```

pub mod agents;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod features;
pub mod market_data;
pub mod model;
pub mod prompts;
pub mod retry;
pub mod synthesis;

pub use agents::{
    AgentFailure, AgentKind, AgentResult, Direction, FundamentalAgent, FundamentalResult,
    PredictionAgent, PredictionResult, TechnicalAgent, TechnicalResult, Trend,
};
pub use config::{AnalystConfig, AnalystConfigBuilder, SynthesisSettings};
pub use coordinator::{Recommendation, SynthesisCoordinator};
pub use error::{AnalystError, ErrorKind, Result, RunFailure, RunStage};
pub use features::{FeatureEngine, FeatureFrame, FeatureRow, FeatureWindows};
pub use market_data::{
    AlphaVantageClient, LookbackPeriod, MarketDataProvider, PriceBar, PriceSeries, TickerMetadata,
    YahooFinanceProvider,
};
pub use model::{BaggedForest, ForestParams};
pub use prompts::ResponseLanguage;
pub use retry::RetryPolicy;
pub use synthesis::{AgentSection, LanguageModelClient, LlmSynthesizer, SynthesisRequest};
