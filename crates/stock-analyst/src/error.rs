//! Error types for stock analysis operations

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Stock analysis specific errors
#[derive(Debug, Error)]
pub enum AnalystError {
    /// Price history could not be retrieved, or the provider returned an
    /// invalid series
    #[error("Data fetch failed for {ticker}: {reason}")]
    DataFetch { ticker: String, reason: String },

    /// Metadata provider failed outright
    #[error("Provider error: {0}")]
    Provider(String),

    /// Not enough rows (or undefined values) for the requested computation
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    /// Model fitting or prediction failed
    #[error("Training error: {0}")]
    Training(String),

    /// Language model synthesis failed
    #[error("Synthesis error: {0}")]
    Synthesis(String),

    /// Every analysis agent failed, nothing to synthesize
    #[error("All agents failed: {0}")]
    AllAgentsFailed(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Network or HTTP error
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AnalystError {
    pub fn data_fetch(ticker: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self::DataFetch {
            ticker: ticker.into(),
            reason: reason.to_string(),
        }
    }

    /// Discriminant used when the error is captured as an agent failure
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::DataFetch { .. } => ErrorKind::DataFetch,
            Self::Provider(_) | Self::Network(_) | Self::Json(_) => ErrorKind::Provider,
            Self::InsufficientData(_) => ErrorKind::InsufficientData,
            Self::Training(_) => ErrorKind::Training,
            Self::Synthesis(_) => ErrorKind::Synthesis,
            Self::AllAgentsFailed(_) => ErrorKind::AllAgentsFailed,
            Self::Config(_) => ErrorKind::Config,
        }
    }
}

impl From<analyst_llm::LLMError> for AnalystError {
    fn from(err: analyst_llm::LLMError) -> Self {
        Self::Synthesis(err.to_string())
    }
}

/// Copyable error discriminant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    DataFetch,
    Provider,
    InsufficientData,
    Training,
    Synthesis,
    AllAgentsFailed,
    Config,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::DataFetch => "data_fetch",
            Self::Provider => "provider",
            Self::InsufficientData => "insufficient_data",
            Self::Training => "training",
            Self::Synthesis => "synthesis",
            Self::AllAgentsFailed => "all_agents_failed",
            Self::Config => "config",
        };
        f.write_str(name)
    }
}

/// Result type alias for analysis operations
pub type Result<T> = std::result::Result<T, AnalystError>;

/// Stage of an analysis run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStage {
    Fetching,
    Featurizing,
    AgentsRunning,
    Synthesizing,
    Done,
    Failed,
}

impl fmt::Display for RunStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Fatal error of an analysis run, tagged with the stage it happened in
#[derive(Debug, Error)]
#[error("analysis of {ticker} failed during {stage}: {source}")]
pub struct RunFailure {
    pub ticker: String,
    pub stage: RunStage,
    #[source]
    pub source: AnalystError,
}

impl RunFailure {
    pub fn new(ticker: impl Into<String>, stage: RunStage, source: AnalystError) -> Self {
        Self {
            ticker: ticker.into(),
            stage,
            source,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.source.kind()
    }
}
