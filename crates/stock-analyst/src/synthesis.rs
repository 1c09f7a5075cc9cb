//! Synthesis request and the language-model collaborator

use crate::agents::{AgentKind, AgentResult, Metrics};
use crate::config::SynthesisSettings;
use crate::error::{AnalystError, Result};
use crate::prompts::{render_user_prompt, system_prompt};
use analyst_llm::{CompletionRequest, LLMProvider, Message};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, instrument};

/// One agent's contribution as shown to the model and to the caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AgentSection {
    Available { metrics: Metrics },
    Unavailable { reason: String },
}

impl AgentSection {
    pub fn is_available(&self) -> bool {
        matches!(self, Self::Available { .. })
    }
}

impl From<&AgentResult> for AgentSection {
    fn from(result: &AgentResult) -> Self {
        match (result.metrics(), result.as_failure()) {
            (Some(metrics), _) => Self::Available { metrics },
            (None, Some(failure)) => Self::Unavailable {
                reason: failure.message.clone(),
            },
            (None, None) => Self::Unavailable {
                reason: "no result".to_string(),
            },
        }
    }
}

/// Everything the language model sees for one run
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisRequest {
    ticker: String,
    prediction: AgentResult,
    technical: AgentResult,
    fundamental: AgentResult,
}

impl SynthesisRequest {
    pub fn new(
        ticker: impl Into<String>,
        prediction: AgentResult,
        technical: AgentResult,
        fundamental: AgentResult,
    ) -> Self {
        Self {
            ticker: ticker.into(),
            prediction,
            technical,
            fundamental,
        }
    }

    pub fn ticker(&self) -> &str {
        &self.ticker
    }

    pub fn result(&self, agent: AgentKind) -> &AgentResult {
        match agent {
            AgentKind::Prediction => &self.prediction,
            AgentKind::Technical => &self.technical,
            AgentKind::Fundamental => &self.fundamental,
        }
    }

    pub fn section(&self, agent: AgentKind) -> AgentSection {
        AgentSection::from(self.result(agent))
    }

    /// Agents whose result is a failure
    pub fn unavailable_agents(&self) -> Vec<AgentKind> {
        AgentKind::ALL
            .into_iter()
            .filter(|agent| self.result(*agent).is_failure())
            .collect()
    }

    /// JSON payload: ticker plus one section per agent
    pub fn payload(&self) -> serde_json::Value {
        let mut payload = serde_json::Map::new();
        payload.insert("ticker".to_string(), self.ticker.clone().into());
        for agent in AgentKind::ALL {
            payload.insert(
                agent.as_str().to_string(),
                serde_json::to_value(self.section(agent)).unwrap_or_default(),
            );
        }
        serde_json::Value::Object(payload)
    }
}

/// Turns a synthesis request into recommendation text
///
/// Fails with [`AnalystError::Synthesis`] on API, auth or quota errors.
/// A failed call must have no side effects so it can be retried.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LanguageModelClient: Send + Sync {
    async fn synthesize(&self, request: &SynthesisRequest) -> Result<String>;
}

/// [`LanguageModelClient`] backed by any [`LLMProvider`]
pub struct LlmSynthesizer {
    provider: Arc<dyn LLMProvider>,
    settings: SynthesisSettings,
}

impl LlmSynthesizer {
    pub fn new(provider: Arc<dyn LLMProvider>, settings: SynthesisSettings) -> Self {
        Self { provider, settings }
    }

    pub fn settings(&self) -> &SynthesisSettings {
        &self.settings
    }

    fn completion_request(&self, request: &SynthesisRequest) -> Result<CompletionRequest> {
        let user_prompt = render_user_prompt(request, self.settings.language)?;

        let mut builder = CompletionRequest::builder(&self.settings.model)
            .system(system_prompt(self.settings.language))
            .add_message(Message::user(user_prompt))
            .max_tokens(self.settings.max_tokens);
        if let Some(temperature) = self.settings.temperature {
            builder = builder.temperature(temperature);
        }

        Ok(builder.build())
    }
}

#[async_trait]
impl LanguageModelClient for LlmSynthesizer {
    #[instrument(skip(self, request), fields(ticker = request.ticker(), provider = self.provider.name()))]
    async fn synthesize(&self, request: &SynthesisRequest) -> Result<String> {
        let completion = self.completion_request(request)?;
        debug!(model = %completion.model, "Requesting synthesis");

        let response = self.provider.complete(completion).await?;
        debug!(
            tokens = response.usage.total(),
            stop_reason = ?response.stop_reason,
            "Synthesis response received"
        );

        let text = response.text().trim();
        if text.is_empty() {
            return Err(AnalystError::Synthesis(
                "language model returned no text".to_string(),
            ));
        }
        Ok(text.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::{FundamentalResult, TechnicalResult, Trend};
    use crate::prompts::ResponseLanguage;
    use analyst_llm::{CompletionResponse, LLMError, StopReason, TokenUsage};
    use serde_json::json;
    use std::sync::Mutex;

    struct RecordingProvider {
        reply: std::result::Result<String, ()>,
        seen: Mutex<Vec<CompletionRequest>>,
    }

    impl RecordingProvider {
        fn replying(text: &str) -> Self {
            Self {
                reply: Ok(text.to_string()),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl LLMProvider for RecordingProvider {
        async fn complete(
            &self,
            request: CompletionRequest,
        ) -> analyst_llm::Result<CompletionResponse> {
            self.seen.lock().unwrap().push(request);
            match &self.reply {
                Ok(text) => Ok(CompletionResponse {
                    message: Message::assistant(text.clone()),
                    stop_reason: StopReason::EndTurn,
                    usage: TokenUsage::default(),
                }),
                Err(()) => Err(LLMError::RateLimitExceeded("quota".to_string())),
            }
        }

        fn name(&self) -> &str {
            "recording"
        }
    }

    fn request() -> SynthesisRequest {
        SynthesisRequest::new(
            "TEST",
            AgentResult::failure(
                AgentKind::Prediction,
                &AnalystError::Training("no rows".to_string()),
            ),
            AgentResult::Technical(TechnicalResult {
                rsi: 50.0,
                rsi_signal: "Neutral",
                trend: Trend::Bearish,
                sma: 10.0,
                close: 10.0,
            }),
            AgentResult::Fundamental(FundamentalResult {
                pe_ratio: Some(15.0),
                market_cap: None,
                analyst_rating: None,
            }),
        )
    }

    #[test]
    fn test_payload_marks_failed_agent_unavailable() {
        let request = request();
        let payload = request.payload();

        assert_eq!(payload["ticker"], "TEST");
        assert_eq!(payload["prediction"]["status"], "unavailable");
        assert_eq!(payload["prediction"]["reason"], "Training error: no rows");
        assert_eq!(payload["technical"]["status"], "available");
        assert_eq!(payload["technical"]["metrics"]["trend"], "Bearish");
        assert_eq!(payload["fundamental"]["metrics"]["market_cap"], json!("N/A"));
        assert_eq!(request.unavailable_agents(), vec![AgentKind::Prediction]);
    }

    #[tokio::test]
    async fn test_llm_synthesizer_builds_prompt() {
        let provider = Arc::new(RecordingProvider::replying("  HOLD: mixed signals.  "));
        let synthesizer = LlmSynthesizer::new(
            provider.clone(),
            SynthesisSettings::new("test-model").with_language(ResponseLanguage::English),
        );

        let text = synthesizer.synthesize(&request()).await.unwrap();
        assert_eq!(text, "HOLD: mixed signals.");

        let seen = provider.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].model, "test-model");
        assert!(seen[0].system.as_deref().unwrap().contains("Hedge Fund Manager"));
        assert!(seen[0].messages[0].text().contains("UNAVAILABLE"));
        assert_eq!(seen[0].temperature, Some(0.3));
    }

    #[tokio::test]
    async fn test_llm_error_becomes_synthesis_error() {
        let provider = Arc::new(RecordingProvider {
            reply: Err(()),
            seen: Mutex::new(Vec::new()),
        });
        let synthesizer = LlmSynthesizer::new(provider, SynthesisSettings::new("m"));

        let result = synthesizer.synthesize(&request()).await;
        assert!(matches!(result, Err(AnalystError::Synthesis(_))));
    }

    #[tokio::test]
    async fn test_blank_reply_is_synthesis_error() {
        let synthesizer = LlmSynthesizer::new(
            Arc::new(RecordingProvider::replying("   ")),
            SynthesisSettings::new("m"),
        );
        let result = synthesizer.synthesize(&request()).await;
        assert!(matches!(result, Err(AnalystError::Synthesis(_))));
    }
}
