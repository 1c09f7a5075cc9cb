//! Analysis run orchestration
//!
//! A run moves through `Fetching -> Featurizing -> AgentsRunning ->
//! Synthesizing -> Done`; any stage can end in `Failed`. Only a failed price
//! fetch, all three agents failing, or synthesis failing twice are fatal.

use crate::agents::{
    AgentKind, AgentResult, FundamentalAgent, PredictionAgent, TechnicalAgent,
};
use crate::config::AnalystConfig;
use crate::error::{AnalystError, ErrorKind, RunFailure, RunStage};
use crate::features::{FeatureEngine, FeatureWindows};
use crate::market_data::MarketDataProvider;
use crate::model::{ForestParams, TreeParams};
use crate::retry::RetryPolicy;
use crate::synthesis::{AgentSection, LanguageModelClient, SynthesisRequest};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::task::JoinError;
use tracing::{Span, error, info, instrument, warn};
use uuid::Uuid;

/// Final output of a successful run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    pub run_id: Uuid,
    pub ticker: String,
    pub generated_at: DateTime<Utc>,
    /// Free-text recommendation from the language model
    pub synthesis: String,
    pub prediction: AgentSection,
    pub technical: AgentSection,
    pub fundamental: AgentSection,
}

impl Recommendation {
    pub fn section(&self, agent: AgentKind) -> &AgentSection {
        match agent {
            AgentKind::Prediction => &self.prediction,
            AgentKind::Technical => &self.technical,
            AgentKind::Fundamental => &self.fundamental,
        }
    }

    pub fn sections(&self) -> [(AgentKind, &AgentSection); 3] {
        AgentKind::ALL.map(|agent| (agent, self.section(agent)))
    }

    pub fn unavailable_sections(&self) -> Vec<AgentKind> {
        AgentKind::ALL
            .into_iter()
            .filter(|agent| !self.section(*agent).is_available())
            .collect()
    }
}

/// Stage bookkeeping for one run
struct RunState {
    ticker: String,
    stage: RunStage,
}

impl RunState {
    fn advance(&mut self, next: RunStage) {
        info!(from = %self.stage, to = %next, "Stage transition");
        self.stage = next;
    }

    fn fail(&mut self, error: AnalystError) -> RunFailure {
        let failed_at = self.stage;
        error!(stage = %failed_at, kind = %error.kind(), error = %error, "Run failed");
        self.stage = RunStage::Failed;
        RunFailure::new(self.ticker.clone(), failed_at, error)
    }
}

/// Drives the fetch, the three agents and the synthesis call
///
/// Holds no per-run state; concurrent runs for different tickers are
/// independent.
pub struct SynthesisCoordinator {
    market_data: Arc<dyn MarketDataProvider>,
    language_model: Arc<dyn LanguageModelClient>,
}

impl SynthesisCoordinator {
    pub fn new(
        market_data: Arc<dyn MarketDataProvider>,
        language_model: Arc<dyn LanguageModelClient>,
    ) -> Self {
        Self {
            market_data,
            language_model,
        }
    }

    /// Analyze `ticker` and produce a recommendation
    ///
    /// # Errors
    /// A [`RunFailure`] naming the stage at which the run became `Failed`.
    #[instrument(skip(self, config), fields(run_id = tracing::field::Empty))]
    pub async fn run(
        &self,
        ticker: &str,
        config: &AnalystConfig,
    ) -> std::result::Result<Recommendation, RunFailure> {
        let run_id = Uuid::new_v4();
        Span::current().record("run_id", tracing::field::display(run_id));

        let mut state = RunState {
            ticker: ticker.trim().to_uppercase(),
            stage: RunStage::Fetching,
        };
        info!(ticker = %state.ticker, stage = %state.stage, "Starting analysis run");

        if state.ticker.is_empty() {
            return Err(state.fail(AnalystError::Config("ticker is empty".to_string())));
        }
        if let Err(e) = config.validate() {
            return Err(state.fail(e));
        }
        let ticker = state.ticker.clone();

        // Fetching: one price request and one metadata request, shared by all agents
        let (prices, metadata) = tokio::join!(
            self.market_data.fetch(&ticker, config.lookback),
            self.market_data.metadata(&ticker)
        );
        let series = match prices {
            Ok(series) => series,
            Err(e) => {
                let e = match e {
                    AnalystError::DataFetch { .. } => e,
                    other => AnalystError::data_fetch(&ticker, other),
                };
                return Err(state.fail(e));
            }
        };
        if let Err(e) = &metadata {
            warn!(error = %e, "Metadata lookup failed, fundamentals will be unavailable");
        }

        state.advance(RunStage::Featurizing);
        let features = FeatureEngine::derive(&series, FeatureWindows::from(config));
        if let Err(e) = &features {
            warn!(error = %e, "Feature derivation failed, prediction and technical agents unavailable");
        }

        state.advance(RunStage::AgentsRunning);
        let fundamental = FundamentalAgent::analyze(metadata);
        let (prediction, technical) = match features {
            Ok(frame) => {
                let frame = Arc::new(frame);
                let agent = PredictionAgent::new(ForestParams {
                    n_estimators: config.n_estimators,
                    tree: TreeParams::default(),
                    seed: config.model_seed,
                });

                let prediction_frame = Arc::clone(&frame);
                let technical_frame = Arc::clone(&frame);
                let (prediction, technical) = tokio::join!(
                    tokio::task::spawn_blocking(move || agent.predict(&prediction_frame)),
                    tokio::task::spawn_blocking(move || TechnicalAgent::analyze(&technical_frame)),
                );
                (
                    joined(AgentKind::Prediction, prediction),
                    joined(AgentKind::Technical, technical),
                )
            }
            Err(e) => (
                AgentResult::failure(AgentKind::Prediction, &e),
                AgentResult::failure(AgentKind::Technical, &e),
            ),
        };

        let request = SynthesisRequest::new(&ticker, prediction, technical, fundamental);
        let failed = request.unavailable_agents();
        for agent in &failed {
            if let Some(failure) = request.result(*agent).as_failure() {
                warn!(agent = %agent, kind = %failure.kind, reason = %failure.message, "Agent unavailable");
            }
        }
        if failed.len() == AgentKind::ALL.len() {
            let reasons = failed
                .iter()
                .filter_map(|agent| request.result(*agent).as_failure())
                .map(|failure| format!("{}: {}", failure.agent, failure.message))
                .collect::<Vec<_>>()
                .join("; ");
            return Err(state.fail(AnalystError::AllAgentsFailed(reasons)));
        }

        state.advance(RunStage::Synthesizing);
        let policy = RetryPolicy::for_synthesis(config);
        let synthesis = policy
            .execute("synthesis", || self.language_model.synthesize(&request))
            .await
            .map_err(|e| match e {
                AnalystError::Synthesis(_) => e,
                other => AnalystError::Synthesis(other.to_string()),
            });
        let synthesis = match synthesis {
            Ok(text) => text,
            Err(e) => return Err(state.fail(e)),
        };

        state.advance(RunStage::Done);
        Ok(Recommendation {
            run_id,
            ticker,
            generated_at: Utc::now(),
            synthesis,
            prediction: request.section(AgentKind::Prediction),
            technical: request.section(AgentKind::Technical),
            fundamental: request.section(AgentKind::Fundamental),
        })
    }
}

/// Agent task outcome; a panicked task becomes that agent's failure
fn joined(agent: AgentKind, outcome: std::result::Result<AgentResult, JoinError>) -> AgentResult {
    outcome.unwrap_or_else(|e| {
        let kind = match agent {
            AgentKind::Prediction => ErrorKind::Training,
            AgentKind::Technical | AgentKind::Fundamental => ErrorKind::InsufficientData,
        };
        AgentResult::Failure(crate::agents::AgentFailure::new(
            agent,
            kind,
            format!("agent task aborted: {e}"),
        ))
    })
}
