//! Command-line interface for the stock analyst
//!
//! # Usage
//!
//! ```bash
//! # Any one of these selects the synthesis provider
//! export ANTHROPIC_API_KEY="..."
//! export OPENAI_API_KEY="..."       # or OPENAI_API_BASE for a local server
//! export GOOGLE_API_KEY="..."
//!
//! # Optional fundamentals
//! export ALPHA_VANTAGE_API_KEY="..."
//!
//! cargo run -p analyst-cli -- AAPL
//! cargo run -p analyst-cli -- --interactive --language zh
//! ```

use analyst_llm::LLMProvider;
use analyst_llm::providers::gemini::DEFAULT_GEMINI_MODEL;
use analyst_llm::providers::{AnthropicProvider, GeminiProvider, OpenAIProvider};
use analyst_utils::{env_or, init_tracing, load_dotenv};
use anyhow::{Context, bail};
use clap::{Parser, ValueEnum};
use comfy_table::{ContentArrangement, Table, presets::UTF8_FULL};
use serde_json::Value;
use std::io::{self, BufRead, Write};
use std::sync::Arc;
use stock_analyst::{
    AgentSection, AnalystConfig, LlmSynthesizer, LookbackPeriod, Recommendation, ResponseLanguage,
    SynthesisCoordinator, SynthesisSettings, YahooFinanceProvider,
};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "stock-analyst")]
#[command(about = "Multi-agent stock analysis: ML prediction, technicals and fundamentals", long_about = None)]
struct Args {
    /// Ticker symbol to analyze (e.g. AAPL)
    ticker: Option<String>,

    /// Simple moving average window
    #[arg(long, default_value_t = 20)]
    sma: usize,

    /// RSI window
    #[arg(long, default_value_t = 14)]
    rsi: usize,

    /// Seed for the prediction model
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Price history to fetch: 1mo, 3mo, 6mo, 1y, 2y or 5y
    #[arg(long, default_value = "1y", value_parser = parse_lookback)]
    lookback: LookbackPeriod,

    /// Synthesis provider; detected from the environment when omitted
    #[arg(long, value_enum)]
    provider: Option<ProviderKind>,

    /// Model identifier for the synthesis provider
    #[arg(long)]
    model: Option<String>,

    /// Language of the recommendation
    #[arg(long, value_enum, default_value_t = Language::En)]
    language: Language,

    /// Print the whole recommendation as JSON
    #[arg(long)]
    json: bool,

    /// Prompt for tickers until `quit`
    #[arg(short, long)]
    interactive: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ProviderKind {
    Anthropic,
    Openai,
    Gemini,
}

impl ProviderKind {
    /// First provider with credentials in the environment
    fn detect() -> Option<Self> {
        let set = |key: &str| std::env::var(key).is_ok_and(|v| !v.trim().is_empty());

        if set("ANTHROPIC_API_KEY") {
            Some(Self::Anthropic)
        } else if set("OPENAI_API_KEY") || set("OPENAI_API_BASE") {
            Some(Self::Openai)
        } else if set("GOOGLE_API_KEY") {
            Some(Self::Gemini)
        } else {
            None
        }
    }

    fn default_model(self) -> String {
        match self {
            Self::Anthropic => env_or("ANTHROPIC_MODEL", "claude-sonnet-4-5"),
            Self::Openai => env_or("OPENAI_MODEL", "gpt-4o-mini"),
            Self::Gemini => env_or("GEMINI_MODEL", DEFAULT_GEMINI_MODEL),
        }
    }

    fn build(self) -> anyhow::Result<Arc<dyn LLMProvider>> {
        let provider: Arc<dyn LLMProvider> = match self {
            Self::Anthropic => Arc::new(AnthropicProvider::from_env()?),
            Self::Openai => Arc::new(OpenAIProvider::from_env()?),
            Self::Gemini => Arc::new(GeminiProvider::from_env()?),
        };
        Ok(provider)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Language {
    En,
    Zh,
}

impl From<Language> for ResponseLanguage {
    fn from(language: Language) -> Self {
        match language {
            Language::En => Self::English,
            Language::Zh => Self::Chinese,
        }
    }
}

fn parse_lookback(value: &str) -> Result<LookbackPeriod, String> {
    value.parse().map_err(|e: stock_analyst::AnalystError| e.to_string())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv();
    init_tracing();

    let args = Args::parse();

    if args.ticker.is_none() && !args.interactive {
        bail!("a ticker is required unless --interactive is given");
    }

    let config = AnalystConfig::builder()
        .sma_window(args.sma)
        .rsi_window(args.rsi)
        .model_seed(args.seed)
        .lookback(args.lookback)
        .build()?;

    let Some(provider_kind) = args.provider.or_else(ProviderKind::detect) else {
        bail!("no LLM credentials found: set ANTHROPIC_API_KEY, OPENAI_API_KEY or GOOGLE_API_KEY");
    };
    let model = args
        .model
        .clone()
        .unwrap_or_else(|| provider_kind.default_model());
    let llm = provider_kind
        .build()
        .with_context(|| format!("failed to configure {provider_kind:?} provider"))?;
    info!(provider = llm.name(), model = %model, "Synthesis provider ready");

    let market = YahooFinanceProvider::from_env()?;
    if !market.has_fundamentals() {
        warn!("ALPHA_VANTAGE_API_KEY not set, fundamentals will be unavailable");
    }

    let settings = SynthesisSettings::new(model).with_language(args.language.into());
    let coordinator = SynthesisCoordinator::new(
        Arc::new(market),
        Arc::new(LlmSynthesizer::new(llm, settings)),
    );

    if let Some(ticker) = &args.ticker {
        let recommendation = coordinator.run(ticker, &config).await?;
        print_recommendation(&recommendation, args.json)?;
    }

    if args.interactive {
        interactive_loop(&coordinator, &config, args.json).await?;
    }

    Ok(())
}

async fn interactive_loop(
    coordinator: &SynthesisCoordinator,
    config: &AnalystConfig,
    json: bool,
) -> anyhow::Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("Ticker (or 'quit')> ");
        stdout.flush()?;

        let mut input = String::new();
        if stdin.lock().read_line(&mut input)? == 0 {
            println!();
            break;
        }

        let ticker = input.trim();
        if ticker.is_empty() {
            continue;
        }
        if ticker.eq_ignore_ascii_case("quit") || ticker.eq_ignore_ascii_case("exit") {
            break;
        }

        match coordinator.run(ticker, config).await {
            Ok(recommendation) => print_recommendation(&recommendation, json)?,
            Err(e) => eprintln!("Error: {e}\n"),
        }
    }

    println!("Goodbye!");
    Ok(())
}

fn print_recommendation(recommendation: &Recommendation, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(recommendation)?);
        return Ok(());
    }

    println!("=== {} ===\n", recommendation.ticker);
    println!("{}\n", recommendation.synthesis);

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Agent", "Status", "Details"]);

    for (agent, section) in recommendation.sections() {
        let (status, details) = match section {
            AgentSection::Available { metrics } => (
                "ok",
                metrics
                    .iter()
                    .map(|(name, value)| format!("{name}: {}", display_value(value)))
                    .collect::<Vec<_>>()
                    .join("\n"),
            ),
            AgentSection::Unavailable { reason } => ("unavailable", reason.clone()),
        };
        table.add_row(vec![agent.title().to_string(), status.to_string(), details]);
    }

    println!("{table}");
    println!("run id: {}\n", recommendation.run_id);
    Ok(())
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
