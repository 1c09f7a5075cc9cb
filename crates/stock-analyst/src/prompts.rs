//! Synthesis prompt templates
//!
//! The system prompt casts the model as a hedge fund manager; the user
//! message lists the agent sections. Both exist in English and Chinese.

use crate::agents::AgentKind;
use crate::error::{AnalystError, Result};
use crate::synthesis::{AgentSection, SynthesisRequest};
use minijinja::{Environment, context};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Language of the generated recommendation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResponseLanguage {
    #[default]
    #[serde(rename = "en")]
    English,
    #[serde(rename = "zh")]
    Chinese,
}

impl ResponseLanguage {
    /// ISO 639-1 code
    pub fn code(self) -> &'static str {
        match self {
            Self::English => "en",
            Self::Chinese => "zh",
        }
    }
}

impl fmt::Display for ResponseLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for ResponseLanguage {
    type Err = AnalystError;

    /// Parse from ISO 639-1 code or common name
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "en" | "english" => Ok(Self::English),
            "zh" | "chinese" | "中文" => Ok(Self::Chinese),
            other => Err(AnalystError::Config(format!(
                "Unsupported language: {other} (expected en or zh)"
            ))),
        }
    }
}

pub const SYSTEM_PROMPT_EN: &str = r#"You are a Hedge Fund Manager.

You receive the reports of three analysis agents for one stock:
- an ML price prediction (bagged regression trees on recent price history),
- a technical reading (RSI and trend against the moving average),
- a fundamentals snapshot (P/E, market cap, analyst consensus).

1. ALWAYS start with the ML prediction. If it is marked UNAVAILABLE, tell the user "I couldn't run the ML model because [reason]".
2. Treat any other UNAVAILABLE agent the same way: say what is missing and why. Never invent numbers for it.
3. Fields reported as N/A were not supplied by the data provider; mention them only if they matter.
4. Otherwise, combine ML, Technicals, and Fundamentals into a trading recommendation: BUY, HOLD or SELL, with the reasoning behind it and the main risks.

Be concise and specific with the numbers you were given."#;

pub const SYSTEM_PROMPT_ZH: &str = r#"你是一位对冲基金经理。

**重要:你必须使用中文回复所有内容。**

你会收到三个分析代理针对同一只股票的报告:
- 机器学习价格预测(基于近期价格历史的装袋回归树),
- 技术面解读(RSI 以及相对移动平均线的趋势),
- 基本面快照(市盈率、市值、分析师共识)。

1. 始终先说明机器学习预测。如果它被标记为 UNAVAILABLE,请告诉用户"我无法运行机器学习模型,原因是[原因]"。
2. 其他被标记为 UNAVAILABLE 的代理也同样处理:说明缺少什么以及原因,绝不要为其编造数字。
3. 标记为 N/A 的字段是数据提供方未提供的,只在相关时提及。
4. 否则,请综合机器学习、技术面和基本面给出交易建议:买入、持有或卖出,并说明理由和主要风险。

请简明扼要,并具体引用你收到的数字。

**记住:请用中文撰写你的所有分析和回复。**"#;

const USER_TEMPLATE_EN: &str = r"Analyze {{ ticker }}.
{% for section in sections %}

## {{ section.title }}
{% if section.available %}
{% for metric in section.metrics %}
- {{ metric.name }}: {{ metric.value }}
{% endfor %}
{% else %}
UNAVAILABLE: {{ section.reason }}
{% endif %}
{% endfor %}";

const USER_TEMPLATE_ZH: &str = r"请分析 {{ ticker }}。
{% for section in sections %}

## {{ section.title }}
{% if section.available %}
{% for metric in section.metrics %}
- {{ metric.name }}: {{ metric.value }}
{% endfor %}
{% else %}
UNAVAILABLE(不可用): {{ section.reason }}
{% endif %}
{% endfor %}";

pub fn system_prompt(language: ResponseLanguage) -> &'static str {
    match language {
        ResponseLanguage::English => SYSTEM_PROMPT_EN,
        ResponseLanguage::Chinese => SYSTEM_PROMPT_ZH,
    }
}

#[derive(Serialize)]
struct PromptMetric {
    name: String,
    value: String,
}

#[derive(Serialize)]
struct PromptSection {
    title: &'static str,
    available: bool,
    metrics: Vec<PromptMetric>,
    reason: Option<String>,
}

/// Render the user message for a synthesis request
pub fn render_user_prompt(request: &SynthesisRequest, language: ResponseLanguage) -> Result<String> {
    let template = match language {
        ResponseLanguage::English => USER_TEMPLATE_EN,
        ResponseLanguage::Chinese => USER_TEMPLATE_ZH,
    };

    let sections: Vec<PromptSection> = AgentKind::ALL
        .into_iter()
        .map(|agent| match request.section(agent) {
            AgentSection::Available { metrics } => PromptSection {
                title: agent.title(),
                available: true,
                metrics: metrics
                    .iter()
                    .map(|(name, value)| PromptMetric {
                        name: name.clone(),
                        value: display_value(value),
                    })
                    .collect(),
                reason: None,
            },
            AgentSection::Unavailable { reason } => PromptSection {
                title: agent.title(),
                available: false,
                metrics: Vec::new(),
                reason: Some(reason),
            },
        })
        .collect();

    let mut env = Environment::new();
    env.set_trim_blocks(true);

    env.render_str(
        template,
        context! {
            ticker => request.ticker(),
            sections => sections,
        },
    )
    .map_err(|e| AnalystError::Synthesis(format!("Failed to render synthesis prompt: {e}")))
}

/// Metric value without JSON quoting
fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
