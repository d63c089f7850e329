// src/enrich/analysis.rs
// Generative investment analysis: prompt construction, the OpenAI-backed
// client, and the structured result schema with its parse contract.

use std::collections::BTreeSet;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::enrich::search::ResearchSnippet;

// ---------------------------------------------------------------------------
// Structured result
// ---------------------------------------------------------------------------

/// Parsed analysis payload. The three renamed fields are the required-field
/// contract: a reply missing any of them fails deserialization and counts as
/// a parse failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    #[serde(default)]
    pub related_sectors: RelatedSectors,
    #[serde(rename = "investment_opportunities")]
    pub opportunities: Vec<Opportunity>,
    #[serde(rename = "potential_risks")]
    pub risks: Vec<Risk>,
    #[serde(rename = "potential_returns")]
    pub returns: PotentialReturns,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RelatedSectors {
    #[serde(default)]
    pub industries: Vec<String>,
    #[serde(default)]
    pub concepts: Vec<String>,
    #[serde(default)]
    pub companies: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Opportunity {
    #[serde(default, rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub target: String,
    #[serde(default)]
    pub rationale: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Risk {
    #[serde(default, rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub mitigation: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PotentialReturns {
    #[serde(default)]
    pub timeframe: String,
    #[serde(default)]
    pub upside: String,
    #[serde(default)]
    pub catalysts: Vec<String>,
}

impl AnalysisResult {
    /// Sentinel substituted when the generative reply is unusable. The field
    /// values say so explicitly, which keeps it distinguishable from a real
    /// analysis.
    pub fn unavailable() -> Self {
        Self {
            related_sectors: RelatedSectors::default(),
            opportunities: vec![Opportunity {
                kind: "未分类".to_string(),
                target: "未指定".to_string(),
                rationale: "无法解析分析结果".to_string(),
            }],
            risks: vec![Risk {
                kind: "解析错误".to_string(),
                description: "无法正确解析AI的分析结果".to_string(),
                mitigation: "请重试或联系技术支持".to_string(),
            }],
            returns: PotentialReturns {
                timeframe: "未知".to_string(),
                upside: "需要重新分析".to_string(),
                catalysts: vec!["无法确定".to_string()],
            },
        }
    }

    pub fn is_unavailable(&self) -> bool {
        *self == Self::unavailable()
    }
}

/// Parse a model reply into the structured schema. Strips markdown code
/// fences first (the model frequently wraps JSON in ```json blocks).
pub fn parse_analysis(reply: &str) -> Option<AnalysisResult> {
    let mut text = reply.trim();
    if let Some(rest) = text.strip_prefix("```json") {
        text = rest;
    } else if let Some(rest) = text.strip_prefix("```") {
        text = rest;
    }
    if let Some(rest) = text.strip_suffix("```") {
        text = rest;
    }
    serde_json::from_str(text.trim()).ok()
}

// ---------------------------------------------------------------------------
// Prompt
// ---------------------------------------------------------------------------

pub const SYSTEM_PROMPT: &str = "你是一个专业的金融分析师，专注于分析财经事件并提供投资见解。\n\
请严格按照指定的JSON格式输出分析结果。确保输出的JSON格式正确，每个字段都必须存在且格式符合要求。\n\
不要在JSON中包含任何额外的文本说明。";

/// Build the analysis prompt from the event and whatever research snippets
/// the search step produced (possibly none: an empty-context prompt is still
/// a valid analysis request).
pub fn build_prompt(title: &str, date: NaiveDate, snippets: &[ResearchSnippet]) -> String {
    let mut prompt = format!(
        "请分析以下财经事件和相关信息，提供投资见解：\n\n\
         事件信息：\n- 事件：{title}\n- 日期：{}\n\n相关资料：\n",
        date.format("%Y-%m-%d")
    );

    let mut industries = BTreeSet::new();
    let mut concepts = BTreeSet::new();
    let mut companies = BTreeSet::new();

    for snippet in snippets {
        prompt.push_str(&format!("- {}\n", snippet.title));
        let institution = if snippet.institution.is_empty() {
            "未知"
        } else {
            snippet.institution.as_str()
        };
        prompt.push_str(&format!("  来源：{} {}\n", institution, snippet.author));
        prompt.push_str(&format!("  摘要：{}\n", snippet.summary));

        industries.extend(snippet.industries.iter().cloned());
        concepts.extend(snippet.concepts.iter().cloned());
        companies.extend(snippet.companies.iter().cloned());
    }

    push_label_block(&mut prompt, "相关行业", &industries);
    push_label_block(&mut prompt, "相关概念", &concepts);
    push_label_block(&mut prompt, "相关公司", &companies);

    prompt.push_str(
        r#"
请提供以下格式的JSON分析结果：
{
    "related_sectors": {
        "industries": ["相关行业1", "相关行业2"],
        "concepts": ["相关概念1", "相关概念2"],
        "companies": ["相关公司1", "相关公司2"]
    },
    "investment_opportunities": [
        {
            "type": "机会类型（个股/行业/主题）",
            "target": "投资标的",
            "rationale": "投资逻辑"
        }
    ],
    "potential_risks": [
        {
            "type": "风险类型",
            "description": "风险描述",
            "mitigation": "风险缓解建议"
        }
    ],
    "potential_returns": {
        "timeframe": "预期时间范围",
        "upside": "上行空间预估",
        "catalysts": ["潜在催化剂1", "潜在催化剂2"]
    }
}

请确保在分析中充分利用相关行业、概念和公司信息，并在investment_opportunities中优先考虑这些标的。
"#,
    );
    prompt
}

fn push_label_block(prompt: &mut String, heading: &str, values: &BTreeSet<String>) {
    if values.is_empty() {
        return;
    }
    prompt.push_str(&format!("\n{heading}：\n"));
    for value in values {
        prompt.push_str(&format!("- {value}\n"));
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

#[async_trait]
pub trait AnalysisClient: Send + Sync {
    /// Raw model reply for a prompt; the caller owns parsing and fallback.
    async fn generate(&self, prompt: &str) -> Result<String>;
    fn name(&self) -> &'static str;
}

/// OpenAI Chat Completions client.
pub struct OpenAiClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
}

impl OpenAiClient {
    /// `model_override`: defaults to gpt-4o-mini.
    pub fn new(api_key: String, model_override: Option<&str>, timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .user_agent("wscn-calendar-sync/0.1 (+github.com/wscn-calendar-sync)")
            .connect_timeout(Duration::from_secs(4))
            .timeout(timeout)
            .build()
            .expect("reqwest client");
        let model = model_override.unwrap_or("gpt-4o-mini").to_string();
        Self {
            http,
            api_key,
            model,
        }
    }
}

#[async_trait]
impl AnalysisClient for OpenAiClient {
    async fn generate(&self, prompt: &str) -> Result<String> {
        if self.api_key.is_empty() {
            bail!("no API credential configured");
        }

        #[derive(Serialize)]
        struct Msg<'a> {
            role: &'a str,
            content: &'a str,
        }
        #[derive(Serialize)]
        struct Req<'a> {
            model: &'a str,
            messages: Vec<Msg<'a>>,
            temperature: f32,
            max_tokens: u32,
        }
        #[derive(Deserialize)]
        struct Resp {
            choices: Vec<Choice>,
        }
        #[derive(Deserialize)]
        struct Choice {
            message: ChoiceMsg,
        }
        #[derive(Deserialize)]
        struct ChoiceMsg {
            content: String,
        }

        let req = Req {
            model: &self.model,
            messages: vec![
                Msg {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                Msg {
                    role: "user",
                    content: prompt,
                },
            ],
            temperature: 0.7,
            max_tokens: 1000,
        };

        let resp = self
            .http
            .post("https://api.openai.com/v1/chat/completions")
            .bearer_auth(&self.api_key)
            .json(&req)
            .send()
            .await
            .context("openai post()")?
            .error_for_status()
            .context("openai status")?;

        let body: Resp = resp.json().await.context("openai json")?;
        let content = body
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .unwrap_or_default();
        if content.is_empty() {
            bail!("empty model reply");
        }
        Ok(content)
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}
