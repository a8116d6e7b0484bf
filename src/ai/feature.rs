use log::info;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::ai::parse::parse_or_default;
use crate::ai::provider::{AiError, ChatMessage, ChatProvider, ChatRequest, GenerationConfig};

/// A provider-generated document: a fixed instruction, a label for the data
/// snapshot, and the shape the reply is parsed into.
pub trait Feature {
    const NAME: &'static str;
    const INSTRUCTION: &'static str;
    const DATA_LABEL: &'static str;
    type Output: DeserializeOwned + Serialize + Default + Send;
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Insights {
    pub slow_movers: Vec<String>,
    pub fast_sellers: Vec<String>,
    pub price_opportunities: Vec<String>,
    pub combo_suggestions: Vec<String>,
    pub waste_reduction: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastEntry {
    pub item_name: String,
    pub predicted_next_7_days: f64,
    pub recommended_reorder: f64,
    pub reasoning: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutiveReport {
    pub summary: String,
    pub highlights: Vec<String>,
    pub risks: Vec<String>,
    pub suggestions: Vec<String>,
}

/// Body of `POST /api/ai/{feature}/`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerateRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default)]
    pub data: serde_json::Value,
}

pub struct InsightsFeature;

impl Feature for InsightsFeature {
    const NAME: &'static str = "insights";
    const INSTRUCTION: &'static str = "You are a restaurant operations AI. Analyze the sales data, inventory levels, and menu items to provide actionable business insights. Respond ONLY as JSON with keys: slow_movers (string[] - items that sell poorly), fast_sellers (string[] - popular items), price_opportunities (string[] - pricing suggestions), combo_suggestions (string[] - items to bundle), waste_reduction (string[] - operational improvements).";
    const DATA_LABEL: &'static str = "Data";
    type Output = Insights;
}

pub struct ForecastFeature;

impl Feature for ForecastFeature {
    const NAME: &'static str = "forecast";
    const INSTRUCTION: &'static str = "You are a demand forecasting assistant for a restaurant. Given item sales and current stock, forecast demand for the next 7 days and recommend reorder quantities. Consider items with high sales velocity need more stock. Respond ONLY as JSON array of objects with keys: item_name, predicted_next_7_days (number), recommended_reorder (number), reasoning (string).";
    const DATA_LABEL: &'static str = "Data";
    type Output = Vec<ForecastEntry>;
}

pub struct ReportFeature;

impl Feature for ReportFeature {
    const NAME: &'static str = "report";
    const INSTRUCTION: &'static str = "You are a restaurant BI assistant. Create a concise executive report from provided metrics. Respond ONLY as JSON with keys: summary (string), highlights (string[]), risks (string[]), suggestions (string[]).";
    const DATA_LABEL: &'static str = "Metrics";
    type Output = ExecutiveReport;
}

/// Instruction first, then the labelled data snapshot.
pub fn build_request<F: Feature>(model: &str, data: &serde_json::Value) -> ChatRequest {
    ChatRequest {
        model: model.to_string(),
        messages: vec![
            ChatMessage::system(F::INSTRUCTION),
            ChatMessage::user(format!("{}: {}", F::DATA_LABEL, data)),
        ],
        generation: GenerationConfig::default(),
    }
}

/// Ask the provider for one feature document. Transport failures are returned;
/// an unusable reply becomes the feature's empty default.
pub async fn generate<F: Feature>(
    provider: &dyn ChatProvider,
    model: &str,
    api_key: Option<&str>,
    data: &serde_json::Value,
) -> Result<F::Output, AiError> {
    let request = build_request::<F>(model, data);
    let reply = provider.complete(&request, api_key).await?;
    info!("received {} reply from model={}, {} bytes", F::NAME, model, reply.len());
    Ok(parse_or_default::<F::Output>(&reply))
}
