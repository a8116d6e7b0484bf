//! Pass-through to an external chat-completion provider.

pub mod feature;
pub mod parse;
pub mod provider;

/// Request header carrying a caller-supplied provider key.
pub const AI_KEY_HEADER: &str = "X-AI-Key";

pub use feature::{
    generate, ExecutiveReport, Feature, ForecastEntry, ForecastFeature, GenerateRequest, Insights, InsightsFeature,
    ReportFeature,
};
pub use provider::{AiConfig, AiError, ChatMessage, ChatProvider, ChatRequest, GeminiClient, GenerationConfig, Role};
