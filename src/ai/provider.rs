use std::time::Duration;

use async_trait::async_trait;
use derive_more::{Display, Error};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::json;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const DEFAULT_TIMEOUT_SECONDS: u64 = 60;

#[derive(Debug, Display, Error)]
pub enum AiError {
    #[display("no AI provider key configured")]
    MissingKey,
    #[display("AI provider request failed: {_0}")]
    Transport(#[error(not(source))] String),
    #[display("AI provider returned {status}: {body}")]
    Status { status: u16, body: String },
}

impl From<reqwest::Error> for AiError {
    fn from(e: reqwest::Error) -> Self {
        AiError::Transport(e.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationConfig {
    pub temperature: f32,
    pub top_k: u32,
    pub top_p: f32,
    pub max_output_tokens: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            top_k: 40,
            top_p: 0.95,
            max_output_tokens: 2048,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub generation: GenerationConfig,
}

/// A chat-completion backend that turns role-tagged messages into generated text.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// `api_key` overrides the provider's configured key.
    async fn complete(&self, request: &ChatRequest, api_key: Option<&str>) -> Result<String, AiError>;
}

/// Provider settings, read from the environment at startup.
#[derive(Debug, Clone)]
pub struct AiConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub default_model: String,
    pub timeout: Duration,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
            default_model: crate::model::user::DEFAULT_AI_MODEL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECONDS),
        }
    }
}

/// Client for the Gemini `generateContent` REST endpoint.
pub struct GeminiClient {
    http: reqwest::Client,
    base_url: String,
    default_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

impl GeminiClient {
    pub fn new(config: &AiConfig) -> Result<Self, AiError> {
        let http = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            default_key: config.api_key.clone().filter(|k| !k.is_empty()),
        })
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.base_url, model)
    }

    /// System messages become the system instruction; assistant turns are sent as `model`.
    fn request_body(request: &ChatRequest) -> serde_json::Value {
        let system = request
            .messages
            .iter()
            .filter(|m| m.role == Role::System)
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        let contents = request
            .messages
            .iter()
            .filter(|m| m.role != Role::System)
            .map(|m| {
                let role = match m.role {
                    Role::Assistant => "model",
                    _ => "user",
                };
                json!({ "role": role, "parts": [{ "text": m.content }] })
            })
            .collect::<Vec<_>>();
        let mut body = json!({
            "contents": contents,
            "generationConfig": {
                "temperature": request.generation.temperature,
                "topK": request.generation.top_k,
                "topP": request.generation.top_p,
                "maxOutputTokens": request.generation.max_output_tokens,
            },
        });
        if !system.is_empty() {
            body["systemInstruction"] = json!({ "parts": [{ "text": system }] });
        }
        body
    }

    fn reply_text(response: GenerateResponse) -> String {
        response
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().map(|p| p.text).collect::<String>())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ChatProvider for GeminiClient {
    async fn complete(&self, request: &ChatRequest, api_key: Option<&str>) -> Result<String, AiError> {
        let key = api_key
            .filter(|k| !k.is_empty())
            .or(self.default_key.as_deref())
            .ok_or(AiError::MissingKey)?;
        debug!("sending chat request to model={}", request.model);
        let res = self
            .http
            .post(self.endpoint(&request.model))
            .header("x-goog-api-key", key)
            .json(&Self::request_body(request))
            .send()
            .await?;
        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            warn!("AI provider returned status={}", status);
            return Err(AiError::Status { status: status.as_u16(), body });
        }
        Ok(Self::reply_text(res.json::<GenerateResponse>().await?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> ChatRequest {
        ChatRequest {
            model: "gemini-2.0-flash".to_string(),
            messages: vec![ChatMessage::system("Be brief."), ChatMessage::user("Data: {}")],
            generation: GenerationConfig::default(),
        }
    }

    #[test]
    fn body_splits_system_instruction() {
        let body = GeminiClient::request_body(&request());
        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "Be brief.");
        assert_eq!(body["contents"].as_array().unwrap().len(), 1);
        assert_eq!(body["contents"][0]["role"], "user");
        assert_eq!(body["contents"][0]["parts"][0]["text"], "Data: {}");
        assert_eq!(body["generationConfig"]["topK"], 40);
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 2048);
    }

    #[test]
    fn reply_joins_first_candidate_parts() {
        let response: GenerateResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"parts":[{"text":"```json\n"},{"text":"[]```"}]}},{"content":{"parts":[{"text":"ignored"}]}}]}"#,
        )
        .unwrap();
        assert_eq!(GeminiClient::reply_text(response), "```json\n[]```");
        let empty: GenerateResponse = serde_json::from_str("{}").unwrap();
        assert_eq!(GeminiClient::reply_text(empty), "");
    }

    #[test]
    fn endpoint_uses_trimmed_base() {
        let client = GeminiClient::new(&AiConfig {
            base_url: "http://localhost:9000/".to_string(),
            ..AiConfig::default()
        })
        .unwrap();
        assert_eq!(
            client.endpoint("gemini-1.5-pro"),
            "http://localhost:9000/v1beta/models/gemini-1.5-pro:generateContent"
        );
    }

    #[tokio::test]
    async fn missing_key_is_reported_before_any_request() {
        let client = GeminiClient::new(&AiConfig::default()).unwrap();
        let err = client.complete(&request(), None).await.unwrap_err();
        assert!(matches!(err, AiError::MissingKey));
    }
}
