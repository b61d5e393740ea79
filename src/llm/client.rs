//! Client for OpenAI-compatible chat-completion backends.
//!
//! The workflow only ever needs one operation from the backend: turn a prompt
//! into plain text. Everything else here exists to make that operation robust
//! against the shapes real backends return (string content vs. fragment
//! arrays) and against a missing credential (the client is constructable in a
//! disabled state so the workflow can degrade instead of crashing).

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::env;
use std::time::Duration;

use super::normalize::normalize;
use crate::error::LlmError;

/// Environment variable holding the backend API key.
pub const API_KEY_ENV: &str = "OPENROUTER_API_KEY";

/// Default API base URL.
pub const DEFAULT_API_BASE: &str = "https://openrouter.ai/api/v1";

/// Default model for code generation.
pub const DEFAULT_MODEL: &str = "google/gemini-2.5-flash";

/// A message in a conversation with the backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Role of the message sender (e.g., "system", "user", "assistant").
    pub role: String,
    /// Content of the message.
    pub content: String,
}

impl Message {
    /// Create a new system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    /// Create a new user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Request for text generation.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationRequest {
    /// Model identifier; empty string means "use the client default".
    pub model: String,
    /// Conversation messages.
    pub messages: Vec<Message>,
    /// Sampling temperature. Kept at or near zero for reproducible codegen.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// Maximum number of tokens to generate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl GenerationRequest {
    /// Create a new generation request with default parameters.
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            messages,
            temperature: None,
            max_tokens: None,
        }
    }

    /// Set the temperature for this request.
    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Set the max tokens for this request.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// One fragment of a multi-part assistant message.
///
/// Some backends return assistant content as an array of heterogeneous parts
/// rather than a single string. A part is either plain text, a structured
/// object carrying a `text` field, or something else entirely (rendered via
/// compact JSON as a last resort).
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ContentFragment {
    /// A bare string part.
    Text(String),
    /// A structured part; only the `text` field is extractable.
    Structured {
        text: Option<String>,
        #[serde(flatten)]
        rest: Value,
    },
}

impl ContentFragment {
    /// Extracts the text of this fragment, falling back to a string
    /// conversion when no text field is present.
    fn into_text(self) -> String {
        match self {
            ContentFragment::Text(s) => s,
            ContentFragment::Structured { text: Some(t), .. } => t,
            ContentFragment::Structured { text: None, rest } => rest.to_string(),
        }
    }
}

/// Assistant message content: a single block or a sequence of fragments.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    /// The standard single text block.
    Single(String),
    /// A heterogeneous fragment sequence.
    Fragments(Vec<ContentFragment>),
}

impl MessageContent {
    /// Concatenates all extractable text in order.
    pub fn flatten(self) -> String {
        match self {
            MessageContent::Single(s) => s,
            MessageContent::Fragments(parts) => {
                parts.into_iter().map(ContentFragment::into_text).collect()
            }
        }
    }
}

/// Response from a generation request.
#[derive(Debug, Clone)]
pub struct GenerationResponse {
    /// Model that generated this response.
    pub model: String,
    /// Flattened content of the first choice, if any.
    pub content: Option<String>,
}

impl GenerationResponse {
    /// Returns the first choice's content, normalized into plain code text
    /// (fragments joined, surrounding code fences stripped, whitespace
    /// trimmed).
    pub fn normalized_content(&self) -> Result<String, LlmError> {
        self.content
            .as_deref()
            .map(normalize)
            .ok_or_else(|| LlmError::ParseError("No content in backend response".to_string()))
    }
}

/// Trait for backends that can generate text.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Generate a response for the given request.
    async fn generate(&self, request: GenerationRequest) -> Result<GenerationResponse, LlmError>;

    /// Whether the provider can serve requests at all. A disabled provider
    /// fails every `generate` call with [`LlmError::MissingApiKey`]; nodes
    /// use this to short-circuit with a diagnostic instead of crashing.
    fn is_enabled(&self) -> bool {
        true
    }
}

/// Client for OpenAI-compatible chat-completion APIs.
pub struct GenClient {
    /// Base URL for the API.
    api_base: String,
    /// API key; `None` means the client is disabled.
    api_key: Option<String>,
    /// Default model to use for requests.
    default_model: String,
    /// HTTP client for making API requests.
    http_client: Client,
}

impl GenClient {
    /// Create a new client with explicit configuration.
    ///
    /// A `None` api_key yields a disabled client: construction succeeds, but
    /// every generation attempt fails with [`LlmError::MissingApiKey`].
    pub fn new(api_base: String, api_key: Option<String>, default_model: String) -> Self {
        Self {
            api_base,
            api_key,
            default_model,
            http_client: Client::builder()
                .timeout(Duration::from_secs(120))
                .build()
                .expect("Failed to build HTTP client"),
        }
    }

    /// Create a disabled client that rejects every request.
    pub fn disabled() -> Self {
        Self::new(
            DEFAULT_API_BASE.to_string(),
            None,
            DEFAULT_MODEL.to_string(),
        )
    }

    /// Create a client from environment variables.
    ///
    /// Reads `OPENROUTER_API_KEY` for the credential. When the key is absent
    /// the client is constructed in the disabled state rather than failing,
    /// so a run can still start and surface the problem through the workflow
    /// log.
    pub fn from_env() -> Self {
        Self::new(
            env::var("DEVLOOP_API_BASE").unwrap_or_else(|_| DEFAULT_API_BASE.to_string()),
            env::var(API_KEY_ENV).ok(),
            env::var("DEVLOOP_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
        )
    }

    /// Get the API base URL.
    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    /// Get the default model.
    pub fn default_model(&self) -> &str {
        &self.default_model
    }
}

/// Internal request structure for the OpenAI-compatible API.
#[derive(Debug, Serialize)]
struct ApiRequest {
    model: String,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

/// Internal response structure from the OpenAI-compatible API.
#[derive(Debug, Deserialize)]
struct ApiResponse {
    model: String,
    choices: Vec<ApiChoice>,
}

/// Internal choice structure from the API response.
#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiMessage,
}

/// Internal message structure from the API response.
#[derive(Debug, Deserialize)]
struct ApiMessage {
    content: MessageContent,
}

/// Error response from the API.
#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorDetail,
}

/// Error detail from the API.
#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

#[async_trait]
impl LlmProvider for GenClient {
    async fn generate(&self, request: GenerationRequest) -> Result<GenerationResponse, LlmError> {
        let Some(api_key) = self.api_key.as_deref() else {
            return Err(LlmError::MissingApiKey);
        };

        let model = if request.model.is_empty() {
            self.default_model.clone()
        } else {
            request.model.clone()
        };

        let api_request = ApiRequest {
            model,
            messages: request.messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        let url = format!("{}/chat/completions", self.api_base);

        let http_response = self
            .http_client
            .post(&url)
            .header("Content-Type", "application/json")
            .header("Authorization", format!("Bearer {}", api_key))
            .json(&api_request)
            .send()
            .await
            .map_err(|e| LlmError::RequestFailed(e.to_string()))?;

        let status = http_response.status();

        if !status.is_success() {
            let status_code = status.as_u16();
            let error_text = http_response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error response".to_string());

            if let Ok(error_response) = serde_json::from_str::<ApiErrorResponse>(&error_text) {
                if status_code == 429 {
                    return Err(LlmError::RateLimited(error_response.error.message));
                }
                return Err(LlmError::ApiError {
                    code: status_code,
                    message: error_response.error.message,
                });
            }

            return Err(LlmError::ApiError {
                code: status_code,
                message: error_text,
            });
        }

        let api_response: ApiResponse = http_response
            .json()
            .await
            .map_err(|e| LlmError::ParseError(format!("Failed to parse API response: {}", e)))?;

        let content = api_response
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content.flatten());

        Ok(GenerationResponse {
            model: api_response.model,
            content,
        })
    }

    fn is_enabled(&self) -> bool {
        self.api_key.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_constructors() {
        let system = Message::system("You are a software architect.");
        assert_eq!(system.role, "system");

        let user = Message::user("Hello");
        assert_eq!(user.role, "user");
        assert_eq!(user.content, "Hello");
    }

    #[test]
    fn test_generation_request_builder() {
        let request = GenerationRequest::new("gpt-4", vec![Message::user("test")])
            .with_temperature(0.0)
            .with_max_tokens(2048);

        assert_eq!(request.model, "gpt-4");
        assert_eq!(request.temperature, Some(0.0));
        assert_eq!(request.max_tokens, Some(2048));
    }

    #[test]
    fn test_content_single_string() {
        let content: MessageContent = serde_json::from_str("\"hello\"").unwrap();
        assert_eq!(content.flatten(), "hello");
    }

    #[test]
    fn test_content_fragment_array_in_order() {
        let json = r#"[
            "def f():",
            {"type": "text", "text": "\n    return 1"},
            "\n"
        ]"#;
        let content: MessageContent = serde_json::from_str(json).unwrap();
        assert_eq!(content.flatten(), "def f():\n    return 1\n");
    }

    #[test]
    fn test_content_fragment_without_text_field_stringified() {
        let json = r#"[{"type": "thought", "signature": "abc"}]"#;
        let content: MessageContent = serde_json::from_str(json).unwrap();
        let flat = content.flatten();
        assert!(flat.contains("thought"));
        assert!(flat.contains("abc"));
    }

    #[test]
    fn test_normalized_content_strips_fences() {
        let response = GenerationResponse {
            model: "m".to_string(),
            content: Some("```python\nx = 1\n```".to_string()),
        };
        assert_eq!(response.normalized_content().unwrap(), "x = 1");
    }

    #[test]
    fn test_normalized_content_missing() {
        let response = GenerationResponse {
            model: "m".to_string(),
            content: None,
        };
        assert!(matches!(
            response.normalized_content(),
            Err(LlmError::ParseError(_))
        ));
    }

    #[test]
    fn test_disabled_client() {
        let client = GenClient::disabled();
        assert!(!client.is_enabled());
    }

    #[tokio::test]
    async fn test_disabled_client_rejects_requests() {
        let client = GenClient::disabled();
        let request = GenerationRequest::new("", vec![Message::user("test")]);
        let result = client.generate(request).await;
        assert!(matches!(result, Err(LlmError::MissingApiKey)));
    }

    #[tokio::test]
    async fn test_connection_error_maps_to_request_failed() {
        // Port 65535 is unlikely to have a listener.
        let client = GenClient::new(
            "http://localhost:65535".to_string(),
            Some("test-key".to_string()),
            "gpt-4".to_string(),
        );

        let request = GenerationRequest::new("gpt-4", vec![Message::user("test")]);
        let result = client.generate(request).await;

        assert!(matches!(result, Err(LlmError::RequestFailed(_))));
    }

    #[test]
    fn test_api_request_serialization() {
        let request = ApiRequest {
            model: "gpt-4".to_string(),
            messages: vec![Message::user("test")],
            temperature: Some(0.0),
            max_tokens: None, // Should be skipped in JSON
        };

        let json = serde_json::to_string(&request).expect("serialization should succeed");
        assert!(json.contains("\"model\":\"gpt-4\""));
        assert!(json.contains("\"temperature\":0.0"));
        assert!(!json.contains("max_tokens"));
    }
}
