//! Text-generation service: the trait the extractor calls and a
//! chat-completions implementation over `reqwest`.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use syllatrack_shared::{LlmConfig, LlmProvider, Result, SyllatrackError, resolve_api_key};
use tracing::{debug, warn};

/// User-Agent string for text-generation requests.
const USER_AGENT: &str = concat!("Syllatrack/", env!("CARGO_PKG_VERSION"));

/// A single text-generation call.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    /// System instruction.
    pub system: String,
    /// User prompt.
    pub prompt: String,
    /// Sample at zero temperature.
    pub deterministic: bool,
    /// Ask the service for a JSON-object reply.
    pub json_output: bool,
}

/// Opaque text-in / text-out service.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Run the request and return the raw reply text.
    async fn generate(&self, request: &GenerationRequest) -> Result<String>;
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Serialize)]
struct ChatBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Deserialize)]
struct ChatResponseRaw {
    #[serde(default)]
    choices: Vec<ChoiceRaw>,
}

#[derive(Debug, Deserialize)]
struct ChoiceRaw {
    message: MessageRaw,
}

#[derive(Debug, Deserialize)]
struct MessageRaw {
    #[serde(default)]
    content: Option<String>,
}

// ---------------------------------------------------------------------------
// ChatClient
// ---------------------------------------------------------------------------

/// Chat-completions client for OpenAI-compatible and Azure OpenAI endpoints.
#[derive(Clone)]
pub struct ChatClient {
    http: reqwest::Client,
    provider: LlmProvider,
    endpoint: String,
    model: String,
    api_version: String,
    api_key: String,
}

impl std::fmt::Debug for ChatClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatClient")
            .field("provider", &self.provider)
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl ChatClient {
    /// Build a client for `config` with an explicit API key.
    pub fn new(config: &LlmConfig, api_key: impl Into<String>) -> Result<Self> {
        let endpoint = config.endpoint_url()?;

        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| SyllatrackError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            provider: config.provider,
            endpoint: endpoint.as_str().trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_version: config.api_version.clone(),
            api_key: api_key.into(),
        })
    }

    /// Build a client reading the API key from the env var named in `config`.
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        let key = resolve_api_key(config)?;
        Self::new(config, key)
    }

    /// Full URL of the chat-completions resource.
    fn completions_url(&self) -> String {
        match self.provider {
            LlmProvider::OpenAi => format!("{}/chat/completions", self.endpoint),
            LlmProvider::Azure => format!(
                "{}/openai/deployments/{}/chat/completions?api-version={}",
                self.endpoint, self.model, self.api_version
            ),
        }
    }
}

#[async_trait]
impl TextGenerator for ChatClient {
    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        let start = std::time::Instant::now();

        let body = ChatBody {
            // Azure addresses the model through the deployment path instead
            model: match self.provider {
                LlmProvider::OpenAi => Some(self.model.as_str()),
                LlmProvider::Azure => None,
            },
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &request.system,
                },
                ChatMessage {
                    role: "user",
                    content: &request.prompt,
                },
            ],
            temperature: request.deterministic.then_some(0.0),
            response_format: request.json_output.then_some(ResponseFormat {
                kind: "json_object",
            }),
        };

        let builder = self.http.post(self.completions_url()).json(&body);
        let builder = match self.provider {
            LlmProvider::OpenAi => builder.bearer_auth(&self.api_key),
            LlmProvider::Azure => builder.header("api-key", &self.api_key),
        };

        let response = builder.send().await.map_err(|e| {
            warn!(error = %e, "chat completion request failed");
            SyllatrackError::Network(e.to_string())
        })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            warn!(%status, error = %error_text, "chat completion API error");
            return Err(SyllatrackError::Extraction(format!(
                "chat completion returned HTTP {status}"
            )));
        }

        let raw: ChatResponseRaw = response
            .json()
            .await
            .map_err(|e| SyllatrackError::Parse(format!("invalid chat completion body: {e}")))?;

        let content = raw
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .ok_or_else(|| SyllatrackError::Extraction("empty chat completion reply".into()))?;

        debug!(
            model = %self.model,
            duration_ms = start.elapsed().as_millis(),
            reply_len = content.len(),
            "chat completion"
        );

        Ok(content)
    }
}
