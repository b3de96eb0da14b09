//! Ollama LLM Gateway
//!
//! Implementation of `LlmGateway` for local Ollama inference over the
//! `/api/chat` endpoint, including Ollama's native `tools` field.

use std::time::Duration;

use agent_core::{
    error::{AgentError, Result},
    gateway::{
        ChatRequest, Completion, FinishReason, GenerationOptions, LlmGateway, ResponseFormat,
        TokenUsage, ToolCall, ToolDescriptor,
    },
    message::{Message, Role},
};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Ollama gateway configuration
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OllamaConfig {
    /// Ollama host URL
    pub host: String,

    /// Ollama port
    pub port: u16,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            host: "http://localhost".into(),
            port: 11434,
            timeout_secs: 120,
        }
    }
}

impl OllamaConfig {
    /// Read `OLLAMA_HOST`, `OLLAMA_PORT` and `OLLAMA_TIMEOUT_SECS`
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Self {
            host: lookup("OLLAMA_HOST")
                .map(|h| h.trim().trim_end_matches('/').to_string())
                .filter(|h| !h.is_empty())
                .unwrap_or(defaults.host),
            port: lookup("OLLAMA_PORT")
                .and_then(|p| p.trim().parse().ok())
                .unwrap_or(defaults.port),
            timeout_secs: lookup("OLLAMA_TIMEOUT_SECS")
                .and_then(|t| t.trim().parse().ok())
                .unwrap_or(defaults.timeout_secs),
        }
    }

    pub fn base_url(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: Vec<OllamaMessage<'a>>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'static str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<OllamaTool<'a>>,
    options: OllamaOptions<'a>,
}

#[derive(Debug, Serialize)]
struct OllamaMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct OllamaTool<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    function: OllamaFunction<'a>,
}

#[derive(Debug, Serialize)]
struct OllamaFunction<'a> {
    name: &'a str,
    description: &'a str,
    parameters: &'a Value,
}

#[derive(Debug, Serialize)]
struct OllamaOptions<'a> {
    temperature: f32,
    top_p: f32,
    num_predict: u32,
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    stop: &'a [String],
}

#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    message: OllamaResponseMessage,
    #[serde(default)]
    done_reason: Option<String>,
    #[serde(default)]
    prompt_eval_count: Option<u32>,
    #[serde(default)]
    eval_count: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct OllamaResponseMessage {
    #[serde(default)]
    content: String,
    #[serde(default)]
    tool_calls: Vec<OllamaToolCall>,
}

#[derive(Debug, Deserialize)]
struct OllamaToolCall {
    function: OllamaCalledFunction,
}

#[derive(Debug, Deserialize)]
struct OllamaCalledFunction {
    name: String,
    #[serde(default)]
    arguments: Value,
}

/// Ollama LLM gateway
pub struct OllamaGateway {
    client: Client,
    config: OllamaConfig,
}

impl OllamaGateway {
    /// Create from configuration
    pub fn from_config(config: OllamaConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| AgentError::Config(format!("HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    /// Create with custom host/port
    pub fn new(host: impl Into<String>, port: u16) -> Result<Self> {
        Self::from_config(OllamaConfig {
            host: host.into(),
            port,
            ..OllamaConfig::default()
        })
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_config(OllamaConfig::from_env())
    }

    /// Create with default localhost settings
    pub fn localhost() -> Result<Self> {
        Self::from_config(OllamaConfig::default())
    }

    pub const fn config(&self) -> &OllamaConfig {
        &self.config
    }

    /// Convert agent messages to Ollama format, system prompt first
    fn convert_messages<'a>(
        system_prompt: Option<&'a str>,
        messages: &'a [Message],
    ) -> Vec<OllamaMessage<'a>> {
        system_prompt
            .map(|content| OllamaMessage {
                role: "system",
                content,
            })
            .into_iter()
            .chain(messages.iter().map(|m| OllamaMessage {
                role: match m.role {
                    Role::System => "system",
                    Role::User => "user",
                    Role::Assistant => "assistant",
                },
                content: &m.content,
            }))
            .collect()
    }

    /// Ollama runs no tools itself, so provider-managed ones are not sent
    fn convert_tools(tools: &[ToolDescriptor]) -> Vec<OllamaTool<'_>> {
        tools
            .iter()
            .filter(|t| {
                if t.provider_managed {
                    tracing::debug!(tool = %t.name, "Skipping provider-managed tool for Ollama");
                }
                !t.provider_managed
            })
            .map(|t| OllamaTool {
                kind: "function",
                function: OllamaFunction {
                    name: &t.name,
                    description: &t.description,
                    parameters: &t.parameters,
                },
            })
            .collect()
    }

    fn build_options(opts: &GenerationOptions) -> OllamaOptions<'_> {
        OllamaOptions {
            temperature: opts.temperature,
            top_p: opts.top_p,
            num_predict: opts.max_tokens,
            stop: &opts.stop_sequences,
        }
    }

    fn build_request<'a>(request: &ChatRequest<'a>) -> OllamaChatRequest<'a> {
        OllamaChatRequest {
            model: &request.options.model,
            messages: Self::convert_messages(request.system_prompt, request.messages),
            stream: false,
            format: (request.response_format == ResponseFormat::Json).then_some("json"),
            tools: Self::convert_tools(request.available_tools),
            options: Self::build_options(request.options),
        }
    }

    /// Convert Ollama response to an agent completion
    fn convert_completion(response: OllamaChatResponse, format: ResponseFormat) -> Completion {
        let tool_calls: Vec<ToolCall> = response
            .message
            .tool_calls
            .into_iter()
            .map(|call| ToolCall::new(call.function.name, call.function.arguments))
            .collect();

        let finish_reason = if tool_calls.is_empty() {
            match response.done_reason.as_deref() {
                Some("length") => FinishReason::Length,
                _ => FinishReason::Stop,
            }
        } else {
            FinishReason::ToolUse
        };

        let usage = match (response.prompt_eval_count, response.eval_count) {
            (None, None) => None,
            (prompt, completion) => {
                let prompt_tokens = prompt.unwrap_or(0);
                let completion_tokens = completion.unwrap_or(0);
                Some(TokenUsage {
                    prompt_tokens,
                    completion_tokens,
                    total_tokens: prompt_tokens.saturating_add(completion_tokens),
                })
            }
        };

        let content = response.message.content;
        Completion {
            raw_response: (!content.is_empty()).then_some(content),
            response_tool_calls: (!tool_calls.is_empty()).then_some(tool_calls),
            usage,
            finish_reason: Some(finish_reason),
            ..Completion::default()
        }
        .parsed_as(format)
    }
}

#[async_trait]
impl LlmGateway for OllamaGateway {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn chat(&self, request: ChatRequest<'_>) -> Result<Completion> {
        let body = Self::build_request(&request);
        let url = format!("{}/api/chat", self.config.base_url());

        tracing::debug!(
            model = body.model,
            messages = body.messages.len(),
            tools = body.tools.len(),
            "Sending chat request to Ollama"
        );

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() || e.is_timeout() {
                    AgentError::GatewayUnavailable(e.to_string())
                } else {
                    AgentError::Gateway(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(AgentError::Gateway(format!("Ollama returned {status}: {text}")));
        }

        let parsed: OllamaChatResponse = response
            .json()
            .await
            .map_err(|e| AgentError::Gateway(format!("Invalid Ollama response: {e}")))?;

        Ok(Self::convert_completion(parsed, request.response_format))
    }

    async fn health_check(&self) -> Result<bool> {
        let url = format!("{}/api/tags", self.config.base_url());
        match self.client.get(&url).send().await {
            Ok(response) => Ok(response.status().is_success()),
            Err(e) => {
                tracing::warn!("Ollama health check failed: {}", e);
                Ok(false)
            }
        }
    }
}
