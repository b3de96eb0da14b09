//! LLM Gateway
//!
//! The single network-facing dependency of the agent. A gateway turns an
//! ordered message list plus optional tool descriptors into a completion
//! holding raw text and/or structured tool calls. Vendor wire formats,
//! retries and timeouts all live behind this trait.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use agent_core::gateway::{ChatRequest, LlmGateway};
//!
//! let completion = gateway
//!     .chat(ChatRequest::new(&messages, &options).system_prompt(&prompt))
//!     .await?;
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::message::Message;

/// Configuration for LLM generation
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GenerationOptions {
    /// Model identifier (e.g., "llama3.2", "gpt-4o", "claude-3-5-sonnet")
    pub model: String,

    /// Temperature for sampling (0.0 = deterministic, 1.0 = creative)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens to generate
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Top-p nucleus sampling
    #[serde(default = "default_top_p")]
    pub top_p: f32,

    /// Stop sequences
    #[serde(default)]
    pub stop_sequences: Vec<String>,
}

const fn default_temperature() -> f32 { 0.7 }
const fn default_max_tokens() -> u32 { 2048 }
const fn default_top_p() -> f32 { 0.9 }

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            model: "llama3.2".into(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            top_p: default_top_p(),
            stop_sequences: Vec::new(),
        }
    }
}

/// Shape the gateway should ask the model to answer in
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseFormat {
    #[default]
    Text,
    Json,
    Html,
}

impl std::str::FromStr for ResponseFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            "html" => Ok(Self::Html),
            other => Err(format!("unknown response format '{other}'")),
        }
    }
}

/// A capability as advertised to the gateway for native tool calling
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    /// Strict JSON schema of the arguments
    pub parameters: Value,
    /// Executed by the provider itself, never by the agent
    #[serde(default)]
    pub provider_managed: bool,
}

/// One structured tool call returned by the model
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Provider call id, when the vendor supplies one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    pub name: String,

    /// Usually an object; some vendors send the object encoded as a string
    #[serde(default)]
    pub arguments: Value,
}

impl ToolCall {
    pub fn new(name: impl Into<String>, arguments: Value) -> Self {
        Self {
            id: None,
            name: name.into(),
            arguments,
        }
    }

    /// Arguments as a JSON value, decoding the string form if needed
    pub fn decoded_arguments(&self) -> std::result::Result<Value, serde_json::Error> {
        match &self.arguments {
            Value::String(encoded) => serde_json::from_str(encoded),
            other => Ok(other.clone()),
        }
    }
}

/// Response from a gateway call
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Completion {
    /// The generated text, if any
    pub raw_response: Option<String>,

    /// `raw_response` decoded according to the requested format
    #[serde(default)]
    pub parsed_response: Option<Value>,

    /// Structured tool calls, in the order the model produced them
    #[serde(default)]
    pub response_tool_calls: Option<Vec<ToolCall>>,

    /// Token usage statistics (if available)
    #[serde(default)]
    pub usage: Option<TokenUsage>,

    /// Finish reason
    #[serde(default)]
    pub finish_reason: Option<FinishReason>,
}

impl Completion {
    /// A plain text completion
    pub fn text(raw: impl Into<String>) -> Self {
        Self {
            raw_response: Some(raw.into()),
            finish_reason: Some(FinishReason::Stop),
            ..Self::default()
        }
    }

    /// A completion carrying a single structured tool call
    pub fn tool_call(name: impl Into<String>, arguments: Value) -> Self {
        Self {
            response_tool_calls: Some(vec![ToolCall::new(name, arguments)]),
            finish_reason: Some(FinishReason::ToolUse),
            ..Self::default()
        }
    }

    /// Decode `raw_response` into `parsed_response` for the given format
    #[must_use]
    pub fn parsed_as(mut self, format: ResponseFormat) -> Self {
        if format == ResponseFormat::Json {
            self.parsed_response = self
                .raw_response
                .as_deref()
                .and_then(|raw| serde_json::from_str(strip_code_fence(raw)).ok());
        }
        self
    }

    /// Text content, empty if the model sent none
    pub fn content(&self) -> &str {
        self.raw_response.as_deref().unwrap_or_default()
    }

    pub fn first_tool_call(&self) -> Option<&ToolCall> {
        self.response_tool_calls.as_ref().and_then(|calls| calls.first())
    }
}

fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .map_or(trimmed, str::trim)
}

/// Token usage statistics
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Reason for completion finishing
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
    ToolUse,
    ContentFilter,
    Error,
}

/// Everything a gateway needs for one turn
#[derive(Clone, Copy, Debug)]
pub struct ChatRequest<'a> {
    pub messages: &'a [Message],
    pub system_prompt: Option<&'a str>,
    pub response_format: ResponseFormat,
    pub available_tools: &'a [ToolDescriptor],
    pub options: &'a GenerationOptions,
}

impl<'a> ChatRequest<'a> {
    pub const fn new(messages: &'a [Message], options: &'a GenerationOptions) -> Self {
        Self {
            messages,
            system_prompt: None,
            response_format: ResponseFormat::Text,
            available_tools: &[],
            options,
        }
    }

    #[must_use]
    pub const fn system_prompt(mut self, prompt: &'a str) -> Self {
        self.system_prompt = Some(prompt);
        self
    }

    #[must_use]
    pub const fn response_format(mut self, format: ResponseFormat) -> Self {
        self.response_format = format;
        self
    }

    #[must_use]
    pub const fn tools(mut self, tools: &'a [ToolDescriptor]) -> Self {
        self.available_tools = tools;
        self
    }
}

/// Strategy trait for LLM gateways
///
/// Implement this trait to add support for new LLM backends. The agent works
/// exclusively through this interface and treats every error it returns as
/// fatal for the run.
#[async_trait]
pub trait LlmGateway: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &str;

    /// Run one chat turn
    async fn chat(&self, request: ChatRequest<'_>) -> Result<Completion>;

    /// Check if the gateway is reachable and configured correctly
    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_generation_options_defaults() {
        let opts = GenerationOptions::default();
        assert!((opts.temperature - 0.7).abs() < f32::EPSILON);
        assert_eq!(opts.max_tokens, 2048);
        assert_eq!(opts.model, "llama3.2");
    }

    #[test]
    fn test_decoded_arguments_accepts_string_form() {
        let call = ToolCall::new("calculator", json!(r#"{"expression":"1+1"}"#));
        assert_eq!(call.decoded_arguments().unwrap(), json!({"expression": "1+1"}));

        let call = ToolCall::new("calculator", json!({"expression": "1+1"}));
        assert_eq!(call.decoded_arguments().unwrap(), json!({"expression": "1+1"}));

        let call = ToolCall::new("calculator", json!("{not json"));
        assert!(call.decoded_arguments().is_err());
    }

    #[test]
    fn test_parsed_as_json_strips_fences() {
        let completion = Completion::text("```json\n{\"a\": 1}\n```").parsed_as(ResponseFormat::Json);
        assert_eq!(completion.parsed_response, Some(json!({"a": 1})));

        let completion = Completion::text("plain").parsed_as(ResponseFormat::Text);
        assert_eq!(completion.parsed_response, None);
    }

    #[test]
    fn test_first_tool_call() {
        let completion = Completion {
            response_tool_calls: Some(vec![
                ToolCall::new("first", json!({})),
                ToolCall::new("second", json!({})),
            ]),
            ..Completion::default()
        };
        assert_eq!(completion.first_tool_call().unwrap().name, "first");
        assert!(Completion::text("hi").first_tool_call().is_none());
    }

    #[test]
    fn test_response_format_from_str() {
        assert_eq!("JSON".parse::<ResponseFormat>(), Ok(ResponseFormat::Json));
        assert!("xml".parse::<ResponseFormat>().is_err());
    }
}
