//! Test doubles: a scripted gateway and a few small capabilities.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use once_cell::sync::OnceCell;
use serde_json::{Value, json};

use crate::error::{AgentError, Result};
use crate::gateway::{ChatRequest, Completion, LlmGateway, ResponseFormat, ToolDescriptor};
use crate::invocation::Invocation;
use crate::message::Message;
use crate::registry::CapabilityRegistry;
use crate::schema::{Schema, SchemaBuilder};
use crate::tool::Capability;

fn empty_schema(cell: &'static OnceCell<Schema>) -> Result<&'static Schema> {
    cell.get_or_try_init(|| SchemaBuilder::new().build())
}

/// Returns its `text` argument unchanged
pub struct EchoTool;

#[async_trait]
impl Capability for EchoTool {
    fn description(&self) -> Option<&str> {
        Some("Echoes its input back")
    }

    fn arguments_schema(&self) -> Result<&Schema> {
        static SCHEMA: OnceCell<Schema> = OnceCell::new();
        SCHEMA.get_or_try_init(|| SchemaBuilder::new().string("text", "Text to echo").build())
    }

    fn example_invocation(&self) -> Option<Value> {
        Some(json!({ "text": "hello" }))
    }

    async fn process_invocation(&self, invocation: &Invocation) -> Result<Value> {
        Ok(invocation.arguments["text"].clone())
    }
}

/// Has a schema but neither description nor example
pub struct Undocumented;

#[async_trait]
impl Capability for Undocumented {
    fn arguments_schema(&self) -> Result<&Schema> {
        static SCHEMA: OnceCell<Schema> = OnceCell::new();
        empty_schema(&SCHEMA)
    }

    async fn process_invocation(&self, _invocation: &Invocation) -> Result<Value> {
        Ok(Value::Null)
    }
}

/// Always raises from its execution logic
pub struct FailingTool;

#[async_trait]
impl Capability for FailingTool {
    fn description(&self) -> Option<&str> {
        Some("Fails every time it runs")
    }

    fn arguments_schema(&self) -> Result<&Schema> {
        static SCHEMA: OnceCell<Schema> = OnceCell::new();
        empty_schema(&SCHEMA)
    }

    fn example_invocation(&self) -> Option<Value> {
        Some(json!({}))
    }

    async fn process_invocation(&self, _invocation: &Invocation) -> Result<Value> {
        Err(AgentError::tool("failing", "boom"))
    }
}

/// Succeeds without showing its result to the model
pub struct QuietTool;

#[async_trait]
impl Capability for QuietTool {
    fn description(&self) -> Option<&str> {
        Some("Records something silently")
    }

    fn arguments_schema(&self) -> Result<&Schema> {
        static SCHEMA: OnceCell<Schema> = OnceCell::new();
        empty_schema(&SCHEMA)
    }

    fn example_invocation(&self) -> Option<Value> {
        Some(json!({}))
    }

    fn renders_observation_to_model(&self) -> bool {
        false
    }

    async fn process_invocation(&self, _invocation: &Invocation) -> Result<Value> {
        Ok(json!({ "stored": true }))
    }
}

/// Built-ins plus every test capability except [`Undocumented`]
pub fn test_registry() -> CapabilityRegistry {
    let mut registry = CapabilityRegistry::with_builtins();
    registry.register(EchoTool);
    registry.register(FailingTool);
    registry.register(QuietTool);
    registry
}

/// Owned copy of what the agent sent on one call
#[derive(Clone, Debug)]
pub struct RecordedRequest {
    pub messages: Vec<Message>,
    pub system_prompt: Option<String>,
    pub response_format: ResponseFormat,
    pub tools: Vec<ToolDescriptor>,
    pub model: String,
}

/// Replays a queue of completions and records every request.
/// An exhausted queue is a gateway error unless a repeating completion is set.
#[derive(Default)]
pub struct ScriptedGateway {
    script: Mutex<VecDeque<Completion>>,
    repeat: Option<Completion>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl ScriptedGateway {
    pub fn new(script: Vec<Completion>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            ..Self::default()
        }
    }

    pub fn repeating(completion: Completion) -> Self {
        Self {
            repeat: Some(completion),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn request(&self, index: usize) -> RecordedRequest {
        self.requests.lock().unwrap()[index].clone()
    }
}

#[async_trait]
impl LlmGateway for ScriptedGateway {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn chat(&self, request: ChatRequest<'_>) -> Result<Completion> {
        self.requests.lock().unwrap().push(RecordedRequest {
            messages: request.messages.to_vec(),
            system_prompt: request.system_prompt.map(str::to_string),
            response_format: request.response_format,
            tools: request.available_tools.to_vec(),
            model: request.options.model.clone(),
        });

        let next = self.script.lock().unwrap().pop_front();
        next.or_else(|| self.repeat.clone())
            .ok_or_else(|| AgentError::Gateway("script exhausted".into()))
    }
}
