//! Reserved final-answer capability used by native tool calling.

use async_trait::async_trait;
use once_cell::sync::OnceCell;
use serde_json::{Value, json};

use crate::error::{AgentError, Result};
use crate::invocation::Invocation;
use crate::schema::{Schema, SchemaBuilder};
use crate::tool::Capability;

pub const FINAL_ANSWER_TOOL: &str = "agent_final_answer";
pub const FINAL_ANSWER_ARGUMENT: &str = "final_answer";

/// The model calls this to end the run with an answer
pub struct FinalAnswerTool;

#[async_trait]
impl Capability for FinalAnswerTool {
    fn name(&self) -> String {
        FINAL_ANSWER_TOOL.into()
    }

    fn description(&self) -> Option<&str> {
        Some("Provide your final answer to the task. Call this once you are done.")
    }

    fn arguments_schema(&self) -> Result<&Schema> {
        static SCHEMA: OnceCell<Schema> = OnceCell::new();
        SCHEMA.get_or_try_init(|| {
            SchemaBuilder::new()
                .string(FINAL_ANSWER_ARGUMENT, "The complete final answer to the task")
                .build()
        })
    }

    fn example_invocation(&self) -> Option<Value> {
        Some(json!({ FINAL_ANSWER_ARGUMENT: "The capital of France is Paris." }))
    }

    fn renders_observation_to_model(&self) -> bool {
        false
    }

    async fn process_invocation(&self, invocation: &Invocation) -> Result<Value> {
        invocation
            .arguments
            .get(FINAL_ANSWER_ARGUMENT)
            .cloned()
            .ok_or_else(|| AgentError::tool(FINAL_ANSWER_TOOL, "missing final_answer"))
    }
}
