//! Native tool-calling strategy.
//!
//! Reads the provider's structured tool calls instead of parsing text. The
//! model must call a tool on every turn and ends the run by calling the
//! reserved `agent_final_answer` capability.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};

use super::{ProtocolError, Strategy, StrategyKind, dispatch, recover};
use crate::error::{AgentError, Result};
use crate::gateway::{Completion, ToolDescriptor};
use crate::message::Message;
use crate::registry::Toolbox;
use crate::tool::Capability;
use crate::tools::{FINAL_ANSWER_ARGUMENT, FINAL_ANSWER_TOOL, FinalAnswerTool};
use crate::turn::Turn;

const NATIVE_PROMPT: &str = "You are an intelligent assistant that completes tasks step by step by calling tools.

# Rules
- On every turn you must call exactly one of the tools you have been given.
- Tool results are returned to you inside <observation> tags.
- If an observation reports an error, correct your call and try again.
- When you have the complete answer, call the agent_final_answer tool with your answer in the final_answer argument.
- Never answer in plain text without a tool call.";

/// Strategy built on provider-level function calling
pub struct NativeToolCallingStrategy;

#[async_trait]
impl Strategy for NativeToolCallingStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::NativeToolCalling
    }

    /// Appends the reserved final-answer capability when it is missing
    fn normalize_tools(&self, toolbox: &mut Toolbox) -> Result<()> {
        toolbox.push(Arc::new(FinalAnswerTool));
        if toolbox.len() < 2 {
            return Err(AgentError::Config(format!(
                "native tool calling needs at least one tool besides {FINAL_ANSWER_TOOL}"
            )));
        }
        Ok(())
    }

    fn system_prompt(&self, _task: &str, _toolbox: &Toolbox) -> Result<String> {
        Ok(NATIVE_PROMPT.to_string())
    }

    fn tool_descriptors(&self, toolbox: &Toolbox) -> Result<Vec<ToolDescriptor>> {
        toolbox.descriptors()
    }

    async fn process_iteration(&self, completion: &Completion, turn: &mut Turn<'_>) -> Result<()> {
        let Some(call) = completion.first_tool_call() else {
            return recover(turn, &ProtocolError::MissingToolCall);
        };

        let extra = completion
            .response_tool_calls
            .as_ref()
            .map_or(0, |calls| calls.len().saturating_sub(1));
        if extra > 0 {
            tracing::warn!(
                agent = %turn.agent_id(),
                iteration = turn.iteration(),
                ignored = extra,
                "Only the first tool call of a turn is processed"
            );
        }

        let arguments = match call.decoded_arguments() {
            Ok(arguments) => arguments,
            Err(e) => return recover(turn, &ProtocolError::InvalidJson(e.to_string())),
        };

        if call.name == FINAL_ANSWER_TOOL {
            return finish(turn, arguments);
        }

        let action = json!({ "tool": call.name, "arguments": arguments });
        turn.append(Message::assistant(format!("<action>{action}</action>")))?;

        if turn
            .toolbox()
            .get(&call.name)
            .is_some_and(|capability| capability.provider_managed())
        {
            // Already executed by the provider; its output is in the completion text
            return Ok(());
        }

        dispatch(turn, &call.name, arguments).await
    }
}

fn finish(turn: &mut Turn<'_>, arguments: Value) -> Result<()> {
    let tool: &'static FinalAnswerTool = &FinalAnswerTool;
    let schema = tool.arguments_schema()?;
    if let Err(errors) = schema.validate(&arguments) {
        return recover(
            turn,
            &ProtocolError::InvalidArguments {
                tool: FINAL_ANSWER_TOOL.to_string(),
                errors,
                schema: schema.to_pretty_json(),
            },
        );
    }

    let answer = arguments
        .get(FINAL_ANSWER_ARGUMENT)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    turn.append(Message::assistant(format!("<answer>{answer}</answer>")))?;
    turn.set_final_answer(answer);
    Ok(())
}
