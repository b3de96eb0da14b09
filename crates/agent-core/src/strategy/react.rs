//! Tag-based (ReAct) strategy.
//!
//! Reads the first `<thought>`, `<answer>` and `<action>` block of the raw
//! completion text. A second block of the same tag in one turn is ignored.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use super::{ProtocolError, Strategy, StrategyKind, decode_arguments, dispatch, recover};
use crate::error::Result;
use crate::gateway::Completion;
use crate::message::Message;
use crate::registry::Toolbox;
use crate::turn::Turn;

static THOUGHT: Lazy<Regex> = Lazy::new(|| tag_pattern("thought"));
static ACTION: Lazy<Regex> = Lazy::new(|| tag_pattern("action"));
static ANSWER: Lazy<Regex> = Lazy::new(|| tag_pattern("answer"));

fn tag_pattern(tag: &str) -> Regex {
    Regex::new(&format!(r"(?s)<{tag}>(.*?)</{tag}>")).expect("tag pattern is a valid regex")
}

/// First occurrence of a tag: the whole block and its trimmed body
fn extract<'t>(pattern: &Regex, text: &'t str) -> Option<(&'t str, &'t str)> {
    let captures = pattern.captures(text)?;
    let block = captures.get(0)?.as_str();
    let body = captures.get(1)?.as_str().trim();
    Some((block, body))
}

const REACT_PROMPT: &str = r#"You are an intelligent assistant that works through tasks step by step using the ReAct (Reasoning + Acting) pattern.

# Available Tools
You have access to the following tools:
{tools}

# Response Format
On every turn, respond with exactly one of the following:

1. Reason about what to do next, then call one tool:
<thought>Your reasoning about the next step.</thought>
<action>{"tool": "tool_name", "arguments": {"argument_name": "value"}}</action>

2. Once you know the answer, give it:
<thought>Your reasoning about the final answer.</thought>
<answer>Your complete final answer to the task.</answer>

# Rules
- The content of <action> must be a single JSON object with the keys "tool" and "arguments".
- "arguments" must match the tool's arguments schema exactly.
- Call only one tool per turn, then wait for its result.
- Tool results are returned to you inside <observation> tags. Never write <observation> tags yourself.
- If an observation reports an error, correct your action and try again.
- Always finish with an <answer>."#;

/// Free-text strategy driven by XML-like tags
pub struct ReactStrategy;

#[async_trait]
impl Strategy for ReactStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::React
    }

    fn system_prompt(&self, _task: &str, toolbox: &Toolbox) -> Result<String> {
        Ok(REACT_PROMPT.replace("{tools}", &toolbox.prompt_section()?))
    }

    async fn process_iteration(&self, completion: &Completion, turn: &mut Turn<'_>) -> Result<()> {
        let text = completion.content();

        if let Some((block, _)) = extract(&THOUGHT, text) {
            turn.append(Message::assistant(block))?;
        }

        if let Some((block, answer)) = extract(&ANSWER, text) {
            turn.set_final_answer(answer);
            return turn.append(Message::assistant(block));
        }

        let Some((block, action)) = extract(&ACTION, text) else {
            tracing::debug!(
                agent = %turn.agent_id(),
                iteration = turn.iteration(),
                "No action or answer in completion"
            );
            return Ok(());
        };

        turn.append(Message::assistant(block))?;

        let action: Value = match serde_json::from_str(action) {
            Ok(value) => value,
            Err(e) => return recover(turn, &ProtocolError::InvalidJson(e.to_string())),
        };

        let (Some(Value::String(tool)), Some(arguments)) = (action.get("tool"), action.get("arguments")) else {
            return recover(turn, &ProtocolError::MissingKeys);
        };

        dispatch(turn, tool, decode_arguments(arguments.clone())).await
    }
}
