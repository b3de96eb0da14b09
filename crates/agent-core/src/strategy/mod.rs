//! Iteration Strategies
//!
//! A strategy turns one gateway completion into history entries, tool
//! invocations and, eventually, a final answer. Two are provided:
//!
//! - [`ReactStrategy`]: the model writes `<thought>`, `<action>` and
//!   `<answer>` tags in plain text.
//! - [`NativeToolCallingStrategy`]: the model uses the provider's structured
//!   tool calls and finishes by calling `agent_final_answer`.
//!
//! Both only honour the first action or tool call of a turn.

mod native;
mod react;

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{AgentError, Result};
use crate::gateway::{Completion, ResponseFormat, ToolDescriptor};
use crate::invocation::observation_text;
use crate::message::Message;
use crate::registry::Toolbox;
use crate::schema::ValidationError;
use crate::tool::Capability;
use crate::turn::Turn;

pub use native::NativeToolCallingStrategy;
pub use react::ReactStrategy;

/// Interpreter of gateway completions
#[async_trait]
pub trait Strategy: Send + Sync {
    fn kind(&self) -> StrategyKind;

    /// Adjust the agent's tools once, at construction
    fn normalize_tools(&self, _toolbox: &mut Toolbox) -> Result<()> {
        Ok(())
    }

    /// Built once per agent, never regenerated
    fn system_prompt(&self, task: &str, toolbox: &Toolbox) -> Result<String>;

    /// Tools to hand the gateway on every call
    fn tool_descriptors(&self, _toolbox: &Toolbox) -> Result<Vec<ToolDescriptor>> {
        Ok(Vec::new())
    }

    fn response_format(&self) -> ResponseFormat {
        ResponseFormat::Text
    }

    /// Interpret one completion
    async fn process_iteration(&self, completion: &Completion, turn: &mut Turn<'_>) -> Result<()>;
}

/// Available strategies
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    #[default]
    React,
    NativeToolCalling,
}

impl StrategyKind {
    pub fn build(self) -> Box<dyn Strategy> {
        match self {
            Self::React => Box::new(ReactStrategy),
            Self::NativeToolCalling => Box::new(NativeToolCallingStrategy),
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::React => write!(f, "react"),
            Self::NativeToolCalling => write!(f, "native_tool_calling"),
        }
    }
}

impl std::str::FromStr for StrategyKind {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "react" => Ok(Self::React),
            "native" | "native_tool_calling" => Ok(Self::NativeToolCalling),
            other => Err(AgentError::Config(format!(
                "unknown strategy '{other}' (expected 'react' or 'native')"
            ))),
        }
    }
}

/// Model mistakes the agent recovers from by telling the model about them
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ProtocolError {
    InvalidJson(String),
    MissingKeys,
    UnknownTool {
        name: String,
        available: Vec<String>,
    },
    InvalidArguments {
        tool: String,
        errors: Vec<ValidationError>,
        schema: String,
    },
    ProviderManaged(String),
    MissingToolCall,
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidJson(err) => write!(
                f,
                "Error: the action is not valid JSON ({err}). Provide a single JSON object."
            ),
            Self::MissingKeys => write!(
                f,
                r#"Error: invalid action format. Use {{"tool": "tool_name", "arguments": {{...}}}} with both keys."#
            ),
            Self::UnknownTool { name, available } => write!(
                f,
                "Error: tool '{name}' not found. Available tools: {}",
                available.join(", ")
            ),
            Self::InvalidArguments {
                tool,
                errors,
                schema,
            } => {
                let errors = errors.iter().map(ToString::to_string).collect::<Vec<_>>();
                write!(
                    f,
                    "Error: invalid arguments for tool '{tool}' ({}). The arguments must match this schema:\n{schema}",
                    errors.join("; ")
                )
            }
            Self::ProviderManaged(name) => write!(
                f,
                "Error: tool '{name}' is run by the model provider and cannot be called as an action."
            ),
            Self::MissingToolCall => write!(
                f,
                "Error: no tool call found. You must call one of the available tools on every turn. \
                 Call agent_final_answer when you have the final answer."
            ),
        }
    }
}

/// Tell the model what went wrong and carry on
pub(crate) fn recover(turn: &mut Turn<'_>, error: &ProtocolError) -> Result<()> {
    tracing::warn!(
        agent = %turn.agent_id(),
        iteration = turn.iteration(),
        error = %error,
        "Recoverable protocol error"
    );
    turn.append(Message::observation(error))
}

/// Look up, validate and execute a requested tool, recording the observation
pub(crate) async fn dispatch(turn: &mut Turn<'_>, name: &str, arguments: Value) -> Result<()> {
    let toolbox = turn.toolbox();
    let Some(capability) = toolbox.get(name) else {
        return recover(
            turn,
            &ProtocolError::UnknownTool {
                name: name.to_string(),
                available: toolbox.names(),
            },
        );
    };

    if capability.provider_managed() {
        return recover(turn, &ProtocolError::ProviderManaged(name.to_string()));
    }

    let schema = capability.arguments_schema()?;
    if let Err(errors) = schema.validate(&arguments) {
        return recover(
            turn,
            &ProtocolError::InvalidArguments {
                tool: name.to_string(),
                errors,
                schema: schema.to_pretty_json(),
            },
        );
    }

    let invocation = turn.invoke(capability.as_ref(), arguments).await?;
    let observation = observation_text(capability.as_ref(), &invocation);
    turn.append(Message::observation(observation))
}

/// Decode arguments sent as an encoded JSON string, leave anything else
pub(crate) fn decode_arguments(arguments: Value) -> Value {
    match arguments {
        Value::String(encoded) => {
            serde_json::from_str(&encoded).unwrap_or(Value::String(encoded))
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_kind_parsing() {
        assert_eq!("react".parse::<StrategyKind>().unwrap(), StrategyKind::React);
        assert_eq!(
            "Native".parse::<StrategyKind>().unwrap(),
            StrategyKind::NativeToolCalling
        );
        assert_eq!(
            "native-tool-calling".parse::<StrategyKind>().unwrap(),
            StrategyKind::NativeToolCalling
        );
        assert!("plan_and_solve".parse::<StrategyKind>().is_err());
    }

    #[test]
    fn test_unknown_tool_message() {
        let err = ProtocolError::UnknownTool {
            name: "missing_tool".into(),
            available: vec!["calculator".into(), "current_time".into()],
        };
        assert_eq!(
            err.to_string(),
            "Error: tool 'missing_tool' not found. Available tools: calculator, current_time"
        );
    }

    #[test]
    fn test_decode_arguments() {
        assert_eq!(
            decode_arguments(Value::String(r#"{"a":1}"#.into())),
            serde_json::json!({"a": 1})
        );
        assert_eq!(
            decode_arguments(Value::String("nope".into())),
            Value::String("nope".into())
        );
    }
}
