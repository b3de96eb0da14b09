//! Error Types
//!
//! Only the fatal tier lives here. Protocol mistakes made by the model
//! (bad JSON, unknown tools, invalid arguments) never become an
//! `AgentError`; the strategies turn them into observations instead.

use thiserror::Error;

use crate::schema::ValidationError;

/// Result type alias for agent operations
pub type Result<T> = std::result::Result<T, AgentError>;

/// Agent error types
#[derive(Error, Debug)]
pub enum AgentError {
    /// LLM gateway error
    #[error("Gateway error: {0}")]
    Gateway(String),

    /// Gateway unavailable or not responding
    #[error("Gateway unavailable: {0}")]
    GatewayUnavailable(String),

    /// Capability id not present in the registry
    #[error("Unknown capability: {0}")]
    UnknownCapability(String),

    /// Arguments handed to an invocation record did not match the schema
    #[error("Invalid arguments for '{tool}': {}", join_errors(.errors))]
    InvalidInvocationArguments {
        tool: String,
        errors: Vec<ValidationError>,
    },

    /// The schema builder was used in a way that cannot produce a schema
    #[error("Schema misuse: {0}")]
    SchemaMisuse(String),

    /// A capability was used before a required field was defined
    #[error("Capability '{capability}' has no {field}")]
    CapabilityIncomplete {
        capability: String,
        field: &'static str,
    },

    /// Tool execution failed
    #[error("Tool '{tool}' failed: {message}")]
    ToolExecution { tool: String, message: String },

    /// Illegal lifecycle change on an agent or invocation
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Persistence error
    #[error("Store error: {0}")]
    Store(String),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Other/unknown error
    #[error("{0}")]
    Other(String),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl AgentError {
    /// Build a tool execution error from anything displayable
    pub fn tool(tool: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::ToolExecution {
            tool: tool.into(),
            message: message.to_string(),
        }
    }

    /// Check if a caller could sensibly retry the whole run
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::GatewayUnavailable(_))
    }

    /// Convert to a user-friendly message
    pub fn user_message(&self) -> String {
        match self {
            Self::Gateway(msg) => format!("The AI service encountered an error: {msg}"),
            Self::GatewayUnavailable(_) => {
                "The AI service is currently unavailable. Please try again.".into()
            }
            Self::UnknownCapability(name) => format!("The tool '{name}' is not available."),
            Self::ToolExecution { tool, message } => format!("Tool '{tool}' failed: {message}"),
            Self::Config(msg) => format!("Invalid configuration: {msg}"),
            _ => "An unexpected error occurred.".into(),
        }
    }
}

impl From<anyhow::Error> for AgentError {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_arguments_message_lists_every_error() {
        let err = AgentError::InvalidInvocationArguments {
            tool: "calculator".into(),
            errors: vec![
                ValidationError::new("/expression", "is required"),
                ValidationError::new("/extra", "is not allowed"),
            ],
        };

        let msg = err.to_string();
        assert!(msg.starts_with("Invalid arguments for 'calculator'"));
        assert!(msg.contains("/expression: is required"));
        assert!(msg.contains("/extra: is not allowed"));
    }

    #[test]
    fn test_retryable() {
        assert!(AgentError::GatewayUnavailable("down".into()).is_retryable());
        assert!(!AgentError::tool("calculator", "boom").is_retryable());
    }
}
