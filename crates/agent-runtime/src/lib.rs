//! # agent-runtime
//!
//! Concrete LLM gateways for agent-core.
//!
//! ## Gateways
//!
//! - **Ollama** (default): local inference via `/api/chat`, with native
//!   tool calling and JSON mode
//!
//! ## Usage
//!
//! ```rust,ignore
//! use agent_runtime::OllamaGateway;
//!
//! let gateway = OllamaGateway::new("http://localhost", 11434)?;
//! let agent = AgentBuilder::new()
//!     .gateway(Arc::new(gateway))
//!     .tools(["calculator"])
//!     .build("What is 2 + 2?")?;
//! ```

#[cfg(feature = "ollama")]
pub mod ollama;

#[cfg(feature = "ollama")]
pub use ollama::{OllamaConfig, OllamaGateway};

// Re-export core types for convenience
pub use agent_core::{
    Agent, AgentBuilder, AgentConfig, AgentError, CapabilityRegistry, LlmGateway, Message, Result,
    Role, StrategyKind,
};
