//! # agent-core
//!
//! Agent execution loop with a provider-agnostic LLM gateway and a strict,
//! schema-validated tool system.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                            Agent                              │
//! │  ┌────────────┐   ┌────────────┐   ┌───────────────────────┐  │
//! │  │  Strategy  │   │  Toolbox   │   │      LlmGateway       │  │
//! │  │ react/native│──│ (registry) │──│   (any provider)      │  │
//! │  └────────────┘   └────────────┘   └───────────────────────┘  │
//! │         │               │                                     │
//! │         ▼               ▼                                     │
//! │   history entries   Invocation records ──▶ AgentStore         │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Model mistakes (bad JSON, unknown tools, invalid arguments) are fed back
//! to the model as `<observation>` entries. Everything else is fatal: the
//! agent is marked failed and the error is returned to the caller.
//!
//! ## Example
//!
//! ```rust,ignore
//! let mut agent = AgentBuilder::new()
//!     .gateway(Arc::new(gateway))
//!     .tools(["calculator", "current_time"])
//!     .max_iterations(5)
//!     .build("What is 6 times 7?")?;
//!
//! // On failure the agent still holds its failed status and reason
//! if let Err(err) = agent.run().await {
//!     eprintln!("{err} ({:?})", agent.status());
//! }
//! println!("{:?}", agent.final_answer());
//! ```

pub mod agent;
pub mod config;
pub mod error;
pub mod gateway;
pub mod invocation;
pub mod message;
pub mod registry;
pub mod schema;
pub mod store;
pub mod strategy;
pub mod tool;
pub mod tools;
pub mod turn;

#[cfg(test)]
pub(crate) mod testing;

pub use agent::{Agent, AgentBuilder, AgentId, AgentRecord, AgentStatus};
pub use config::AgentConfig;
pub use error::{AgentError, Result};
pub use gateway::{ChatRequest, Completion, GenerationOptions, LlmGateway, ResponseFormat, ToolCall, ToolDescriptor};
pub use invocation::{Invocation, InvocationStatus, SourceRef, invoke};
pub use message::{Conversation, Message, Role};
pub use registry::{CapabilityRegistry, Toolbox};
pub use schema::{Attrs, Schema, SchemaBuilder, ValidationError};
pub use store::{AgentStore, MemoryAgentStore};
pub use strategy::{NativeToolCallingStrategy, ReactStrategy, Strategy, StrategyKind};
pub use tool::{Capability, CapabilityExt};
