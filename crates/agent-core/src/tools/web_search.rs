//! Provider-managed web search.
//!
//! Advertised to the gateway so providers with a hosted search tool can run
//! it themselves. The agent never executes it.

use async_trait::async_trait;
use once_cell::sync::OnceCell;
use serde_json::{Value, json};

use crate::error::{AgentError, Result};
use crate::invocation::Invocation;
use crate::schema::{Schema, SchemaBuilder};
use crate::tool::Capability;

pub struct WebSearchTool;

#[async_trait]
impl Capability for WebSearchTool {
    fn description(&self) -> Option<&str> {
        Some("Search the web for up-to-date information. Runs on the model provider's side.")
    }

    fn arguments_schema(&self) -> Result<&Schema> {
        static SCHEMA: OnceCell<Schema> = OnceCell::new();
        SCHEMA.get_or_try_init(|| SchemaBuilder::new().string("query", "Search query").build())
    }

    fn example_invocation(&self) -> Option<Value> {
        Some(json!({ "query": "current population of Tokyo" }))
    }

    fn provider_managed(&self) -> bool {
        true
    }

    async fn process_invocation(&self, _invocation: &Invocation) -> Result<Value> {
        Err(AgentError::tool(
            "web_search",
            "executed by the model provider, not by the agent",
        ))
    }
}
