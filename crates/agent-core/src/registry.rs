//! Capability Registry
//!
//! Maps stable string identifiers to capability instances. Populated once at
//! process start; agents resolve their tool list against it by name.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{AgentError, Result};
use crate::gateway::ToolDescriptor;
use crate::invocation::ensure_documented;
use crate::tool::{Capability, CapabilityExt};
use crate::tools::{CalculatorTool, CurrentTimeTool, FinalAnswerTool, WebSearchTool};

/// Registry for available capabilities
#[derive(Clone, Default)]
pub struct CapabilityRegistry {
    capabilities: HashMap<String, Arc<dyn Capability>>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in capability
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(FinalAnswerTool);
        registry.register(CurrentTimeTool);
        registry.register(CalculatorTool);
        registry.register(WebSearchTool);
        registry
    }

    /// Register a new capability under its own name
    pub fn register<T: Capability + 'static>(&mut self, capability: T) {
        self.register_arc(Arc::new(capability));
    }

    /// Register a shared capability
    pub fn register_arc(&mut self, capability: Arc<dyn Capability>) {
        self.capabilities.insert(capability.name(), capability);
    }

    /// Get a capability by identifier
    pub fn get(&self, name: &str) -> Option<Arc<dyn Capability>> {
        self.capabilities.get(name).cloned()
    }

    /// Registered identifiers, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.capabilities.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.capabilities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.capabilities.is_empty()
    }

    /// Build an ordered toolbox from identifiers. Unknown or incomplete
    /// capabilities are an error; duplicates are dropped.
    pub fn resolve<S: AsRef<str>>(&self, ids: &[S]) -> Result<Toolbox> {
        let mut toolbox = Toolbox::default();
        for id in ids {
            let id = id.as_ref();
            let capability = self
                .get(id)
                .ok_or_else(|| AgentError::UnknownCapability(id.to_string()))?;
            ensure_documented(capability.as_ref())?;
            toolbox.push(capability);
        }
        Ok(toolbox)
    }
}

/// The ordered set of capabilities one agent may use
#[derive(Clone, Default)]
pub struct Toolbox {
    capabilities: Vec<Arc<dyn Capability>>,
}

impl Toolbox {
    /// Append a capability unless one with the same name is present
    pub fn push(&mut self, capability: Arc<dyn Capability>) -> bool {
        if self.contains(&capability.name()) {
            return false;
        }
        self.capabilities.push(capability);
        true
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Capability>> {
        self.capabilities.iter().find(|c| c.name() == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn names(&self) -> Vec<String> {
        self.capabilities.iter().map(|c| c.name()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Capability>> {
        self.capabilities.iter()
    }

    pub fn len(&self) -> usize {
        self.capabilities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.capabilities.is_empty()
    }

    /// Descriptors for native tool calling, in toolbox order
    pub fn descriptors(&self) -> Result<Vec<ToolDescriptor>> {
        self.capabilities.iter().map(|c| c.descriptor()).collect()
    }

    /// Every capability's LLM description, separated for the system prompt
    pub fn prompt_section(&self) -> Result<String> {
        let blocks = self
            .capabilities
            .iter()
            .map(|c| c.description_for_llm())
            .collect::<Result<Vec<_>>>()?;
        Ok(blocks.join("\n---\n"))
    }
}

impl std::fmt::Debug for Toolbox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}
