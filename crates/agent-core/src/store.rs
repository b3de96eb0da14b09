//! Persistence
//!
//! The agent writes through `AgentStore` after every state change, so a run
//! can be inspected (or reloaded) from the store at any point. The store is
//! assumed to serialise individual writes; the agent does no locking of its
//! own.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use crate::agent::{AgentId, AgentRecord};
use crate::error::{AgentError, Result};
use crate::invocation::{Invocation, InvocationId, InvocationStatus, SourceRef};
use crate::message::Message;

/// Store trait for agent runs and their tool invocations
pub trait AgentStore: Send + Sync {
    /// Insert or overwrite an agent record
    fn save_agent(&self, agent: &AgentRecord) -> Result<()>;

    /// Load an agent by ID
    fn load_agent(&self, id: &AgentId) -> Result<Option<AgentRecord>>;

    /// Persist the iteration counter of a stored agent
    fn record_iteration(&self, id: &AgentId, iteration_count: u32) -> Result<()>;

    /// Append one entry to a stored agent's history
    fn append_history(&self, id: &AgentId, message: &Message) -> Result<()>;

    /// Store a new pending invocation
    fn insert_invocation(&self, invocation: &Invocation) -> Result<()>;

    /// Write result and terminal status of a pending invocation in one step
    fn finish_invocation(&self, invocation: &Invocation) -> Result<()>;

    /// Load an invocation by ID
    fn load_invocation(&self, id: &InvocationId) -> Result<Option<Invocation>>;

    /// Invocations produced by a source, oldest first
    fn invocations_for(&self, source: &SourceRef) -> Result<Vec<Invocation>>;
}

/// In-memory store (for development/testing)
#[derive(Default)]
pub struct MemoryAgentStore {
    agents: RwLock<HashMap<AgentId, AgentRecord>>,
    invocations: RwLock<Vec<Invocation>>,
}

fn poisoned<T>(_: PoisonError<T>) -> AgentError {
    AgentError::Store("lock poisoned".into())
}

impl MemoryAgentStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_agent<F>(&self, id: &AgentId, update: F) -> Result<()>
    where
        F: FnOnce(&mut AgentRecord),
    {
        let mut agents = self.agents.write().map_err(poisoned)?;
        let agent = agents
            .get_mut(id)
            .ok_or_else(|| AgentError::Store(format!("agent {id} not found")))?;
        update(agent);
        Ok(())
    }
}

impl AgentStore for MemoryAgentStore {
    fn save_agent(&self, agent: &AgentRecord) -> Result<()> {
        let mut agents = self.agents.write().map_err(poisoned)?;
        agents.insert(agent.id, agent.clone());
        Ok(())
    }

    fn load_agent(&self, id: &AgentId) -> Result<Option<AgentRecord>> {
        let agents = self.agents.read().map_err(poisoned)?;
        Ok(agents.get(id).cloned())
    }

    fn record_iteration(&self, id: &AgentId, iteration_count: u32) -> Result<()> {
        self.with_agent(id, |agent| agent.iteration_count = iteration_count)
    }

    fn append_history(&self, id: &AgentId, message: &Message) -> Result<()> {
        self.with_agent(id, |agent| agent.conversation_history.push(message.clone()))
    }

    fn insert_invocation(&self, invocation: &Invocation) -> Result<()> {
        let mut invocations = self.invocations.write().map_err(poisoned)?;
        if invocations.iter().any(|i| i.id == invocation.id) {
            return Err(AgentError::Store(format!(
                "invocation {} already exists",
                invocation.id
            )));
        }
        invocations.push(invocation.clone());
        Ok(())
    }

    fn finish_invocation(&self, invocation: &Invocation) -> Result<()> {
        if !invocation.status.is_terminal() {
            return Err(AgentError::InvalidTransition(format!(
                "invocation {} is still pending",
                invocation.id
            )));
        }

        let mut invocations = self.invocations.write().map_err(poisoned)?;
        let stored = invocations
            .iter_mut()
            .find(|i| i.id == invocation.id)
            .ok_or_else(|| AgentError::Store(format!("invocation {} not found", invocation.id)))?;

        if stored.status != InvocationStatus::Pending {
            return Err(AgentError::InvalidTransition(format!(
                "invocation {} is already {:?}",
                invocation.id, stored.status
            )));
        }

        *stored = invocation.clone();
        Ok(())
    }

    fn load_invocation(&self, id: &InvocationId) -> Result<Option<Invocation>> {
        let invocations = self.invocations.read().map_err(poisoned)?;
        Ok(invocations.iter().find(|i| &i.id == id).cloned())
    }

    fn invocations_for(&self, source: &SourceRef) -> Result<Vec<Invocation>> {
        let invocations = self.invocations.read().map_err(poisoned)?;
        Ok(invocations
            .iter()
            .filter(|i| &i.source == source)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::AgentStatus;
    use crate::strategy::StrategyKind;
    use crate::testing::EchoTool;
    use serde_json::json;

    fn record() -> AgentRecord {
        AgentRecord::new(
            "What is the capital of France?",
            "system prompt",
            vec!["echo".into()],
            StrategyKind::React,
            "llama3.2",
            3,
        )
    }

    #[test]
    fn test_history_round_trip() {
        let store = MemoryAgentStore::new();
        let agent = record();
        store.save_agent(&agent).unwrap();

        let entries = vec![
            Message::user("What is the capital of France?"),
            Message::assistant("<thought>I know this.</thought>"),
            Message::observation("{\n  \"city\": \"Paris\"\n}"),
            Message::assistant("<answer>Paris</answer>"),
        ];
        for entry in &entries {
            store.append_history(&agent.id, entry).unwrap();
        }

        let loaded = store.load_agent(&agent.id).unwrap().unwrap();
        assert_eq!(loaded.conversation_history.messages(), entries.as_slice());
        assert_eq!(loaded.status, AgentStatus::Pending);
    }

    #[test]
    fn test_record_iteration_requires_saved_agent() {
        let store = MemoryAgentStore::new();
        let agent = record();
        assert!(matches!(
            store.record_iteration(&agent.id, 1),
            Err(AgentError::Store(_))
        ));

        store.save_agent(&agent).unwrap();
        store.record_iteration(&agent.id, 2).unwrap();
        assert_eq!(store.load_agent(&agent.id).unwrap().unwrap().iteration_count, 2);
    }

    #[test]
    fn test_finish_invocation_only_once() {
        let store = MemoryAgentStore::new();
        let source = SourceRef::Caller { id: "test".into() };
        let mut invocation = Invocation::new(&EchoTool, json!({"text": "hi"}), source).unwrap();

        store.insert_invocation(&invocation).unwrap();
        assert!(matches!(
            store.finish_invocation(&invocation),
            Err(AgentError::InvalidTransition(_))
        ));

        invocation.complete(json!("hi")).unwrap();
        store.finish_invocation(&invocation).unwrap();
        assert!(matches!(
            store.finish_invocation(&invocation),
            Err(AgentError::InvalidTransition(_))
        ));

        let loaded = store.load_invocation(&invocation.id).unwrap().unwrap();
        assert_eq!(loaded.status, InvocationStatus::Completed);
    }

    #[test]
    fn test_insert_invocation_rejects_duplicates() {
        let store = MemoryAgentStore::new();
        let source = SourceRef::Caller { id: "test".into() };
        let invocation = Invocation::new(&EchoTool, json!({"text": "hi"}), source).unwrap();

        store.insert_invocation(&invocation).unwrap();
        assert!(store.insert_invocation(&invocation).is_err());
    }
}
