//! Per-iteration state handed to a strategy.

use serde_json::Value;

use crate::agent::AgentId;
use crate::error::Result;
use crate::invocation::{Invocation, SourceRef, invoke};
use crate::message::{Conversation, Message};
use crate::registry::Toolbox;
use crate::store::AgentStore;
use crate::tool::Capability;

/// Callback receiving every history entry as it is appended
pub type HistoryObserver = dyn Fn(&Message) + Send + Sync;

/// The one way anything is added to an agent's history: persist, keep in
/// memory, then notify the observer. The observer runs inline.
pub struct Transcript<'a> {
    agent_id: AgentId,
    history: &'a mut Conversation,
    store: &'a dyn AgentStore,
    observer: Option<&'a HistoryObserver>,
}

impl<'a> Transcript<'a> {
    pub fn new(
        agent_id: AgentId,
        history: &'a mut Conversation,
        store: &'a dyn AgentStore,
        observer: Option<&'a HistoryObserver>,
    ) -> Self {
        Self {
            agent_id,
            history,
            store,
            observer,
        }
    }

    pub fn append(&mut self, message: Message) -> Result<()> {
        self.store.append_history(&self.agent_id, &message)?;
        if let Some(observer) = self.observer {
            observer(&message);
        }
        self.history.push(message);
        Ok(())
    }

    pub fn history(&self) -> &Conversation {
        self.history
    }
}

/// What a strategy may see and do while interpreting one completion
pub struct Turn<'a> {
    iteration: u32,
    toolbox: &'a Toolbox,
    store: &'a dyn AgentStore,
    transcript: Transcript<'a>,
    final_answer: &'a mut Option<String>,
}

impl<'a> Turn<'a> {
    pub fn new(
        iteration: u32,
        toolbox: &'a Toolbox,
        store: &'a dyn AgentStore,
        transcript: Transcript<'a>,
        final_answer: &'a mut Option<String>,
    ) -> Self {
        Self {
            iteration,
            toolbox,
            store,
            transcript,
            final_answer,
        }
    }

    pub const fn iteration(&self) -> u32 {
        self.iteration
    }

    pub const fn agent_id(&self) -> AgentId {
        self.transcript.agent_id
    }

    pub const fn toolbox(&self) -> &'a Toolbox {
        self.toolbox
    }

    /// Append one history entry
    pub fn append(&mut self, message: Message) -> Result<()> {
        self.transcript.append(message)
    }

    /// Setting the answer is what ends the run
    pub fn set_final_answer(&mut self, answer: impl Into<String>) {
        *self.final_answer = Some(answer.into());
    }

    pub fn final_answer(&self) -> Option<&str> {
        self.final_answer.as_deref()
    }

    /// Where invocations from this turn are attributed
    pub const fn source(&self) -> SourceRef {
        SourceRef::Agent {
            id: self.transcript.agent_id,
            iteration: self.iteration,
        }
    }

    /// Validate, execute and record an invocation for this turn
    pub async fn invoke(&self, capability: &dyn Capability, arguments: Value) -> Result<Invocation> {
        invoke(capability, arguments, self.source(), self.store).await
    }
}
