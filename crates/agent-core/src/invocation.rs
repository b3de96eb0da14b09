//! Tool Invocations
//!
//! One record per attempt to execute a capability. A record is only ever
//! built from schema-valid arguments, starts `pending`, and moves exactly
//! once to `completed` or `failed`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::agent::AgentId;
use crate::error::{AgentError, Result};
use crate::store::AgentStore;
use crate::tool::{Capability, CapabilityExt};

/// Unique invocation identifier
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InvocationId(Uuid);

impl InvocationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for InvocationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for InvocationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Who asked for an invocation
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceRef {
    /// An agent, on a given iteration
    Agent { id: AgentId, iteration: u32 },
    /// Application code calling a capability directly
    Caller { id: String },
}

/// Invocation status
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvocationStatus {
    Pending,
    Completed,
    Failed,
}

impl InvocationStatus {
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// One attempt to run a capability
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Invocation {
    pub id: InvocationId,
    pub source: SourceRef,
    pub capability_name: String,
    pub arguments: Value,
    pub result: Option<Value>,
    /// Error message, set only when failed
    pub failure: Option<String>,
    pub status: InvocationStatus,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl Invocation {
    /// Build a pending record. Arguments that do not satisfy the schema are
    /// a caller bug, not a model mistake, and fail hard.
    pub fn new<C>(capability: &C, arguments: Value, source: SourceRef) -> Result<Self>
    where
        C: Capability + ?Sized,
    {
        let capability_name = capability.name();
        capability
            .arguments_schema()?
            .validate(&arguments)
            .map_err(|errors| AgentError::InvalidInvocationArguments {
                tool: capability_name.clone(),
                errors,
            })?;

        Ok(Self {
            id: InvocationId::new(),
            source,
            capability_name,
            arguments,
            result: None,
            failure: None,
            status: InvocationStatus::Pending,
            created_at: Utc::now(),
            finished_at: None,
        })
    }

    pub fn complete(&mut self, result: Value) -> Result<()> {
        self.finish(InvocationStatus::Completed)?;
        self.result = Some(result);
        Ok(())
    }

    pub fn fail(&mut self, reason: impl Into<String>) -> Result<()> {
        self.finish(InvocationStatus::Failed)?;
        self.failure = Some(reason.into());
        Ok(())
    }

    fn finish(&mut self, status: InvocationStatus) -> Result<()> {
        if self.status.is_terminal() {
            return Err(AgentError::InvalidTransition(format!(
                "invocation {} is already {:?}",
                self.id, self.status
            )));
        }
        self.status = status;
        self.finished_at = Some(Utc::now());
        Ok(())
    }
}

/// Validate, execute and record one invocation.
///
/// The record is stored as pending, then the capability runs. Its result
/// and terminal status are written together with one store call. If the
/// capability fails, the record is marked failed and the capability's error
/// is returned, even when the store rejects the failed record.
pub async fn invoke<C>(
    capability: &C,
    arguments: Value,
    source: SourceRef,
    store: &dyn AgentStore,
) -> Result<Invocation>
where
    C: Capability + ?Sized,
{
    let mut invocation = Invocation::new(capability, arguments, source)?;
    store.insert_invocation(&invocation)?;

    tracing::debug!(
        tool = %invocation.capability_name,
        invocation = %invocation.id,
        "Executing tool"
    );

    match capability.process_invocation(&invocation).await {
        Ok(result) => {
            invocation.complete(result)?;
            store.finish_invocation(&invocation)?;
            Ok(invocation)
        }
        Err(err) => {
            tracing::warn!(
                tool = %invocation.capability_name,
                invocation = %invocation.id,
                error = %err,
                "Tool execution failed"
            );
            invocation.fail(err.to_string())?;
            // The tool error takes precedence over a store error
            if let Err(store_err) = store.finish_invocation(&invocation) {
                tracing::error!(
                    tool = %invocation.capability_name,
                    invocation = %invocation.id,
                    error = %store_err,
                    "Could not record failed invocation"
                );
            }
            Err(err)
        }
    }
}

/// Text for the model after a successful invocation
pub fn observation_text<C>(capability: &C, invocation: &Invocation) -> String
where
    C: Capability + ?Sized,
{
    if capability.renders_observation_to_model() {
        capability.format_observation(invocation)
    } else {
        format!("Tool '{}' completed.", invocation.capability_name)
    }
}

/// Descriptor check used by callers that want to fail fast on incomplete tools
pub fn ensure_documented<C>(capability: &C) -> Result<()>
where
    C: Capability + ?Sized,
{
    capability.require_description()?;
    capability.require_example()?;
    capability.arguments_schema()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryAgentStore;
    use crate::testing::{EchoTool, FailingTool, QuietTool};
    use serde_json::json;

    fn caller() -> SourceRef {
        SourceRef::Caller { id: "test".into() }
    }

    #[test]
    fn test_new_rejects_invalid_arguments() {
        let err = Invocation::new(&EchoTool, json!({"txt": "hi"}), caller()).unwrap_err();
        match err {
            AgentError::InvalidInvocationArguments { tool, errors } => {
                assert_eq!(tool, "echo");
                assert_eq!(errors.len(), 2);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_status_transitions_once() {
        let mut invocation = Invocation::new(&EchoTool, json!({"text": "hi"}), caller()).unwrap();
        assert_eq!(invocation.status, InvocationStatus::Pending);

        invocation.complete(json!("hi")).unwrap();
        assert_eq!(invocation.status, InvocationStatus::Completed);
        assert!(invocation.finished_at.is_some());

        assert!(matches!(
            invocation.fail("late"),
            Err(AgentError::InvalidTransition(_))
        ));
        assert_eq!(invocation.status, InvocationStatus::Completed);
        assert!(invocation.failure.is_none());
    }

    #[tokio::test]
    async fn test_invoke_completes_exactly_one_record() {
        let store = MemoryAgentStore::new();
        let source = caller();

        let invocation = invoke(&EchoTool, json!({"text": "hi"}), source.clone(), &store)
            .await
            .unwrap();

        assert_eq!(invocation.result, Some(json!("hi")));
        let stored = store.invocations_for(&source).unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].status, InvocationStatus::Completed);
        assert_eq!(stored[0], invocation);
    }

    #[tokio::test]
    async fn test_invoke_failure_marks_failed_and_propagates() {
        let store = MemoryAgentStore::new();
        let source = caller();

        let err = invoke(&FailingTool, json!({}), source.clone(), &store)
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::ToolExecution { ref tool, .. } if tool == "failing"));

        let stored = store.invocations_for(&source).unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].status, InvocationStatus::Failed);
        assert_eq!(stored[0].failure.as_deref(), Some(err.to_string().as_str()));
        assert!(stored[0].result.is_none());
    }

    /// Accepts everything except terminal invocation writes
    struct RejectingFinishStore(MemoryAgentStore);

    impl AgentStore for RejectingFinishStore {
        fn save_agent(&self, agent: &crate::agent::AgentRecord) -> Result<()> {
            self.0.save_agent(agent)
        }

        fn load_agent(&self, id: &AgentId) -> Result<Option<crate::agent::AgentRecord>> {
            self.0.load_agent(id)
        }

        fn record_iteration(&self, id: &AgentId, iteration_count: u32) -> Result<()> {
            self.0.record_iteration(id, iteration_count)
        }

        fn append_history(&self, id: &AgentId, message: &crate::message::Message) -> Result<()> {
            self.0.append_history(id, message)
        }

        fn insert_invocation(&self, invocation: &Invocation) -> Result<()> {
            self.0.insert_invocation(invocation)
        }

        fn finish_invocation(&self, _invocation: &Invocation) -> Result<()> {
            Err(AgentError::Store("disk full".into()))
        }

        fn load_invocation(&self, id: &InvocationId) -> Result<Option<Invocation>> {
            self.0.load_invocation(id)
        }

        fn invocations_for(&self, source: &SourceRef) -> Result<Vec<Invocation>> {
            self.0.invocations_for(source)
        }
    }

    #[tokio::test]
    async fn test_tool_error_wins_over_store_error() {
        let store = RejectingFinishStore(MemoryAgentStore::new());
        let source = caller();

        let err = invoke(&FailingTool, json!({}), source.clone(), &store)
            .await
            .unwrap_err();

        assert!(matches!(err, AgentError::ToolExecution { ref tool, .. } if tool == "failing"));
        let stored = store.invocations_for(&source).unwrap();
        assert_eq!(stored[0].status, InvocationStatus::Pending);
    }

    #[tokio::test]
    async fn test_invoke_with_invalid_arguments_stores_nothing() {
        let store = MemoryAgentStore::new();
        let source = caller();

        let result = invoke(&EchoTool, json!({}), source.clone(), &store).await;
        assert!(matches!(result, Err(AgentError::InvalidInvocationArguments { .. })));
        assert!(store.invocations_for(&source).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_observation_text_respects_render_flag() {
        let store = MemoryAgentStore::new();
        let echoed = invoke(&EchoTool, json!({"text": "hi"}), caller(), &store).await.unwrap();
        assert_eq!(observation_text(&EchoTool, &echoed), "hi");

        let quiet = invoke(&QuietTool, json!({}), caller(), &store).await.unwrap();
        assert_eq!(observation_text(&QuietTool, &quiet), "Tool 'quiet' completed.");
    }

    #[test]
    fn test_source_ref_serializes_tagged() {
        let id = AgentId::new();
        let source = SourceRef::Agent { id, iteration: 2 };
        let value = serde_json::to_value(&source).unwrap();
        assert_eq!(value["kind"], json!("agent"));
        assert_eq!(value["iteration"], json!(2));
    }
}
