//! Agent Loop
//!
//! One [`Agent`] is one run: it owns the conversation history and the
//! iteration budget, calls the gateway once per iteration and lets its
//! strategy interpret the completion. Lifecycle:
//!
//! ```text
//! pending ──run()──▶ running ──▶ completed   (answer found or budget spent)
//!                           └──▶ failed      (any fatal error, re-raised)
//! ```

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::AgentConfig;
use crate::error::{AgentError, Result};
use crate::gateway::{ChatRequest, GenerationOptions, LlmGateway, ResponseFormat, ToolDescriptor};
use crate::message::{Conversation, Message};
use crate::registry::{CapabilityRegistry, Toolbox};
use crate::store::{AgentStore, MemoryAgentStore};
use crate::strategy::{Strategy, StrategyKind};
use crate::turn::{HistoryObserver, Transcript, Turn};

/// Unique agent identifier
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(Uuid);

impl AgentId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for AgentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Agent lifecycle state
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl AgentStatus {
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// The persisted state of one agent run
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AgentRecord {
    pub id: AgentId,
    pub task: String,
    /// Built once at construction, never regenerated
    pub system_prompt: String,
    pub available_tools: Vec<String>,
    pub strategy: StrategyKind,
    pub model: String,
    pub max_iterations: u32,
    pub iteration_count: u32,
    pub conversation_history: Conversation,
    pub final_answer: Option<String>,
    pub failure_reason: Option<String>,
    pub status: AgentStatus,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub failed_at: Option<DateTime<Utc>>,
}

impl AgentRecord {
    pub fn new(
        task: impl Into<String>,
        system_prompt: impl Into<String>,
        available_tools: Vec<String>,
        strategy: StrategyKind,
        model: impl Into<String>,
        max_iterations: u32,
    ) -> Self {
        Self {
            id: AgentId::new(),
            task: task.into(),
            system_prompt: system_prompt.into(),
            available_tools,
            strategy,
            model: model.into(),
            max_iterations,
            iteration_count: 0,
            conversation_history: Conversation::new(),
            final_answer: None,
            failure_reason: None,
            status: AgentStatus::Pending,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            failed_at: None,
        }
    }

    fn start(&mut self) {
        self.status = AgentStatus::Running;
        self.started_at = Some(Utc::now());
    }

    fn complete(&mut self) {
        self.status = AgentStatus::Completed;
        self.completed_at = Some(Utc::now());
    }

    fn fail(&mut self, reason: String) {
        self.status = AgentStatus::Failed;
        self.failure_reason = Some(reason);
        self.failed_at = Some(Utc::now());
    }
}

/// A single run of the reasoning loop
pub struct Agent {
    record: AgentRecord,
    strategy: Box<dyn Strategy>,
    toolbox: Toolbox,
    descriptors: Vec<ToolDescriptor>,
    response_format: ResponseFormat,
    options: GenerationOptions,
    gateway: Arc<dyn LlmGateway>,
    store: Arc<dyn AgentStore>,
    observer: Option<Arc<HistoryObserver>>,
}

impl Agent {
    /// Drive the agent to a terminal state.
    ///
    /// Only a pending agent can run. A fatal error is recorded on the agent
    /// (status `failed`, `failure_reason`) and then returned to the caller.
    pub async fn run(&mut self) -> Result<()> {
        if self.record.status != AgentStatus::Pending {
            return Err(AgentError::InvalidTransition(format!(
                "agent {} is {} and cannot run again",
                self.record.id, self.record.status
            )));
        }

        match self.drive().await {
            Ok(()) => Ok(()),
            Err(err) => {
                self.mark_failed(&err);
                Err(err)
            }
        }
    }

    async fn drive(&mut self) -> Result<()> {
        let id = self.record.id;
        self.record.start();
        self.store.save_agent(&self.record)?;

        tracing::info!(
            agent = %id,
            strategy = %self.record.strategy,
            model = %self.options.model,
            gateway = self.gateway.name(),
            max_iterations = self.record.max_iterations,
            "Agent run started"
        );

        let task = Message::user(self.record.task.clone());
        Transcript::new(
            id,
            &mut self.record.conversation_history,
            self.store.as_ref(),
            self.observer.as_deref(),
        )
        .append(task)?;

        while self.record.iteration_count < self.record.max_iterations {
            self.record.iteration_count += 1;
            let iteration = self.record.iteration_count;
            self.store.record_iteration(&id, iteration)?;

            tracing::debug!(
                agent = %id,
                iteration,
                history = self.record.conversation_history.len(),
                "Requesting completion"
            );

            let request = ChatRequest::new(self.record.conversation_history.messages(), &self.options)
                .system_prompt(&self.record.system_prompt)
                .response_format(self.response_format)
                .tools(&self.descriptors);
            let completion = self
                .gateway
                .chat(request)
                .await?
                .parsed_as(self.response_format);

            let transcript = Transcript::new(
                id,
                &mut self.record.conversation_history,
                self.store.as_ref(),
                self.observer.as_deref(),
            );
            let mut turn = Turn::new(
                iteration,
                &self.toolbox,
                self.store.as_ref(),
                transcript,
                &mut self.record.final_answer,
            );
            self.strategy.process_iteration(&completion, &mut turn).await?;

            if self.record.final_answer.is_some() {
                break;
            }
        }

        self.record.complete();
        self.store.save_agent(&self.record)?;

        tracing::info!(
            agent = %id,
            iterations = self.record.iteration_count,
            answered = self.record.final_answer.is_some(),
            "Agent run completed"
        );
        Ok(())
    }

    fn mark_failed(&mut self, err: &AgentError) {
        self.record.fail(err.to_string());
        if let Err(store_err) = self.store.save_agent(&self.record) {
            tracing::error!(agent = %self.record.id, error = %store_err, "Could not persist failed state");
        }
        tracing::error!(
            agent = %self.record.id,
            iteration = self.record.iteration_count,
            error = %err,
            "Agent run failed"
        );
    }

    pub const fn record(&self) -> &AgentRecord {
        &self.record
    }

    pub const fn id(&self) -> AgentId {
        self.record.id
    }

    pub const fn status(&self) -> AgentStatus {
        self.record.status
    }

    pub fn final_answer(&self) -> Option<&str> {
        self.record.final_answer.as_deref()
    }

    pub fn failure_reason(&self) -> Option<&str> {
        self.record.failure_reason.as_deref()
    }

    pub const fn iteration_count(&self) -> u32 {
        self.record.iteration_count
    }

    pub const fn history(&self) -> &Conversation {
        &self.record.conversation_history
    }

    pub fn system_prompt(&self) -> &str {
        &self.record.system_prompt
    }

    pub const fn toolbox(&self) -> &Toolbox {
        &self.toolbox
    }

    pub fn store(&self) -> Arc<dyn AgentStore> {
        Arc::clone(&self.store)
    }
}

impl fmt::Debug for Agent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Agent")
            .field("id", &self.record.id)
            .field("status", &self.record.status)
            .field("strategy", &self.record.strategy)
            .field("tools", &self.toolbox)
            .field("iteration_count", &self.record.iteration_count)
            .finish_non_exhaustive()
    }
}

/// Builder for Agent configuration
pub struct AgentBuilder {
    gateway: Option<Arc<dyn LlmGateway>>,
    registry: CapabilityRegistry,
    tools: Vec<String>,
    strategy: StrategyKind,
    max_iterations: u32,
    options: GenerationOptions,
    response_format: Option<ResponseFormat>,
    store: Option<Arc<dyn AgentStore>>,
    observer: Option<Arc<HistoryObserver>>,
}

impl Default for AgentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentBuilder {
    pub fn new() -> Self {
        let config = AgentConfig::default();
        Self {
            gateway: None,
            registry: CapabilityRegistry::with_builtins(),
            tools: Vec::new(),
            strategy: config.strategy,
            max_iterations: config.max_iterations,
            options: GenerationOptions::default(),
            response_format: config.response_format,
            store: None,
            observer: None,
        }
    }

    /// Apply model, budget, strategy and sampling settings from a config
    #[must_use]
    pub fn config(mut self, config: &AgentConfig) -> Self {
        self.options.model.clone_from(&config.model);
        self.options.temperature = config.temperature;
        self.max_iterations = config.max_iterations;
        self.strategy = config.strategy;
        self.response_format = config.response_format;
        self
    }

    #[must_use]
    pub fn gateway(mut self, gateway: Arc<dyn LlmGateway>) -> Self {
        self.gateway = Some(gateway);
        self
    }

    /// Registry the tool identifiers are resolved against
    #[must_use]
    pub fn registry(mut self, registry: CapabilityRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Capability identifiers, in prompt order. Replaces any earlier list.
    #[must_use]
    pub fn tools<I, S>(mut self, tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tools = tools.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub const fn strategy(mut self, strategy: StrategyKind) -> Self {
        self.strategy = strategy;
        self
    }

    #[must_use]
    pub const fn max_iterations(mut self, max: u32) -> Self {
        self.max_iterations = max;
        self
    }

    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.options.model = model.into();
        self
    }

    #[must_use]
    pub const fn temperature(mut self, temp: f32) -> Self {
        self.options.temperature = temp;
        self
    }

    /// Override the strategy's response format
    #[must_use]
    pub const fn response_format(mut self, format: ResponseFormat) -> Self {
        self.response_format = Some(format);
        self
    }

    /// Defaults to a fresh [`MemoryAgentStore`]
    #[must_use]
    pub fn store(mut self, store: Arc<dyn AgentStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Called synchronously with every history entry, in append order
    #[must_use]
    pub fn on_history_entry<F>(mut self, observer: F) -> Self
    where
        F: Fn(&Message) + Send + Sync + 'static,
    {
        self.observer = Some(Arc::new(observer));
        self
    }

    /// Resolve tools, normalize them for the strategy and build the system
    /// prompt. The returned agent is pending.
    pub fn build(self, task: impl Into<String>) -> Result<Agent> {
        let gateway = self
            .gateway
            .ok_or_else(|| AgentError::Config("Gateway is required".into()))?;
        if self.tools.is_empty() {
            return Err(AgentError::Config("At least one tool is required".into()));
        }
        if self.max_iterations == 0 {
            return Err(AgentError::Config("max_iterations must be greater than 0".into()));
        }

        let strategy = self.strategy.build();
        let mut toolbox = self.registry.resolve(&self.tools)?;
        strategy.normalize_tools(&mut toolbox)?;

        let task = task.into();
        let system_prompt = strategy.system_prompt(&task, &toolbox)?;
        let descriptors = strategy.tool_descriptors(&toolbox)?;
        let response_format = self
            .response_format
            .unwrap_or_else(|| strategy.response_format());

        let record = AgentRecord::new(
            task,
            system_prompt,
            toolbox.names(),
            strategy.kind(),
            self.options.model.clone(),
            self.max_iterations,
        );

        tracing::debug!(
            agent = %record.id,
            strategy = %record.strategy,
            tools = ?record.available_tools,
            "Agent built"
        );

        Ok(Agent {
            record,
            strategy,
            toolbox,
            descriptors,
            response_format,
            options: self.options,
            gateway,
            store: self
                .store
                .unwrap_or_else(|| Arc::new(MemoryAgentStore::new())),
            observer: self.observer,
        })
    }
}
