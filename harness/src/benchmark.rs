//! Contracts of the benchmark collaborators the harness drives.
//!
//! The harness does not decide who speaks when, how tools behave, or how a
//! finished conversation is scored. Those belong to a task source, an
//! environment registry, a user simulator, an orchestrator and an evaluator,
//! all injected through [`Benchmark`]. Orchestrator and evaluator calls are
//! blocking and run on a blocking thread.

use crate::bridge::{AgentError, ConversationAgent};
use crate::tools::ToolRegistry;
use protocol::types::{ChatMessage, MessageRole};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BenchmarkError {
    #[error("Domain '{domain}' is not available in this benchmark")]
    UnknownDomain { domain: String },

    #[error("Task split '{split}' not found for domain '{domain}'")]
    UnknownSplit { domain: String, split: String },

    #[error("Tasks not found: {ids:?}")]
    TaskNotFound { ids: Vec<String> },
}

pub type BenchmarkResult<T> = Result<T, BenchmarkError>;

#[derive(Error, Debug)]
pub enum OrchestrationError {
    /// The agent failed mid-conversation; `messages` is the trace so far.
    #[error("{error}")]
    Agent {
        #[source]
        error: AgentError,
        messages: Vec<ChatMessage>,
    },

    #[error("Environment error: {0}")]
    Environment(String),
}

#[derive(Error, Debug)]
pub enum EvaluatorError {
    #[error("Evaluation criteria missing for task {task_id}")]
    MissingCriteria { task_id: String },

    #[error("Evaluation failed: {0}")]
    Failed(String),
}

/// A tool call the agent is expected to make.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpectedAction {
    pub name: String,
    #[serde(default)]
    pub arguments: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct EvaluationCriteria {
    #[serde(default)]
    pub actions: Vec<ExpectedAction>,
}

/// One benchmark scenario instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub user_scenario: String,
    #[serde(default)]
    pub evaluation_criteria: Option<EvaluationCriteria>,
}

/// Tools and policy of one domain, built fresh for every task.
pub struct Environment {
    pub domain: String,
    pub policy: String,
    pub tools: ToolRegistry,
    pub user_tools: Option<ToolRegistry>,
}

/// Why an orchestrated conversation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationReason {
    UserStop,
    AgentStop,
    MaxSteps,
    TooManyErrors,
    AgentError,
    UserError,
}

impl TerminationReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            TerminationReason::UserStop => "user_stop",
            TerminationReason::AgentStop => "agent_stop",
            TerminationReason::MaxSteps => "max_steps",
            TerminationReason::TooManyErrors => "too_many_errors",
            TerminationReason::AgentError => "agent_error",
            TerminationReason::UserError => "user_error",
        }
    }

    /// Whether one of the participants ended the conversation on purpose.
    pub fn is_natural(&self) -> bool {
        matches!(self, TerminationReason::UserStop | TerminationReason::AgentStop)
    }
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Trace of one finished conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationRun {
    pub task_id: String,
    pub messages: Vec<ChatMessage>,
    pub duration: Duration,
    pub termination_reason: TerminationReason,
    pub seed: i64,
}

/// Counts derived from a conversation trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TraceStats {
    pub turns: usize,
    pub tool_calls: usize,
    pub tool_error: bool,
}

impl TraceStats {
    pub fn from_messages(messages: &[ChatMessage]) -> Self {
        let mut stats = TraceStats {
            turns: messages.len(),
            ..Default::default()
        };

        for message in messages {
            match message.role {
                MessageRole::Tool => stats.tool_error |= message.error,
                MessageRole::Assistant | MessageRole::User => {
                    stats.tool_calls += message.tool_call_count()
                }
                MessageRole::System => {}
            }
        }

        stats
    }
}

impl SimulationRun {
    pub fn stats(&self) -> TraceStats {
        TraceStats::from_messages(&self.messages)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationType {
    /// Compare the agent's tool calls against the expected actions.
    Action,
    /// Only check that the agent talked to the user.
    Communicate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewardInfo {
    pub reward: f64,
    #[serde(default)]
    pub info: Map<String, Value>,
}

/// Step and error limits of one conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub max_steps: u32,
    pub max_errors: u32,
}

/// Everything an orchestrator needs to drive one conversation.
pub struct Session {
    pub domain: String,
    pub agent: Box<dyn ConversationAgent>,
    pub user: Box<dyn UserSimulator>,
    pub environment: Environment,
    pub task: Task,
    pub limits: Limits,
    pub seed: i64,
}

pub trait TaskSource: Send + Sync {
    fn tasks(
        &self,
        domain: &str,
        split: &str,
        task_ids: Option<&[String]>,
    ) -> BenchmarkResult<Vec<Task>>;
}

pub trait EnvironmentRegistry: Send + Sync {
    fn environment(&self, domain: &str) -> BenchmarkResult<Environment>;
}

/// Simulated user; the stop token marks the end of the conversation.
pub trait UserSimulator: Send {
    /// Produce the next user turn. `None` asks for the opening message.
    fn respond(&mut self, agent_message: Option<&ChatMessage>) -> Result<ChatMessage, String>;

    fn set_seed(&mut self, _seed: i64) {}
}

pub trait UserSimulatorFactory: Send + Sync {
    fn create(
        &self,
        task: &Task,
        user_tools: Option<&ToolRegistry>,
        llm: &str,
        llm_args: &Map<String, Value>,
    ) -> Box<dyn UserSimulator>;
}

pub trait Orchestrator: Send + Sync {
    /// Drive one conversation to completion. Blocking.
    fn run(&self, session: Session) -> Result<SimulationRun, OrchestrationError>;
}

pub trait Evaluator: Send + Sync {
    fn evaluate(
        &self,
        run: &SimulationRun,
        task: &Task,
        evaluation_type: EvaluationType,
        domain: &str,
    ) -> Result<RewardInfo, EvaluatorError>;
}

/// The full set of collaborators for one benchmark.
#[derive(Clone)]
pub struct Benchmark {
    pub tasks: Arc<dyn TaskSource>,
    pub environments: Arc<dyn EnvironmentRegistry>,
    pub users: Arc<dyn UserSimulatorFactory>,
    pub orchestrator: Arc<dyn Orchestrator>,
    pub evaluator: Arc<dyn Evaluator>,
    pub version: String,
}
