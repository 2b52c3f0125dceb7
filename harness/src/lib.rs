pub mod benchmark;
pub mod bridge;
pub mod classify;
pub mod config;
pub mod mock;
pub mod report;
pub mod runner;
pub mod tools;

pub use benchmark::{
    Benchmark, BenchmarkError, BenchmarkResult, Environment, EnvironmentRegistry,
    EvaluationCriteria, EvaluationType, Evaluator, EvaluatorError, ExpectedAction, Limits,
    OrchestrationError, Orchestrator, RewardInfo, Session, SimulationRun, Task, TaskSource,
    TerminationReason, TraceStats, UserSimulator, UserSimulatorFactory,
};
pub use bridge::{
    AgentError, AgentResult, ConversationAgent, ConversationState, RemoteAgent, RemoteEndpoint,
};
pub use classify::{classify, classify_completed, FailureCategory, TaskFailure};
pub use config::{ConfigError, Domain, EvalConfig, EvalRequest, RequestError};
pub use report::{EvaluationReport, ReportConfig, ReportSummary, SystemInfo, TaskOutcome};
pub use runner::{EvalRunner, RunError, RunResult, TaskRunData};
pub use tools::{CalculatorTool, EchoTool, Tool, ToolError, ToolRegistry, ToolResult};
