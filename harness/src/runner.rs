//! Task evaluation loop.
//!
//! Every task gets a fresh environment, user simulator and [`RemoteAgent`].
//! The orchestrated conversation runs on a blocking thread under a wall-clock
//! deadline. Whatever happens to a task is folded into its [`TaskOutcome`];
//! only request-level problems abort a run.

use crate::benchmark::{
    Benchmark, BenchmarkError, EvaluationType, Limits, OrchestrationError, Session, Task,
    TerminationReason, TraceStats,
};
use crate::bridge::{AgentError, RemoteAgent, RemoteEndpoint};
use crate::classify::TaskFailure;
use crate::config::{ConfigError, EvalConfig, EvalRequest, RequestError};
use crate::report::{EvaluationReport, SystemInfo, TaskOutcome};
use protocol::transport::AgentTransport;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Task split every run draws from.
pub const TASK_SPLIT: &str = "base";
/// Error limit handed to the orchestrator.
pub const MAX_ERRORS: u32 = 10;

/// Rejections that stop a run before any task executes.
#[derive(Error, Debug)]
pub enum RunError {
    #[error("Invalid request: {0}")]
    Request(#[from] RequestError),

    #[error("Invalid config: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Benchmark(#[from] BenchmarkError),
}

pub type RunResult<T> = Result<T, RunError>;

/// Measurements of one task attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskRunData {
    pub reward: f64,
    pub duration: Duration,
    pub turns: usize,
    pub tool_calls: usize,
    pub termination_reason: Option<TerminationReason>,
    pub tool_error: bool,
    pub eval_error: Option<String>,
}

impl TaskRunData {
    /// An attempt that produced no conversation trace.
    pub fn empty(duration: Duration) -> Self {
        Self::from_partial_trace(TraceStats::default(), duration)
    }

    /// An attempt cut short after producing part of a trace.
    pub fn from_partial_trace(stats: TraceStats, duration: Duration) -> Self {
        Self {
            reward: 0.0,
            duration,
            turns: stats.turns,
            tool_calls: stats.tool_calls,
            termination_reason: None,
            tool_error: stats.tool_error,
            eval_error: None,
        }
    }
}

/// A failed attempt together with whatever trace it left behind.
#[derive(Debug)]
struct FailedAttempt {
    failure: TaskFailure,
    stats: TraceStats,
}

impl From<TaskFailure> for FailedAttempt {
    fn from(failure: TaskFailure) -> Self {
        Self {
            failure,
            stats: TraceStats::default(),
        }
    }
}

pub struct EvalRunner {
    benchmark: Benchmark,
    transport: Arc<dyn AgentTransport>,
}

impl EvalRunner {
    pub fn new(benchmark: Benchmark, transport: Arc<dyn AgentTransport>) -> Self {
        Self {
            benchmark,
            transport,
        }
    }

    /// Validate a platform request and run it.
    pub async fn run_request(&self, request: &EvalRequest) -> RunResult<EvaluationReport> {
        request.validate()?;
        let config = request.eval_config()?;
        let agent_url = request
            .agent_url()
            .ok_or_else(|| RequestError::MissingRoles(vec!["agent".to_string()]))?;

        self.run(agent_url, &config).await
    }

    /// Evaluate the agent at `agent_url` on the configured task set. The
    /// transport is reset afterwards whether or not the run succeeded.
    pub async fn run(&self, agent_url: &str, config: &EvalConfig) -> RunResult<EvaluationReport> {
        let result = self.run_tasks(agent_url, config).await;
        self.transport.reset().await;
        result
    }

    async fn run_tasks(&self, agent_url: &str, config: &EvalConfig) -> RunResult<EvaluationReport> {
        config.validate()?;

        info!(
            "Starting evaluation: domain={} num_tasks={} seed={} timeout_seconds={} max_steps={} retries={}",
            config.domain,
            config.num_tasks,
            config.seed,
            config.timeout_seconds,
            config.max_steps,
            config.retries
        );
        let start = Instant::now();

        let tasks = self.load_tasks(config)?;
        info!(
            "Running {} tasks for domain {} against {}",
            tasks.len(),
            config.domain,
            agent_url
        );

        let mut outcomes = Vec::with_capacity(tasks.len());
        for (index, task) in tasks.into_iter().enumerate() {
            let seed = config.seed.wrapping_add(index as i64);
            outcomes.push(self.evaluate_task(agent_url, config, task, seed).await);
        }

        Ok(EvaluationReport::aggregate(
            config,
            outcomes,
            start.elapsed(),
            SystemInfo::new(self.benchmark.version.clone()),
        ))
    }

    fn load_tasks(&self, config: &EvalConfig) -> RunResult<Vec<Task>> {
        let domain = config.domain.as_str();
        // Reject unavailable domains before any task starts.
        self.benchmark.environments.environment(domain)?;

        let mut tasks =
            self.benchmark
                .tasks
                .tasks(domain, TASK_SPLIT, config.task_ids.as_deref())?;
        tasks.truncate(config.num_tasks as usize);
        Ok(tasks)
    }

    /// Run one task under the configured deadline. Never fails: every
    /// failure mode becomes part of the outcome.
    pub async fn evaluate_task(
        &self,
        agent_url: &str,
        config: &EvalConfig,
        task: Task,
        seed: i64,
    ) -> TaskOutcome {
        let task_id = task.id.clone();
        info!("Task start: id={}", task_id);

        let started = Instant::now();
        let budget = Duration::from_secs(config.timeout_seconds);
        let cancel = CancellationToken::new();

        let attempt = tokio::time::timeout(
            budget,
            self.attempt_task(agent_url, config, task, seed, cancel.clone()),
        )
        .await;

        let (mut data, failure) = match attempt {
            Ok(Ok(data)) => (data, None),
            Ok(Err(FailedAttempt { failure, stats })) => {
                warn!("Task {} failed: {}", task_id, failure);
                (
                    TaskRunData::from_partial_trace(stats, Duration::ZERO),
                    Some(failure),
                )
            }
            Err(_) => {
                // Stops the blocked conversation at its next remote call.
                cancel.cancel();
                warn!("Task {} timeout after {}s", task_id, config.timeout_seconds);
                (
                    TaskRunData::empty(Duration::ZERO),
                    Some(TaskFailure::Timeout(budget)),
                )
            }
        };
        data.duration = started.elapsed();

        let outcome = TaskOutcome::from_attempt(task_id, &data, failure.as_ref());
        info!(
            "Task end: id={} reward={} failure_reason={} duration_sec={:.2}",
            outcome.task_id,
            outcome.reward,
            outcome
                .failure_reason
                .map(|reason| reason.as_str())
                .unwrap_or("none"),
            outcome.duration_sec
        );
        outcome
    }

    async fn attempt_task(
        &self,
        agent_url: &str,
        config: &EvalConfig,
        task: Task,
        seed: i64,
        cancel: CancellationToken,
    ) -> Result<TaskRunData, FailedAttempt> {
        let domain = config.domain.as_str();
        let environment = self
            .benchmark
            .environments
            .environment(domain)
            .map_err(|e| unexpected(&task.id, e))?;

        let endpoint = RemoteEndpoint {
            url: agent_url.to_string(),
            timeout: Duration::from_secs(config.timeout_seconds),
            retries: config.retries,
        };
        let agent = RemoteAgent::new(
            &environment.tools.get_definitions(),
            &environment.policy,
            endpoint,
            Arc::clone(&self.transport),
            Handle::current(),
        )
        .with_cancellation(cancel);

        let user = self.benchmark.users.create(
            &task,
            environment.user_tools.as_ref(),
            &config.user_llm,
            &config.user_llm_args,
        );

        let task_id = task.id.clone();
        let session = Session {
            domain: domain.to_string(),
            agent: Box::new(agent),
            user,
            environment,
            task: task.clone(),
            limits: Limits {
                max_steps: config.max_steps,
                max_errors: MAX_ERRORS,
            },
            seed,
        };

        let orchestrator = Arc::clone(&self.benchmark.orchestrator);
        let run = tokio::task::spawn_blocking(move || orchestrator.run(session))
            .await
            .map_err(|e| unexpected(&task_id, e))?
            .map_err(|e| match e {
                OrchestrationError::Agent { error, messages } => {
                    let failure = match error {
                        e @ AgentError::MalformedProtocol(_) => {
                            TaskFailure::MalformedProtocol(e.to_string())
                        }
                        e @ AgentError::RemoteUnavailable(_) => {
                            TaskFailure::RemoteUnavailable(e.to_string())
                        }
                    };
                    FailedAttempt {
                        failure,
                        stats: TraceStats::from_messages(&messages),
                    }
                }
                other => unexpected(&task_id, other).into(),
            })?;

        info!("Task {} terminated: {}", task_id, run.termination_reason);
        debug!("Task {} messages: {}", task_id, run.messages.len());

        let stats = run.stats();
        let termination_reason = run.termination_reason;
        let duration = run.duration;

        let evaluator = Arc::clone(&self.benchmark.evaluator);
        let domain = domain.to_string();
        let evaluation = tokio::task::spawn_blocking(move || {
            evaluator.evaluate(&run, &task, EvaluationType::Action, &domain)
        })
        .await
        .map_err(|e| unexpected(&task_id, e))?;

        let (reward, eval_error) = match evaluation {
            Ok(info) => (info.reward, None),
            Err(e) => {
                error!("Evaluation failed for task {}: {}", task_id, e);
                (0.0, Some(e.to_string()))
            }
        };

        Ok(TaskRunData {
            reward,
            duration,
            turns: stats.turns,
            tool_calls: stats.tool_calls,
            termination_reason: Some(termination_reason),
            tool_error: stats.tool_error,
            eval_error,
        })
    }
}

/// Detail stays in the log; the outcome only carries the message.
fn unexpected<E: fmt::Debug + fmt::Display>(task_id: &str, error: E) -> TaskFailure {
    error!("Task {} failed with unexpected error: {:?}", task_id, error);
    TaskFailure::Unknown(error.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Domain;
    use crate::mock;
    use async_trait::async_trait;
    use protocol::transport::{SendRequest, TransportResult};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingTransport {
        sends: AtomicUsize,
        resets: AtomicUsize,
    }

    #[async_trait]
    impl AgentTransport for CountingTransport {
        async fn send(&self, _request: SendRequest) -> TransportResult<String> {
            self.sends.fetch_add(1, Ordering::SeqCst);
            Ok(r#"{"name":"respond","arguments":{"content":"ok"}}"#.to_string())
        }

        async fn reset(&self) {
            self.resets.fetch_add(1, Ordering::SeqCst);
        }

        fn transport_name(&self) -> &'static str {
            "counting"
        }
    }

    #[test]
    fn test_empty_run_data() {
        let data = TaskRunData::empty(Duration::from_secs(2));
        assert_eq!(data.reward, 0.0);
        assert_eq!(data.turns, 0);
        assert_eq!(data.tool_calls, 0);
        assert_eq!(data.termination_reason, None);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_unavailable_domain_rejects_run() {
        let transport = Arc::new(CountingTransport::default());
        let runner = EvalRunner::new(mock::benchmark(), transport.clone());
        let config = EvalConfig::default().with_domain(Domain::Airline);

        let result = runner.run("http://purple.test", &config).await;
        assert!(matches!(
            result,
            Err(RunError::Benchmark(BenchmarkError::UnknownDomain { .. }))
        ));
        assert_eq!(transport.sends.load(Ordering::SeqCst), 0);
        assert_eq!(transport.resets.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_unknown_task_ids_reject_run() {
        let transport = Arc::new(CountingTransport::default());
        let runner = EvalRunner::new(mock::benchmark(), transport.clone());
        let config = EvalConfig::default().with_task_ids(vec!["nope".to_string()]);

        let result = runner.run("http://purple.test", &config).await;
        assert!(matches!(
            result,
            Err(RunError::Benchmark(BenchmarkError::TaskNotFound { .. }))
        ));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_duplicate_task_ids_reject_run() {
        let transport = Arc::new(CountingTransport::default());
        let runner = EvalRunner::new(mock::benchmark(), transport.clone());
        let config = EvalConfig::default().with_num_tasks(3).with_task_ids(vec![
            "mock-2".to_string(),
            "mock-2".to_string(),
            "mock-0".to_string(),
        ]);

        let result = runner.run("http://purple.test", &config).await;
        assert!(matches!(result, Err(RunError::Config(ConfigError::Invalid(_)))));
        assert_eq!(transport.sends.load(Ordering::SeqCst), 0);
        assert_eq!(transport.resets.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_invalid_request_rejected_before_tasks() {
        let transport = Arc::new(CountingTransport::default());
        let runner = EvalRunner::new(mock::benchmark(), transport.clone());
        let request =
            EvalRequest::parse_json(r#"{"participants": {"agent": "http://purple.test"}, "config": {"num_tasks": 0}}"#)
                .unwrap();

        let result = runner.run_request(&request).await;
        assert!(matches!(result, Err(RunError::Config(_))));
        assert_eq!(transport.sends.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_task_count_is_truncated() {
        let transport = Arc::new(CountingTransport::default());
        let runner = EvalRunner::new(mock::benchmark(), transport.clone());
        let config = EvalConfig::default()
            .with_num_tasks(2)
            .with_task_ids(vec!["mock-2".to_string(), "mock-1".to_string(), "mock-0".to_string()]);

        let report = runner.run("http://purple.test", &config).await.unwrap();
        let ids: Vec<&str> = report.tasks.iter().map(|t| t.task_id.as_str()).collect();
        assert_eq!(ids, vec!["mock-2", "mock-1"]);
        assert_eq!(transport.resets.load(Ordering::SeqCst), 1);
    }
}
