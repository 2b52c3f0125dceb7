//! Per-task outcomes and the run-level report built from them.

use crate::classify::{self, FailureCategory, TaskFailure};
use crate::config::EvalConfig;
use crate::runner::TaskRunData;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::time::Duration;

/// Externally reported result of one task attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskOutcome {
    pub task_id: String,
    pub passed: bool,
    pub reward: f64,
    pub duration_sec: f64,
    pub turns: usize,
    pub tool_calls: usize,
    pub failure_reason: Option<FailureCategory>,
    pub error: Option<String>,
}

impl TaskOutcome {
    /// Derive the outcome of an attempt. `failure` is set when the attempt
    /// was cut short before a scored conversation existed.
    pub fn from_attempt(
        task_id: impl Into<String>,
        data: &TaskRunData,
        failure: Option<&TaskFailure>,
    ) -> Self {
        let reward = if failure.is_some() { 0.0 } else { data.reward };
        let passed = reward > 0.0;

        let (failure_reason, error) = if passed {
            (None, None)
        } else {
            let category = classify::classify(
                reward,
                data.termination_reason,
                data.tool_error,
                failure,
            );
            let error = match (failure, &data.eval_error) {
                (Some(failure), _) => failure.to_string(),
                (None, Some(eval_error)) => eval_error.clone(),
                (None, None) => match data.termination_reason {
                    Some(reason) => format!("Task scored 0 (termination: {})", reason),
                    None => "Task scored 0".to_string(),
                },
            };
            (category, Some(error))
        };

        Self {
            task_id: task_id.into(),
            passed,
            reward,
            duration_sec: data.duration.as_secs_f64(),
            turns: data.turns,
            tool_calls: data.tool_calls,
            failure_reason,
            error,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub pass_rate: f64,
    pub passed: usize,
    pub total: usize,
    pub time_used_sec: f64,
}

/// Run configuration echoed back in the report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportConfig {
    pub domain: String,
    pub num_tasks: u32,
    pub seed: i64,
    pub timeout_seconds: u64,
    pub max_steps: u32,
    pub retries: u32,
}

impl From<&EvalConfig> for ReportConfig {
    fn from(config: &EvalConfig) -> Self {
        Self {
            domain: config.domain.to_string(),
            num_tasks: config.num_tasks,
            seed: config.seed,
            timeout_seconds: config.timeout_seconds,
            max_steps: config.max_steps,
            retries: config.retries,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemInfo {
    pub harness_version: String,
    pub benchmark_version: String,
}

impl SystemInfo {
    pub fn new(benchmark_version: impl Into<String>) -> Self {
        Self {
            harness_version: env!("CARGO_PKG_VERSION").to_string(),
            benchmark_version: benchmark_version.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub domain: String,
    pub score: f64,
    pub max_score: usize,
    pub pass_rate: f64,
    pub task_rewards: BTreeMap<String, f64>,
    pub time_used: f64,
    pub summary: ReportSummary,
    pub config: ReportConfig,
    pub tasks: Vec<TaskOutcome>,
    pub system: SystemInfo,
}

impl EvaluationReport {
    /// Reduce the ordered task outcomes into a report.
    pub fn aggregate(
        config: &EvalConfig,
        outcomes: Vec<TaskOutcome>,
        time_used: Duration,
        system: SystemInfo,
    ) -> Self {
        let score: f64 = outcomes.iter().map(|o| o.reward).sum();
        let max_score = outcomes.len();
        let passed = outcomes.iter().filter(|o| o.passed).count();
        let pass_rate = if max_score > 0 {
            score / max_score as f64 * 100.0
        } else {
            0.0
        };
        let time_used = time_used.as_secs_f64();

        let task_rewards = outcomes
            .iter()
            .map(|o| (o.task_id.clone(), o.reward))
            .collect();

        Self {
            domain: config.domain.to_string(),
            score,
            max_score,
            pass_rate,
            task_rewards,
            time_used,
            summary: ReportSummary {
                pass_rate,
                passed,
                total: max_score,
                time_used_sec: time_used,
            },
            config: ReportConfig::from(config),
            tasks: outcomes,
            system,
        }
    }

    /// Human-readable block printed alongside the JSON report.
    pub fn summary_text(&self) -> String {
        let mut text = format!(
            "Benchmark Results\nDomain: {}\nTasks: {}\nPass Rate: {:.1}% ({}/{})\nTime: {:.1}s\n\nTask Results:",
            self.domain,
            self.max_score,
            self.pass_rate,
            self.summary.passed,
            self.summary.total,
            self.time_used
        );

        for task in &self.tasks {
            let mark = if task.passed { '✓' } else { '✗' };
            let _ = write!(text, "\n  {}: {} ({})", task.task_id, mark, task.reward);
            if let Some(reason) = task.failure_reason {
                let _ = write!(text, " [{}]", reason);
            }
        }

        text
    }
}
