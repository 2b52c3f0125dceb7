use crate::benchmark::TerminationReason;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Label attached to a task that scored zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCategory {
    Timeout,
    ToolError,
    AgentError,
    PolicyViolation,
    InvalidResponse,
    Unknown,
}

impl FailureCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureCategory::Timeout => "timeout",
            FailureCategory::ToolError => "tool_error",
            FailureCategory::AgentError => "agent_error",
            FailureCategory::PolicyViolation => "policy_violation",
            FailureCategory::InvalidResponse => "invalid_response",
            FailureCategory::Unknown => "unknown",
        }
    }
}

impl fmt::Display for FailureCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ways a task attempt can fail before it produces a scored conversation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TaskFailure {
    #[error("Task exceeded {}s timeout.", .0.as_secs())]
    Timeout(Duration),

    #[error("{0}")]
    MalformedProtocol(String),

    #[error("{0}")]
    RemoteUnavailable(String),

    #[error("{0}")]
    Unknown(String),
}

impl TaskFailure {
    pub fn category(&self) -> FailureCategory {
        match self {
            TaskFailure::Timeout(_) => FailureCategory::Timeout,
            TaskFailure::MalformedProtocol(_) => FailureCategory::InvalidResponse,
            TaskFailure::RemoteUnavailable(_) => FailureCategory::AgentError,
            TaskFailure::Unknown(_) => FailureCategory::Unknown,
        }
    }
}

/// Category for a completed conversation, `None` when it scored.
pub fn classify_completed(
    reward: f64,
    termination: Option<TerminationReason>,
    tool_error: bool,
) -> Option<FailureCategory> {
    if reward > 0.0 {
        return None;
    }

    let category = match termination {
        Some(TerminationReason::MaxSteps) => FailureCategory::Timeout,
        Some(TerminationReason::TooManyErrors) => FailureCategory::ToolError,
        _ if tool_error => FailureCategory::ToolError,
        Some(TerminationReason::AgentError) => FailureCategory::AgentError,
        Some(TerminationReason::UserError) => FailureCategory::PolicyViolation,
        _ => FailureCategory::Unknown,
    };
    Some(category)
}

/// Category for any attempt. A failure raised during the attempt decides the
/// category on its own; otherwise the completed conversation is classified.
pub fn classify(
    reward: f64,
    termination: Option<TerminationReason>,
    tool_error: bool,
    failure: Option<&TaskFailure>,
) -> Option<FailureCategory> {
    match failure {
        Some(failure) => Some(failure.category()),
        None => classify_completed(reward, termination, tool_error),
    }
}
