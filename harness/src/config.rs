//! Run configuration and the evaluation request envelope.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::Path;
use thiserror::Error;

pub const MAX_NUM_TASKS: u32 = 50;
pub const MAX_RETRIES: u32 = 5;
/// Roles every evaluation request must name.
pub const REQUIRED_ROLES: &[&str] = &["agent"];

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{0}")]
    Invalid(String),

    #[error("Malformed config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Malformed config file: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Error, Debug)]
pub enum RequestError {
    #[error("Invalid request: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Missing roles: {0:?}")]
    MissingRoles(Vec<String>),

    #[error("Invalid URL for role '{role}': {url}")]
    InvalidUrl { role: String, url: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Domain {
    Mock,
    Airline,
    Retail,
    Telecom,
}

impl Domain {
    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Mock => "mock",
            Domain::Airline => "airline",
            Domain::Retail => "retail",
            Domain::Telecom => "telecom",
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Domain {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "mock" => Ok(Domain::Mock),
            "airline" => Ok(Domain::Airline),
            "retail" => Ok(Domain::Retail),
            "telecom" => Ok(Domain::Telecom),
            other => Err(ConfigError::Invalid(format!(
                "Unsupported domain '{}'. Choose from [airline, mock, retail, telecom].",
                other
            ))),
        }
    }
}

fn default_user_llm() -> String {
    "openai/gpt-4.1".to_string()
}

fn default_user_llm_args() -> Map<String, Value> {
    let mut args = Map::new();
    args.insert("temperature".to_string(), Value::from(0.0));
    args
}

/// Options recognized for one evaluation run. Unknown keys are rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct EvalConfig {
    pub domain: Domain,
    pub num_tasks: u32,
    pub seed: i64,
    pub timeout_seconds: u64,
    pub max_steps: u32,
    pub retries: u32,
    pub task_ids: Option<Vec<String>>,
    pub user_llm: String,
    pub user_llm_args: Map<String, Value>,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            domain: Domain::Mock,
            num_tasks: 1,
            seed: 0,
            timeout_seconds: 300,
            max_steps: 50,
            retries: 2,
            task_ids: None,
            user_llm: default_user_llm(),
            user_llm_args: default_user_llm_args(),
        }
    }
}

impl EvalConfig {
    pub fn from_value(value: Value) -> ConfigResult<Self> {
        let config: EvalConfig = serde_json::from_value(value)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(text: &str) -> ConfigResult<Self> {
        let config: EvalConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn with_domain(mut self, domain: Domain) -> Self {
        self.domain = domain;
        self
    }

    pub fn with_num_tasks(mut self, num_tasks: u32) -> Self {
        self.num_tasks = num_tasks;
        self
    }

    pub fn with_timeout_seconds(mut self, timeout_seconds: u64) -> Self {
        self.timeout_seconds = timeout_seconds;
        self
    }

    pub fn with_task_ids(mut self, task_ids: Vec<String>) -> Self {
        self.task_ids = Some(task_ids);
        self
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if !(1..=MAX_NUM_TASKS).contains(&self.num_tasks) {
            return Err(ConfigError::Invalid(format!(
                "num_tasks must be between 1 and {}",
                MAX_NUM_TASKS
            )));
        }

        if self.timeout_seconds == 0 {
            return Err(ConfigError::Invalid(
                "timeout_seconds must be greater than 0".to_string(),
            ));
        }

        if self.max_steps == 0 {
            return Err(ConfigError::Invalid(
                "max_steps must be greater than 0".to_string(),
            ));
        }

        if self.retries > MAX_RETRIES {
            return Err(ConfigError::Invalid(format!(
                "retries must be between 0 and {}",
                MAX_RETRIES
            )));
        }

        if self.user_llm.is_empty() {
            return Err(ConfigError::Invalid("user_llm cannot be empty".to_string()));
        }

        if let Some(ids) = &self.task_ids {
            let mut seen = HashSet::new();
            if let Some(repeated) = ids.iter().find(|id| !seen.insert(id.as_str())) {
                return Err(ConfigError::Invalid(format!(
                    "task_ids must not contain duplicates: {}",
                    repeated
                )));
            }
        }

        Ok(())
    }
}

/// Request sent by the platform: participant role -> agent URL, plus config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalRequest {
    pub participants: HashMap<String, String>,
    #[serde(default)]
    pub config: Map<String, Value>,
}

impl EvalRequest {
    pub fn parse_json(text: &str) -> Result<Self, RequestError> {
        let request: EvalRequest = serde_json::from_str(text)?;
        Ok(request)
    }

    pub fn validate(&self) -> Result<(), RequestError> {
        let mut missing: Vec<String> = REQUIRED_ROLES
            .iter()
            .filter(|role| !self.participants.contains_key(**role))
            .map(|role| role.to_string())
            .collect();
        if !missing.is_empty() {
            missing.sort();
            return Err(RequestError::MissingRoles(missing));
        }

        for (role, url) in &self.participants {
            let valid = reqwest::Url::parse(url)
                .map(|parsed| matches!(parsed.scheme(), "http" | "https"))
                .unwrap_or(false);
            if !valid {
                return Err(RequestError::InvalidUrl {
                    role: role.clone(),
                    url: url.clone(),
                });
            }
        }

        Ok(())
    }

    pub fn agent_url(&self) -> Option<&str> {
        self.participants.get("agent").map(String::as_str)
    }

    pub fn eval_config(&self) -> ConfigResult<EvalConfig> {
        EvalConfig::from_value(Value::Object(self.config.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = EvalConfig::from_value(json!({})).unwrap();
        assert_eq!(config.domain, Domain::Mock);
        assert_eq!(config.num_tasks, 1);
        assert_eq!(config.seed, 0);
        assert_eq!(config.timeout_seconds, 300);
        assert_eq!(config.max_steps, 50);
        assert_eq!(config.retries, 2);
        assert_eq!(config.task_ids, None);
        assert_eq!(config.user_llm, "openai/gpt-4.1");
        assert_eq!(config.user_llm_args["temperature"], json!(0.0));
        assert_eq!(config, EvalConfig::default());
    }

    #[test]
    fn test_invalid_domain() {
        assert!(EvalConfig::from_value(json!({"domain": "unknown"})).is_err());
        assert!("unknown".parse::<Domain>().is_err());
        assert_eq!("retail".parse::<Domain>().unwrap(), Domain::Retail);
    }

    #[test]
    fn test_unknown_keys_rejected() {
        let result = EvalConfig::from_value(json!({"domain": "mock", "verbose": true}));
        assert!(matches!(result, Err(ConfigError::Json(_))));
    }

    #[test]
    fn test_range_validation() {
        assert!(EvalConfig::from_value(json!({"num_tasks": 0})).is_err());
        assert!(EvalConfig::from_value(json!({"num_tasks": 51})).is_err());
        assert!(EvalConfig::from_value(json!({"num_tasks": 50})).is_ok());
        assert!(EvalConfig::from_value(json!({"timeout_seconds": 0})).is_err());
        assert!(EvalConfig::from_value(json!({"max_steps": 0})).is_err());
        assert!(EvalConfig::from_value(json!({"retries": 6})).is_err());
        assert!(EvalConfig::from_value(json!({"retries": 0})).is_ok());
        assert!(EvalConfig::from_value(json!({"seed": -4})).is_ok());
    }

    #[test]
    fn test_duplicate_task_ids() {
        let result = EvalConfig::from_value(json!({
            "num_tasks": 3,
            "task_ids": ["mock-2", "mock-2", "mock-0"]
        }));
        match result {
            Err(ConfigError::Invalid(message)) => assert!(message.contains("mock-2")),
            other => panic!("expected duplicate rejection, got {other:?}"),
        }

        assert!(EvalConfig::from_value(json!({"task_ids": ["mock-2", "mock-0"]})).is_ok());
        assert!(EvalConfig::from_value(json!({"task_ids": []})).is_ok());
    }

    #[test]
    fn test_toml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
domain = "mock"
num_tasks = 3
seed = 42
task_ids = ["mock-1", "mock-2"]

[user_llm_args]
temperature = 0.5
"#
        )
        .unwrap();

        let config = EvalConfig::from_toml_file(file.path()).unwrap();
        assert_eq!(config.num_tasks, 3);
        assert_eq!(config.seed, 42);
        assert_eq!(
            config.task_ids,
            Some(vec!["mock-1".to_string(), "mock-2".to_string()])
        );
        assert_eq!(config.user_llm_args["temperature"], json!(0.5));
    }

    #[test]
    fn test_request_validation() {
        let request = EvalRequest::parse_json(
            r#"{"participants": {"agent": "http://localhost:9019"}, "config": {"num_tasks": 2}}"#,
        )
        .unwrap();
        assert!(request.validate().is_ok());
        assert_eq!(request.agent_url(), Some("http://localhost:9019"));
        assert_eq!(request.eval_config().unwrap().num_tasks, 2);

        let request =
            EvalRequest::parse_json(r#"{"participants": {"judge": "http://localhost:1"}}"#)
                .unwrap();
        match request.validate() {
            Err(RequestError::MissingRoles(roles)) => assert_eq!(roles, vec!["agent"]),
            other => panic!("expected missing roles, got {other:?}"),
        }

        let request =
            EvalRequest::parse_json(r#"{"participants": {"agent": "not a url"}}"#).unwrap();
        assert!(matches!(
            request.validate(),
            Err(RequestError::InvalidUrl { .. })
        ));

        assert!(EvalRequest::parse_json("{").is_err());
    }
}
