//! Reference collaborators for the `mock` domain.
//!
//! Small enough to read in one sitting, but complete: a task set, a tool
//! environment, a scripted user, a turn orchestrator and an action-matching
//! evaluator. `harness eval --domain mock` runs entirely on these.

use crate::benchmark::{
    Benchmark, BenchmarkError, BenchmarkResult, Environment, EnvironmentRegistry,
    EvaluationCriteria, EvaluationType, Evaluator, EvaluatorError, ExpectedAction,
    OrchestrationError, Orchestrator, RewardInfo, Session, SimulationRun, Task, TaskSource,
    TerminationReason, UserSimulator, UserSimulatorFactory,
};
use crate::tools::{CalculatorTool, EchoTool, ToolRegistry};
use protocol::codec::Decision;
use protocol::types::{AgentInput, ChatMessage, MessageRole, ToolCall};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

pub const MOCK_DOMAIN: &str = "mock";
/// A user message containing this token ends the conversation.
pub const STOP_TOKEN: &str = "###STOP###";

const MOCK_POLICY: &str = "You are a support agent for the mock domain. \
Use the available tools when the user asks for something they can do. \
Never invent tool results. Keep replies short and answer in plain text.";

fn expected(name: &str, arguments: Value) -> ExpectedAction {
    ExpectedAction {
        name: name.to_string(),
        arguments: match arguments {
            Value::Object(map) => map,
            _ => Map::new(),
        },
    }
}

fn mock_tasks() -> Vec<Task> {
    vec![
        Task {
            id: "mock-0".to_string(),
            user_scenario: "Please echo the message 'hello' back to me.".to_string(),
            evaluation_criteria: Some(EvaluationCriteria {
                actions: vec![expected("echo", json!({"message": "hello"}))],
            }),
        },
        Task {
            id: "mock-1".to_string(),
            user_scenario: "What is 2 plus 3? Use the calculator.\nThanks, that's all."
                .to_string(),
            evaluation_criteria: Some(EvaluationCriteria {
                actions: vec![expected(
                    "calculate",
                    json!({"operation": "add", "a": 2, "b": 3}),
                )],
            }),
        },
        Task {
            id: "mock-2".to_string(),
            user_scenario: "Hi, I just wanted to say your service is great.".to_string(),
            evaluation_criteria: Some(EvaluationCriteria::default()),
        },
    ]
}

/// In-memory task set with a single `base` split.
#[derive(Debug, Clone)]
pub struct MockTaskSource {
    tasks: Vec<Task>,
}

impl MockTaskSource {
    pub fn new() -> Self {
        Self { tasks: mock_tasks() }
    }
}

impl Default for MockTaskSource {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskSource for MockTaskSource {
    fn tasks(
        &self,
        domain: &str,
        split: &str,
        task_ids: Option<&[String]>,
    ) -> BenchmarkResult<Vec<Task>> {
        if domain != MOCK_DOMAIN {
            return Err(BenchmarkError::UnknownDomain {
                domain: domain.to_string(),
            });
        }
        if split != "base" {
            return Err(BenchmarkError::UnknownSplit {
                domain: domain.to_string(),
                split: split.to_string(),
            });
        }

        let Some(ids) = task_ids else {
            return Ok(self.tasks.clone());
        };

        let missing: Vec<String> = ids
            .iter()
            .filter(|id| !self.tasks.iter().any(|task| &task.id == *id))
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(BenchmarkError::TaskNotFound { ids: missing });
        }

        Ok(ids
            .iter()
            .filter_map(|id| self.tasks.iter().find(|task| &task.id == id))
            .cloned()
            .collect())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MockRegistry;

impl EnvironmentRegistry for MockRegistry {
    fn environment(&self, domain: &str) -> BenchmarkResult<Environment> {
        if domain != MOCK_DOMAIN {
            return Err(BenchmarkError::UnknownDomain {
                domain: domain.to_string(),
            });
        }

        let mut tools = ToolRegistry::new();
        tools.register(Box::new(EchoTool::new()));
        tools.register(Box::new(CalculatorTool::new()));

        Ok(Environment {
            domain: domain.to_string(),
            policy: MOCK_POLICY.to_string(),
            tools,
            user_tools: None,
        })
    }
}

/// Speaks the non-empty lines of its scenario in order, then stops.
#[derive(Debug, Clone)]
pub struct ScriptedUser {
    lines: Vec<String>,
    cursor: usize,
}

impl ScriptedUser {
    pub fn new(scenario: &str) -> Self {
        Self {
            lines: scenario
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_string)
                .collect(),
            cursor: 0,
        }
    }
}

impl UserSimulator for ScriptedUser {
    fn respond(&mut self, _agent_message: Option<&ChatMessage>) -> Result<ChatMessage, String> {
        if self.lines.is_empty() {
            return Err("User scenario has no lines to speak".to_string());
        }

        let message = match self.lines.get(self.cursor) {
            Some(line) => ChatMessage::user(line.clone()),
            None => ChatMessage::user(STOP_TOKEN),
        };
        self.cursor += 1;
        Ok(message)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ScriptedUserFactory;

impl UserSimulatorFactory for ScriptedUserFactory {
    fn create(
        &self,
        task: &Task,
        _user_tools: Option<&ToolRegistry>,
        llm: &str,
        _llm_args: &Map<String, Value>,
    ) -> Box<dyn UserSimulator> {
        debug!("Scripted user for task {} (llm {} unused)", task.id, llm);
        Box::new(ScriptedUser::new(&task.user_scenario))
    }
}

fn is_stop(message: &ChatMessage) -> bool {
    message
        .content
        .as_deref()
        .map(|content| content.contains(STOP_TOKEN))
        .unwrap_or(false)
}

/// Alternates user and agent turns. Tool calls are executed against the
/// environment and their results fed straight back to the agent.
#[derive(Debug, Clone, Copy, Default)]
pub struct TurnOrchestrator;

impl Orchestrator for TurnOrchestrator {
    fn run(&self, session: Session) -> Result<SimulationRun, OrchestrationError> {
        let Session {
            domain,
            mut agent,
            mut user,
            environment,
            task,
            limits,
            seed,
        } = session;

        info!("Orchestrating task {} in domain {}", task.id, domain);
        let started = Instant::now();
        agent.set_seed(seed);
        user.set_seed(seed);

        let mut state = agent.initial_state(Vec::new());
        let mut trace: Vec<ChatMessage> = Vec::new();
        let mut last_reply: Option<ChatMessage> = None;
        let mut steps = 0u32;
        let mut errors = 0u32;

        let termination = 'conversation: loop {
            if steps >= limits.max_steps {
                break TerminationReason::MaxSteps;
            }
            steps += 1;

            let user_message = match user.respond(last_reply.as_ref()) {
                Ok(message) => message,
                Err(e) => {
                    warn!("User simulator failed on task {}: {}", task.id, e);
                    break TerminationReason::UserError;
                }
            };
            trace.push(user_message.clone());
            if is_stop(&user_message) {
                break TerminationReason::UserStop;
            }

            let mut input = AgentInput::Message(user_message);
            loop {
                if steps >= limits.max_steps {
                    break 'conversation TerminationReason::MaxSteps;
                }
                steps += 1;

                let (decision, next_state) = match agent.next_decision(input, state) {
                    Ok(turn) => turn,
                    Err(error) => {
                        agent.stop(None);
                        return Err(OrchestrationError::Agent {
                            error,
                            messages: trace,
                        })
                    }
                };
                state = next_state;
                let turn = decision.to_message();
                trace.push(turn.clone());

                match decision {
                    Decision::UserReply { .. } => {
                        last_reply = Some(turn);
                        break;
                    }
                    Decision::ToolInvocation(call) => {
                        let result = environment.tools.invoke(&call);
                        trace.push(result.clone());
                        if result.error {
                            errors += 1;
                            if errors >= limits.max_errors {
                                break 'conversation TerminationReason::TooManyErrors;
                            }
                        }
                        input = AgentInput::ToolResults(vec![result]);
                    }
                }
            }
        };

        agent.stop(Some(&state));
        debug!(
            "Task {} ended after {} steps: {}",
            task.id, steps, termination
        );

        Ok(SimulationRun {
            task_id: task.id,
            messages: trace,
            duration: started.elapsed(),
            termination_reason: termination,
            seed,
        })
    }
}

fn values_match(expected: &Value, actual: &Value) -> bool {
    match (expected, actual) {
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        (Value::Object(a), Value::Object(b)) => a
            .iter()
            .all(|(key, value)| b.get(key).is_some_and(|other| values_match(value, other))),
        _ => expected == actual,
    }
}

fn action_matches(expected: &ExpectedAction, call: &ToolCall) -> bool {
    expected.name == call.function.name
        && expected.arguments.iter().all(|(key, value)| {
            call.function
                .arguments
                .get(key)
                .is_some_and(|actual| values_match(value, actual))
        })
}

/// Scores a run by the tool calls the agent made.
#[derive(Debug, Clone, Copy, Default)]
pub struct ActionEvaluator;

impl Evaluator for ActionEvaluator {
    fn evaluate(
        &self,
        run: &SimulationRun,
        task: &Task,
        evaluation_type: EvaluationType,
        _domain: &str,
    ) -> Result<RewardInfo, EvaluatorError> {
        let criteria =
            task.evaluation_criteria
                .as_ref()
                .ok_or_else(|| EvaluatorError::MissingCriteria {
                    task_id: task.id.clone(),
                })?;

        let mut info = Map::new();
        info.insert(
            "termination_reason".to_string(),
            json!(run.termination_reason.as_str()),
        );

        if !run.termination_reason.is_natural() {
            return Ok(RewardInfo { reward: 0.0, info });
        }

        let agent_turns = || {
            run.messages
                .iter()
                .filter(|message| message.role == MessageRole::Assistant)
        };

        let passed = match evaluation_type {
            EvaluationType::Action => {
                let calls: Vec<&ToolCall> = agent_turns()
                    .filter_map(|message| message.tool_calls.as_ref())
                    .flatten()
                    .collect();
                let matched = criteria
                    .actions
                    .iter()
                    .filter(|action| calls.iter().any(|call| action_matches(action, call)))
                    .count();
                info.insert("expected_actions".to_string(), json!(criteria.actions.len()));
                info.insert("matched_actions".to_string(), json!(matched));
                matched == criteria.actions.len()
            }
            EvaluationType::Communicate => {
                agent_turns().any(|message| message.tool_calls.is_none() && message.content.is_some())
            }
        };

        Ok(RewardInfo {
            reward: if passed { 1.0 } else { 0.0 },
            info,
        })
    }
}

/// The complete mock benchmark.
pub fn benchmark() -> Benchmark {
    Benchmark {
        tasks: Arc::new(MockTaskSource::new()),
        environments: Arc::new(MockRegistry),
        users: Arc::new(ScriptedUserFactory),
        orchestrator: Arc::new(TurnOrchestrator),
        evaluator: Arc::new(ActionEvaluator),
        version: format!("mock-bench {}", env!("CARGO_PKG_VERSION")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::benchmark::{Limits, TraceStats};
    use crate::bridge::{AgentError, AgentResult, ConversationAgent, ConversationState};
    use protocol::codec::DecodeError;
    use protocol::types::FunctionCall;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Plays back a fixed list of decisions.
    struct PlaybackAgent {
        decisions: Mutex<VecDeque<Decision>>,
        fail_when_empty: bool,
    }

    impl PlaybackAgent {
        fn new(decisions: Vec<Decision>) -> Box<Self> {
            Box::new(Self {
                decisions: Mutex::new(decisions.into()),
                fail_when_empty: false,
            })
        }

        /// Sends an unparsable reply once the decisions run out.
        fn failing_after(decisions: Vec<Decision>) -> Box<Self> {
            Box::new(Self {
                decisions: Mutex::new(decisions.into()),
                fail_when_empty: true,
            })
        }
    }

    impl ConversationAgent for PlaybackAgent {
        fn initial_state(&self, history: Vec<ChatMessage>) -> ConversationState {
            ConversationState {
                system_messages: vec![],
                messages: history,
                is_first_turn: true,
            }
        }

        fn next_decision(
            &self,
            input: AgentInput,
            mut state: ConversationState,
        ) -> AgentResult<(Decision, ConversationState)> {
            state.messages.extend(input.into_messages());
            state.is_first_turn = false;
            let next = self.decisions.lock().unwrap().pop_front();
            let decision = match next {
                Some(decision) => decision,
                None if self.fail_when_empty => {
                    return Err(AgentError::MalformedProtocol(DecodeError::Empty))
                }
                None => reply("fallback"),
            };
            Ok((decision, state))
        }
    }

    fn reply(content: &str) -> Decision {
        Decision::UserReply {
            content: content.to_string(),
        }
    }

    fn tool(name: &str, arguments: Value) -> Decision {
        Decision::ToolInvocation(ToolCall {
            id: format!("call_{name}"),
            function: FunctionCall {
                name: name.to_string(),
                arguments,
            },
        })
    }

    fn session(task_id: &str, agent: Box<dyn ConversationAgent>, max_steps: u32) -> Session {
        let task = MockTaskSource::new()
            .tasks("mock", "base", Some(&[task_id.to_string()]))
            .unwrap()
            .remove(0);
        Session {
            domain: "mock".to_string(),
            agent,
            user: Box::new(ScriptedUser::new(&task.user_scenario)),
            environment: MockRegistry.environment("mock").unwrap(),
            task,
            limits: Limits {
                max_steps,
                max_errors: 2,
            },
            seed: 7,
        }
    }

    fn task(id: &str) -> Task {
        MockTaskSource::new()
            .tasks("mock", "base", Some(&[id.to_string()]))
            .unwrap()
            .remove(0)
    }

    #[test]
    fn test_task_source() {
        let source = MockTaskSource::new();
        assert_eq!(source.tasks("mock", "base", None).unwrap().len(), 3);
        assert!(matches!(
            source.tasks("retail", "base", None),
            Err(BenchmarkError::UnknownDomain { .. })
        ));
        assert!(matches!(
            source.tasks("mock", "test", None),
            Err(BenchmarkError::UnknownSplit { .. })
        ));
        match source.tasks("mock", "base", Some(&["mock-1".to_string(), "x".to_string()])) {
            Err(BenchmarkError::TaskNotFound { ids }) => assert_eq!(ids, vec!["x"]),
            other => panic!("expected missing task, got {other:?}"),
        }
    }

    #[test]
    fn test_scripted_user() {
        let mut user = ScriptedUser::new("first\n\n  second  ");
        assert_eq!(user.respond(None).unwrap().content.as_deref(), Some("first"));
        assert_eq!(user.respond(None).unwrap().content.as_deref(), Some("second"));
        assert!(is_stop(&user.respond(None).unwrap()));

        assert!(ScriptedUser::new("").respond(None).is_err());
    }

    #[test]
    fn test_tool_call_then_reply() {
        let agent = PlaybackAgent::new(vec![
            tool("echo", json!({"message": "hello"})),
            reply("I echoed hello."),
        ]);
        let run = TurnOrchestrator.run(session("mock-0", agent, 50)).unwrap();

        assert_eq!(run.termination_reason, TerminationReason::UserStop);
        assert_eq!(run.seed, 7);
        // user, call, result, reply, stop
        assert_eq!(run.messages.len(), 5);
        let stats = run.stats();
        assert_eq!(stats.tool_calls, 1);
        assert!(!stats.tool_error);

        let reward = ActionEvaluator
            .evaluate(&run, &task("mock-0"), EvaluationType::Action, "mock")
            .unwrap();
        assert_eq!(reward.reward, 1.0);
    }

    #[test]
    fn test_numeric_arguments_match_loosely() {
        let agent = PlaybackAgent::new(vec![
            tool("calculate", json!({"operation": "add", "a": 2.0, "b": 3})),
            reply("5"),
            reply("bye"),
        ]);
        let run = TurnOrchestrator.run(session("mock-1", agent, 50)).unwrap();
        let reward = ActionEvaluator
            .evaluate(&run, &task("mock-1"), EvaluationType::Action, "mock")
            .unwrap();
        assert_eq!(reward.reward, 1.0);
        assert_eq!(reward.info["matched_actions"], json!(1));
    }

    #[test]
    fn test_missing_action_scores_zero() {
        let agent = PlaybackAgent::new(vec![reply("hello")]);
        let run = TurnOrchestrator.run(session("mock-0", agent, 50)).unwrap();
        let reward = ActionEvaluator
            .evaluate(&run, &task("mock-0"), EvaluationType::Action, "mock")
            .unwrap();
        assert_eq!(reward.reward, 0.0);

        let communicate = ActionEvaluator
            .evaluate(&run, &task("mock-0"), EvaluationType::Communicate, "mock")
            .unwrap();
        assert_eq!(communicate.reward, 1.0);
    }

    #[test]
    fn test_max_steps() {
        let agent = PlaybackAgent::new(
            (0..10)
                .map(|_| tool("echo", json!({"message": "again"})))
                .collect(),
        );
        let run = TurnOrchestrator.run(session("mock-0", agent, 4)).unwrap();
        assert_eq!(run.termination_reason, TerminationReason::MaxSteps);

        let reward = ActionEvaluator
            .evaluate(&run, &task("mock-0"), EvaluationType::Action, "mock")
            .unwrap();
        assert_eq!(reward.reward, 0.0);
    }

    #[test]
    fn test_too_many_errors() {
        let agent = PlaybackAgent::new(vec![
            tool("missing", json!({})),
            tool("calculate", json!({"operation": "divide", "a": 1, "b": 0})),
        ]);
        let run = TurnOrchestrator.run(session("mock-0", agent, 50)).unwrap();
        assert_eq!(run.termination_reason, TerminationReason::TooManyErrors);
        assert!(run.stats().tool_error);
        assert_eq!(run.stats().tool_calls, 2);
    }

    #[test]
    fn test_agent_failure_keeps_partial_trace() {
        let agent = PlaybackAgent::failing_after(vec![tool("echo", json!({"message": "hello"}))]);
        match TurnOrchestrator.run(session("mock-0", agent, 50)) {
            Err(OrchestrationError::Agent { error, messages }) => {
                assert!(matches!(error, AgentError::MalformedProtocol(_)));
                // user, call, result
                assert_eq!(messages.len(), 3);
                let stats = TraceStats::from_messages(&messages);
                assert_eq!(stats.tool_calls, 1);
                assert!(!stats.tool_error);
            }
            other => panic!("expected agent failure, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_criteria() {
        let run = SimulationRun {
            task_id: "t".to_string(),
            messages: vec![],
            duration: Duration::ZERO,
            termination_reason: TerminationReason::UserStop,
            seed: 0,
        };
        let task = Task {
            id: "t".to_string(),
            user_scenario: "hi".to_string(),
            evaluation_criteria: None,
        };
        assert!(matches!(
            ActionEvaluator.evaluate(&run, &task, EvaluationType::Action, "mock"),
            Err(EvaluatorError::MissingCriteria { .. })
        ));
    }

    #[test]
    fn test_registry() {
        let environment = MockRegistry.environment("mock").unwrap();
        assert_eq!(environment.tools.list_tools(), vec!["calculate", "echo"]);
        assert!(environment.user_tools.is_none());
        assert!(MockRegistry.environment("telecom").is_err());
    }
}
