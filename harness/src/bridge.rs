//! Bridge between the turn-based conversation contract and a remote agent.
//!
//! [`RemoteAgent`] implements [`ConversationAgent`] by encoding each incoming
//! turn as text, sending it through an [`AgentTransport`] and decoding the
//! reply into a [`Decision`]. The contract is blocking: the adapter parks the
//! calling thread on the runtime while the transport does its I/O, so it must
//! be called from a blocking thread (see `tokio::task::spawn_blocking`).
//!
//! Conversation state, including whether the next turn is the first one, is
//! passed in and handed back on every call. One adapter serves one task
//! attempt only.

use protocol::codec::{self, DecodeError, Decision};
use protocol::transport::{AgentTransport, SendRequest, TransportError};
use protocol::types::{AgentInput, ChatMessage, ToolDefinition};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Per-turn failures of a remote agent.
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Invalid response payload: {0}")]
    MalformedProtocol(#[from] DecodeError),

    #[error("Remote agent unavailable: {0}")]
    RemoteUnavailable(#[from] TransportError),
}

pub type AgentResult<T> = Result<T, AgentError>;

/// Conversation as seen by the agent side.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationState {
    pub system_messages: Vec<ChatMessage>,
    pub messages: Vec<ChatMessage>,
    pub is_first_turn: bool,
}

/// Decision-making contract consumed by an orchestrator.
pub trait ConversationAgent: Send {
    fn initial_state(&self, history: Vec<ChatMessage>) -> ConversationState;

    fn next_decision(
        &self,
        input: AgentInput,
        state: ConversationState,
    ) -> AgentResult<(Decision, ConversationState)>;

    fn set_seed(&mut self, _seed: i64) {}

    fn stop(&mut self, _state: Option<&ConversationState>) {}
}

/// Where and how to reach the remote agent.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteEndpoint {
    pub url: String,
    pub timeout: Duration,
    pub retries: u32,
}

pub struct RemoteAgent {
    system_prompt: String,
    endpoint: RemoteEndpoint,
    transport: Arc<dyn AgentTransport>,
    runtime: Handle,
    cancel: CancellationToken,
}

impl RemoteAgent {
    pub fn new(
        tools: &[ToolDefinition],
        policy: &str,
        endpoint: RemoteEndpoint,
        transport: Arc<dyn AgentTransport>,
        runtime: Handle,
    ) -> Self {
        Self {
            system_prompt: codec::build_system_prompt(policy, tools),
            endpoint,
            transport,
            runtime,
            cancel: CancellationToken::new(),
        }
    }

    /// Abort in-flight and future remote calls once `cancel` fires.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    fn call_remote(&self, request: SendRequest) -> Result<String, TransportError> {
        if self.cancel.is_cancelled() {
            return Err(TransportError::Cancelled);
        }

        let transport = Arc::clone(&self.transport);
        let cancel = self.cancel.clone();
        self.runtime.block_on(async move {
            tokio::select! {
                reply = transport.send(request) => reply,
                _ = cancel.cancelled() => Err(TransportError::Cancelled),
            }
        })
    }
}

impl ConversationAgent for RemoteAgent {
    fn initial_state(&self, history: Vec<ChatMessage>) -> ConversationState {
        ConversationState {
            system_messages: vec![ChatMessage::system(self.system_prompt.clone())],
            messages: history,
            is_first_turn: true,
        }
    }

    fn next_decision(
        &self,
        input: AgentInput,
        mut state: ConversationState,
    ) -> AgentResult<(Decision, ConversationState)> {
        state.messages.extend(input.clone().into_messages());

        let outgoing = codec::encode(
            &input,
            &state.messages,
            state.is_first_turn,
            &self.system_prompt,
        );

        let request = SendRequest::new(&self.endpoint.url, outgoing)
            .with_new_session(state.is_first_turn)
            .with_timeout(self.endpoint.timeout)
            .with_max_retries(self.endpoint.retries);

        let reply = self.call_remote(request)?;
        let decision = codec::decode(&reply)?;
        debug!(
            "Remote agent decided: {}",
            match &decision {
                Decision::ToolInvocation(call) => call.function.name.as_str(),
                Decision::UserReply { .. } => codec::RESPOND_ACTION_NAME,
            }
        );

        state.messages.push(decision.to_message());
        state.is_first_turn = false;
        Ok((decision, state))
    }
}
