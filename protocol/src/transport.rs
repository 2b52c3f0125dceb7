use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Remote agent returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Remote agent returned JSON-RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Request cancelled")]
    Cancelled,

    #[error("Remote agent returned no text")]
    EmptyResponse,

    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    #[error("Gave up after {attempts} attempts: {last}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        last: Box<TransportError>,
    },
}

impl TransportError {
    /// Whether another attempt could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            TransportError::Network(err) => {
                err.is_timeout() || err.is_connect() || err.is_request()
            }
            TransportError::Status { status, .. } => *status == 429 || *status >= 500,
            TransportError::Timeout(_) => true,
            _ => false,
        }
    }
}

pub type TransportResult<T> = Result<T, TransportError>;

/// One outgoing exchange with a remote agent.
#[derive(Debug, Clone, PartialEq)]
pub struct SendRequest {
    pub text: String,
    pub url: String,
    /// Start a new logical session with the remote instead of continuing one.
    pub new_session: bool,
    /// Bound on a single HTTP exchange.
    pub timeout: Duration,
    /// Extra attempts after the first failure.
    pub max_retries: u32,
}

impl SendRequest {
    pub fn new(url: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            url: url.into(),
            new_session: false,
            timeout: Duration::from_secs(300),
            max_retries: 0,
        }
    }

    pub fn with_new_session(mut self, new_session: bool) -> Self {
        self.new_session = new_session;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }
}

/// Delivers text to a remote agent and returns its textual reply.
///
/// Implementations own connection reuse and session correlation (keyed by URL
/// and the `new_session` flag) and must be shareable across a whole run.
#[async_trait]
pub trait AgentTransport: Send + Sync {
    async fn send(&self, request: SendRequest) -> TransportResult<String>;

    /// Forget all session correlation state.
    async fn reset(&self);

    fn transport_name(&self) -> &'static str;
}
