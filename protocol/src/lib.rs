pub mod a2a;
pub mod codec;
pub mod config;
pub mod retry;
pub mod transport;
pub mod types;

pub use a2a::A2AClient;
pub use codec::{
    build_system_prompt, decode, encode, extract_json_payload, respond_tool, DecodeError,
    Decision, RESPOND_ACTION_NAME,
};
pub use config::A2AConfig;
pub use retry::RetryPolicy;
pub use transport::{AgentTransport, SendRequest, TransportError, TransportResult};
pub use types::{
    AgentInput, ChatMessage, FunctionCall, FunctionDefinition, JsonSchema, MessageRole,
    PropertySchema, SchemaType, ToolCall, ToolDefinition,
};

pub mod prelude {
    pub use crate::a2a::*;
    pub use crate::codec::*;
    pub use crate::config::*;
    pub use crate::retry::*;
    pub use crate::transport::*;
    pub use crate::types::*;
}
