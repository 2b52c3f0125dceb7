//! Text codec between the structured conversation model and a remote agent
//! that only speaks free text.
//!
//! Outgoing turns are rendered as plain text, with the full system prompt
//! prepended on the first turn of a conversation. Incoming replies must carry
//! a single JSON action envelope:
//!
//! ```text
//! {"name": "<tool name or respond>", "arguments": {...}}
//! ```
//!
//! optionally wrapped in `<json>...</json>` or a fenced code block.

use crate::types::{
    AgentInput, ChatMessage, FunctionCall, FunctionDefinition, JsonSchema, PropertySchema,
    SchemaType, ToolCall, ToolDefinition,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use thiserror::Error;
use uuid::Uuid;

/// Name of the pseudo-tool used for replying directly to the user.
pub const RESPOND_ACTION_NAME: &str = "respond";

const USER_MESSAGES_HEADER: &str = "Now here are the user messages:";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("response is empty")]
    Empty,

    #[error("response is not valid JSON: {0}")]
    InvalidJson(String),

    #[error("response JSON is not an object")]
    NotAnObject,

    #[error("Missing '{0}' in response JSON")]
    MissingField(&'static str),

    #[error("'name' must be a string")]
    InvalidName,

    #[error("'arguments' must be a JSON object")]
    InvalidArguments,

    #[error("'respond' action requires a string 'content' argument")]
    MissingContent,
}

/// The agent's decision for one turn.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// Invoke a domain tool. The call id is generated locally.
    ToolInvocation(ToolCall),
    /// Reply to the user with free text.
    UserReply { content: String },
}

impl Decision {
    pub fn is_tool_invocation(&self) -> bool {
        matches!(self, Decision::ToolInvocation(_))
    }

    /// Assistant trace entry for this decision.
    pub fn to_message(&self) -> ChatMessage {
        match self {
            Decision::ToolInvocation(call) => {
                ChatMessage::assistant_with_tools(None, vec![call.clone()])
            }
            Decision::UserReply { content } => ChatMessage::assistant(content.clone()),
        }
    }
}

/// Definition of the synthetic `respond` action offered next to the domain tools.
pub fn respond_tool() -> ToolDefinition {
    let mut properties = HashMap::new();
    properties.insert(
        "content".to_string(),
        PropertySchema {
            schema_type: SchemaType::String,
            description: Some("The message content to send to the user.".to_string()),
            items: None,
        },
    );

    ToolDefinition::new(FunctionDefinition {
        name: RESPOND_ACTION_NAME.to_string(),
        description: "Respond directly to the user with a message instead of calling a tool."
            .to_string(),
        parameters: JsonSchema {
            schema_type: SchemaType::Object,
            properties: Some(properties),
            required: Some(vec!["content".to_string()]),
        },
    })
}

fn pretty(value: &impl serde::Serialize) -> String {
    serde_json::to_string_pretty(value).unwrap_or_default()
}

/// Build the first-turn system prompt: domain policy, tool schemas, the
/// `respond` action, the envelope format and two worked examples.
pub fn build_system_prompt(policy: &str, tools: &[ToolDefinition]) -> String {
    let tool_call_example = json!({"name": "echo", "arguments": {"message": "test"}});
    let respond_example = json!({
        "name": RESPOND_ACTION_NAME,
        "arguments": {"content": "Hello, how can I help you today?"}
    });

    format!(
        r#"{policy}

Here's a list of tools you can use (you can use at most one tool at a time):
{tools}

and

{respond}


Please respond in JSON format.
The JSON should contain:
- "name": the tool call function name.
- "arguments": the arguments for the tool call.

You should only use one tool at a time!
You cannot respond to user and use a tool at the same time!

Examples of responses:
<json>
{tool_call_example}
</json>

<json>
{respond_example}
</json>
"#,
        policy = policy,
        tools = pretty(&tools),
        respond = pretty(&respond_tool()),
        tool_call_example = pretty(&tool_call_example),
        respond_example = pretty(&respond_example),
    )
}

/// Render the outgoing text for one agent turn.
///
/// `history` must already contain the entries of `input`. On the first turn
/// the whole history is sent after the system prompt; afterwards only the
/// incoming message is rendered.
pub fn encode(
    input: &AgentInput,
    history: &[ChatMessage],
    is_first_turn: bool,
    system_prompt: &str,
) -> String {
    if !is_first_turn {
        return input.render_text();
    }

    let transcript = history
        .iter()
        .map(ChatMessage::render_text)
        .collect::<Vec<_>>()
        .join("\n");

    format!("{system_prompt}\n\n{USER_MESSAGES_HEADER}\n{transcript}")
}

/// Strip an optional `<json>` delimiter pair and an optional fenced code block.
pub fn extract_json_payload(response: &str) -> &str {
    let mut text = response.trim();

    if let Some((_, rest)) = text.split_once("<json>") {
        text = match rest.split_once("</json>") {
            Some((inner, _)) => inner,
            None => rest,
        };
        text = text.trim();
    }

    if text.starts_with("```") {
        text = text.trim_matches('`').trim();
        if text
            .get(..4)
            .is_some_and(|tag| tag.eq_ignore_ascii_case("json"))
        {
            text = text[4..].trim();
        }
    }

    text
}

fn new_call_id() -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!("call_{}", &id[..8])
}

/// Decode a remote reply into a [`Decision`].
pub fn decode(response: &str) -> Result<Decision, DecodeError> {
    let payload = extract_json_payload(response);
    if payload.is_empty() {
        return Err(DecodeError::Empty);
    }

    let value: Value =
        serde_json::from_str(payload).map_err(|e| DecodeError::InvalidJson(e.to_string()))?;
    let action = value.as_object().ok_or(DecodeError::NotAnObject)?;

    let name = action.get("name").ok_or(DecodeError::MissingField("name"))?;
    let arguments = action
        .get("arguments")
        .ok_or(DecodeError::MissingField("arguments"))?;

    let name = name.as_str().ok_or(DecodeError::InvalidName)?;
    let arguments = arguments.as_object().ok_or(DecodeError::InvalidArguments)?;

    if name == RESPOND_ACTION_NAME {
        let content = arguments
            .get("content")
            .and_then(Value::as_str)
            .ok_or(DecodeError::MissingContent)?;
        return Ok(Decision::UserReply {
            content: content.to_string(),
        });
    }

    Ok(Decision::ToolInvocation(ToolCall {
        id: new_call_id(),
        function: FunctionCall {
            name: name.to_string(),
            arguments: Value::Object(arguments.clone()),
        },
    }))
}
