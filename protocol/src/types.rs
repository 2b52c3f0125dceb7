use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
    Tool,
}

/// One entry of a conversation trace.
///
/// Tool results carry the name of the tool that produced them and whether the
/// tool reported an error, so trace statistics can be computed from the
/// messages alone.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: Option<String>,
    pub tool_calls: Option<Vec<ToolCall>>,
    pub tool_call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub error: bool,
}

impl ChatMessage {
    fn bare(role: MessageRole) -> Self {
        Self {
            role,
            content: None,
            tool_calls: None,
            tool_call_id: None,
            name: None,
            error: false,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Self::bare(MessageRole::System)
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Self::bare(MessageRole::User)
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Self::bare(MessageRole::Assistant)
        }
    }

    pub fn assistant_with_tools(content: Option<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            content,
            tool_calls: Some(tool_calls),
            ..Self::bare(MessageRole::Assistant)
        }
    }

    pub fn tool_response(
        tool_call_id: impl Into<String>,
        name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            content: Some(content.into()),
            tool_call_id: Some(tool_call_id.into()),
            name: Some(name.into()),
            ..Self::bare(MessageRole::Tool)
        }
    }

    pub fn tool_error(
        tool_call_id: impl Into<String>,
        name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            error: true,
            ..Self::tool_response(tool_call_id, name, content)
        }
    }

    /// Number of tool calls this message requests.
    pub fn tool_call_count(&self) -> usize {
        self.tool_calls.as_ref().map_or(0, Vec::len)
    }

    /// Text shown to the remote agent for this message.
    ///
    /// Tool results are prefixed with the producing tool's name; messages
    /// without content fall back to their JSON form.
    pub fn render_text(&self) -> String {
        match (&self.role, &self.content) {
            (MessageRole::Tool, Some(content)) => format!(
                "Tool '{}' result: {}",
                self.name.as_deref().unwrap_or("unknown"),
                content
            ),
            (_, Some(content)) => content.clone(),
            (_, None) => serde_json::to_string(self).unwrap_or_default(),
        }
    }
}

/// A message handed to the agent side of a conversation.
///
/// Tool results for several parallel calls arrive together as a bundle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum AgentInput {
    Message(ChatMessage),
    ToolResults(Vec<ChatMessage>),
}

impl AgentInput {
    /// Individual trace entries carried by this input, bundles unpacked.
    pub fn into_messages(self) -> Vec<ChatMessage> {
        match self {
            AgentInput::Message(message) => vec![message],
            AgentInput::ToolResults(messages) => messages,
        }
    }

    pub fn render_text(&self) -> String {
        match self {
            AgentInput::Message(message) => message.render_text(),
            AgentInput::ToolResults(messages) => messages
                .iter()
                .map(ChatMessage::render_text)
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

impl From<ChatMessage> for AgentInput {
    fn from(message: ChatMessage) -> Self {
        AgentInput::Message(message)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    pub id: String,
    pub function: FunctionCall,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FunctionCall {
    pub name: String,
    pub arguments: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    #[serde(rename = "type", default = "function_kind")]
    pub kind: String,
    pub function: FunctionDefinition,
}

fn function_kind() -> String {
    "function".to_string()
}

impl ToolDefinition {
    pub fn new(function: FunctionDefinition) -> Self {
        Self {
            kind: function_kind(),
            function,
        }
    }

    pub fn name(&self) -> &str {
        &self.function.name
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionDefinition {
    pub name: String,
    pub description: String,
    pub parameters: JsonSchema,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonSchema {
    #[serde(rename = "type")]
    pub schema_type: SchemaType,
    pub properties: Option<HashMap<String, PropertySchema>>,
    pub required: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaType {
    Object,
    String,
    Number,
    Integer,
    Boolean,
    Array,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertySchema {
    #[serde(rename = "type")]
    pub schema_type: SchemaType,
    pub description: Option<String>,
    pub items: Option<Box<PropertySchema>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_constructors() {
        let sys_msg = ChatMessage::system("You are helpful");
        assert_eq!(sys_msg.role, MessageRole::System);
        assert_eq!(sys_msg.content, Some("You are helpful".to_string()));

        let user_msg = ChatMessage::user("Hello");
        assert_eq!(user_msg.role, MessageRole::User);
        assert_eq!(user_msg.content, Some("Hello".to_string()));

        let tool_response = ChatMessage::tool_response("call_123", "echo", "Result");
        assert_eq!(tool_response.role, MessageRole::Tool);
        assert_eq!(tool_response.tool_call_id, Some("call_123".to_string()));
        assert!(!tool_response.error);

        let tool_error = ChatMessage::tool_error("call_124", "echo", "boom");
        assert!(tool_error.error);
        assert_eq!(tool_error.name.as_deref(), Some("echo"));
    }

    #[test]
    fn test_render_text() {
        assert_eq!(ChatMessage::user("hi there").render_text(), "hi there");
        assert_eq!(
            ChatMessage::tool_response("c1", "lookup", "{\"ok\":true}").render_text(),
            "Tool 'lookup' result: {\"ok\":true}"
        );

        let bundle = AgentInput::ToolResults(vec![
            ChatMessage::tool_response("c1", "a", "1"),
            ChatMessage::tool_response("c2", "b", "2"),
        ]);
        assert_eq!(bundle.render_text(), "Tool 'a' result: 1\nTool 'b' result: 2");
    }

    #[test]
    fn test_content_less_message_renders_as_json() {
        let call = ToolCall {
            id: "call_1".to_string(),
            function: FunctionCall {
                name: "echo".to_string(),
                arguments: serde_json::json!({"message": "x"}),
            },
        };
        let rendered = ChatMessage::assistant_with_tools(None, vec![call]).render_text();
        assert!(rendered.contains("\"echo\""));
    }

    #[test]
    fn test_bundle_unpacks_into_entries() {
        let bundle = AgentInput::ToolResults(vec![
            ChatMessage::tool_response("c1", "a", "1"),
            ChatMessage::tool_error("c2", "b", "bad"),
        ]);
        let messages = bundle.into_messages();
        assert_eq!(messages.len(), 2);
        assert!(messages[1].error);
    }

    #[test]
    fn test_serialization_skips_defaults() {
        let message = ChatMessage::user("Hello world");
        let json = serde_json::to_value(&message).unwrap();
        assert!(json.get("error").is_none());
        assert!(json.get("name").is_none());
        let deserialized: ChatMessage = serde_json::from_value(json).unwrap();
        assert_eq!(message, deserialized);
    }
}
