use protocol::types::{
    ChatMessage, FunctionDefinition, JsonSchema, PropertySchema, SchemaType, ToolCall,
    ToolDefinition,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ToolError {
    #[error("Invalid arguments: {message}")]
    InvalidArguments { message: String },

    #[error("Execution failed: {message}")]
    ExecutionFailed { message: String },

    #[error("Tool not found: {name}")]
    NotFound { name: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type ToolResult<T> = Result<T, ToolError>;

/// A domain tool callable by the agent under evaluation.
pub trait Tool: Send + Sync {
    fn definition(&self) -> ToolDefinition;
    fn execute(&self, args: &Value) -> ToolResult<Value>;
    fn name(&self) -> &str;
}

pub struct ToolRegistry {
    tools: HashMap<String, Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    pub fn register(&mut self, tool: Box<dyn Tool>) {
        let name = tool.name().to_string();
        self.tools.insert(name, tool);
    }

    pub fn get_tool(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(name).map(|t| t.as_ref())
    }

    /// Registered tool names in sorted order.
    pub fn list_tools(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// Definitions sorted by name so prompts are stable across runs.
    pub fn get_definitions(&self) -> Vec<ToolDefinition> {
        self.list_tools()
            .into_iter()
            .filter_map(|name| self.get_tool(name))
            .map(|tool| tool.definition())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn execute(&self, name: &str, args: &Value) -> ToolResult<Value> {
        match self.tools.get(name) {
            Some(tool) => tool.execute(args),
            None => Err(ToolError::NotFound {
                name: name.to_string(),
            }),
        }
    }

    /// Run a tool call and wrap the outcome as a tool-result trace entry.
    /// Failures become error-flagged results rather than errors.
    pub fn invoke(&self, call: &ToolCall) -> ChatMessage {
        let name = &call.function.name;
        match self.execute(name, &call.function.arguments) {
            Ok(result) => ChatMessage::tool_response(&call.id, name, result.to_string()),
            Err(e) => {
                tracing::debug!("Tool {} failed: {}", name, e);
                ChatMessage::tool_error(&call.id, name, format!("Error: {}", e))
            }
        }
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn object_schema(properties: Vec<(&str, SchemaType, &str)>) -> JsonSchema {
    let required = properties.iter().map(|(name, _, _)| name.to_string()).collect();
    let properties = properties
        .into_iter()
        .map(|(name, schema_type, description)| {
            (
                name.to_string(),
                PropertySchema {
                    schema_type,
                    description: Some(description.to_string()),
                    items: None,
                },
            )
        })
        .collect();

    JsonSchema {
        schema_type: SchemaType::Object,
        properties: Some(properties),
        required: Some(required),
    }
}

pub struct EchoTool;

impl EchoTool {
    pub fn new() -> Self {
        Self
    }
}

impl Default for EchoTool {
    fn default() -> Self {
        Self::new()
    }
}

impl Tool for EchoTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(FunctionDefinition {
            name: "echo".to_string(),
            description: "Echo back the provided message".to_string(),
            parameters: object_schema(vec![(
                "message",
                SchemaType::String,
                "The message to echo back",
            )]),
        })
    }

    fn execute(&self, args: &Value) -> ToolResult<Value> {
        let message = args
            .get("message")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolError::InvalidArguments {
                message: "Missing or invalid 'message' parameter".to_string(),
            })?;

        Ok(json!({
            "echoed": message,
            "timestamp": chrono::Utc::now().to_rfc3339()
        }))
    }

    fn name(&self) -> &str {
        "echo"
    }
}

pub struct CalculatorTool;

impl CalculatorTool {
    pub fn new() -> Self {
        Self
    }
}

impl Default for CalculatorTool {
    fn default() -> Self {
        Self::new()
    }
}

impl Tool for CalculatorTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(FunctionDefinition {
            name: "calculate".to_string(),
            description: "Perform basic arithmetic calculations".to_string(),
            parameters: object_schema(vec![
                (
                    "operation",
                    SchemaType::String,
                    "The operation: add, subtract, multiply, divide",
                ),
                ("a", SchemaType::Number, "First number"),
                ("b", SchemaType::Number, "Second number"),
            ]),
        })
    }

    fn execute(&self, args: &Value) -> ToolResult<Value> {
        let operation = args
            .get("operation")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolError::InvalidArguments {
                message: "Missing or invalid 'operation' parameter".to_string(),
            })?;

        let operand = |key: &str| {
            args.get(key)
                .and_then(|v| v.as_f64())
                .ok_or_else(|| ToolError::InvalidArguments {
                    message: format!("Missing or invalid '{}' parameter", key),
                })
        };
        let a = operand("a")?;
        let b = operand("b")?;

        let result = match operation {
            "add" => a + b,
            "subtract" => a - b,
            "multiply" => a * b,
            "divide" => {
                if b == 0.0 {
                    return Err(ToolError::ExecutionFailed {
                        message: "Division by zero".to_string(),
                    });
                }
                a / b
            }
            _ => {
                return Err(ToolError::InvalidArguments {
                    message: format!("Unknown operation: {}", operation),
                });
            }
        };

        Ok(json!({
            "operation": operation,
            "operands": [a, b],
            "result": result
        }))
    }

    fn name(&self) -> &str {
        "calculate"
    }
}
