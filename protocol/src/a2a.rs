use crate::config::A2AConfig;
use crate::transport::{AgentTransport, SendRequest, TransportError, TransportResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// JSON-RPC 2.0 envelope for `message/send`
#[derive(Debug, Clone, Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    id: String,
    method: &'static str,
    params: MessageSendParams<'a>,
}

#[derive(Debug, Clone, Serialize)]
struct MessageSendParams<'a> {
    message: OutgoingMessage<'a>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct OutgoingMessage<'a> {
    kind: &'static str,
    role: &'static str,
    message_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    context_id: Option<&'a str>,
    parts: Vec<OutgoingPart<'a>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
enum OutgoingPart<'a> {
    Text { text: &'a str },
}

#[derive(Debug, Clone, Deserialize)]
struct JsonRpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<JsonRpcError>,
}

#[derive(Debug, Clone, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

/// Text and session id pulled out of a `message/send` result.
#[derive(Debug, Clone, PartialEq)]
struct AgentReply {
    text: String,
    context_id: Option<String>,
}

/// HTTP transport speaking the A2A `message/send` method.
///
/// One remote conversation (`contextId`) is tracked per agent URL.
pub struct A2AClient {
    client: reqwest::Client,
    config: A2AConfig,
    contexts: Mutex<HashMap<String, String>>,
}

impl A2AClient {
    pub fn new(config: A2AConfig) -> TransportResult<Self> {
        config
            .validate()
            .map_err(|message| TransportError::InvalidConfig { message })?;

        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(Self {
            client,
            config,
            contexts: Mutex::new(HashMap::new()),
        })
    }

    pub fn with_default_config() -> TransportResult<Self> {
        Self::new(A2AConfig::default())
    }

    /// Remote context currently associated with `url`, if any.
    pub fn context_for(&self, url: &str) -> Option<String> {
        self.contexts
            .lock()
            .ok()
            .and_then(|contexts| contexts.get(url).cloned())
    }

    fn forget_context(&self, url: &str) {
        if let Ok(mut contexts) = self.contexts.lock() {
            contexts.remove(url);
        }
    }

    fn remember_context(&self, url: &str, context_id: String) {
        if let Ok(mut contexts) = self.contexts.lock() {
            contexts.insert(url.to_string(), context_id);
        }
    }

    async fn send_once(
        &self,
        request: &SendRequest,
        message_id: &str,
        context_id: Option<&str>,
    ) -> TransportResult<AgentReply> {
        let body = JsonRpcRequest {
            jsonrpc: "2.0",
            id: Uuid::new_v4().to_string(),
            method: "message/send",
            params: MessageSendParams {
                message: OutgoingMessage {
                    kind: "message",
                    role: "user",
                    message_id,
                    context_id,
                    parts: vec![OutgoingPart::Text {
                        text: &request.text,
                    }],
                },
            },
        };

        let exchange = async {
            let response = self.client.post(&request.url).json(&body).send().await?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(TransportError::Status {
                    status: status.as_u16(),
                    body,
                });
            }

            let text = response.text().await?;
            let rpc: JsonRpcResponse = serde_json::from_str(&text)?;
            Ok::<JsonRpcResponse, TransportError>(rpc)
        };

        let rpc = tokio::time::timeout(request.timeout, exchange)
            .await
            .map_err(|_| TransportError::Timeout(request.timeout))??;

        if let Some(error) = rpc.error {
            return Err(TransportError::Rpc {
                code: error.code,
                message: error.message,
            });
        }

        let result = rpc.result.ok_or(TransportError::EmptyResponse)?;
        extract_reply(&result)
    }
}

fn part_text(part: &Value) -> Option<String> {
    match part.get("kind").and_then(Value::as_str) {
        Some("text") | None => part.get("text").and_then(Value::as_str).map(str::to_string),
        Some("data") => part.get("data").map(Value::to_string),
        _ => None,
    }
}

fn parts_text(parts: Option<&Value>) -> Vec<String> {
    parts
        .and_then(Value::as_array)
        .map(|parts| parts.iter().filter_map(part_text).collect())
        .unwrap_or_default()
}

/// Collect the reply text from either a `message` or a `task` result.
fn extract_reply(result: &Value) -> TransportResult<AgentReply> {
    let context_id = result
        .get("contextId")
        .and_then(Value::as_str)
        .map(str::to_string);

    let texts = match result.get("kind").and_then(Value::as_str) {
        Some("task") => {
            let from_artifacts: Vec<String> = result
                .get("artifacts")
                .and_then(Value::as_array)
                .map(|artifacts| {
                    artifacts
                        .iter()
                        .flat_map(|artifact| parts_text(artifact.get("parts")))
                        .collect()
                })
                .unwrap_or_default();

            if from_artifacts.is_empty() {
                parts_text(result.pointer("/status/message/parts"))
            } else {
                from_artifacts
            }
        }
        _ => parts_text(result.get("parts")),
    };

    if texts.is_empty() {
        return Err(TransportError::EmptyResponse);
    }

    Ok(AgentReply {
        text: texts.join("\n"),
        context_id,
    })
}

#[async_trait]
impl AgentTransport for A2AClient {
    async fn send(&self, request: SendRequest) -> TransportResult<String> {
        if request.new_session {
            self.forget_context(&request.url);
        }
        let context_id = self.context_for(&request.url);
        let message_id = Uuid::new_v4().to_string();

        debug!(
            "Sending {} chars to {} (new_session={}, context={:?})",
            request.text.len(),
            request.url,
            request.new_session,
            context_id
        );

        let mut attempt = 0;
        loop {
            match self
                .send_once(&request, &message_id, context_id.as_deref())
                .await
            {
                Ok(reply) => {
                    if let Some(context_id) = reply.context_id {
                        self.remember_context(&request.url, context_id);
                    }
                    debug!("Received {} chars from {}", reply.text.len(), request.url);
                    return Ok(reply.text);
                }
                Err(err) if err.is_retryable() && attempt < request.max_retries => {
                    let delay = self.config.retry.delay_for(attempt);
                    attempt += 1;
                    warn!(
                        "Request to {} failed (attempt {}), retrying in {:?}: {}",
                        request.url, attempt, delay, err
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) if attempt == 0 => return Err(err),
                Err(err) => {
                    return Err(TransportError::RetriesExhausted {
                        attempts: attempt + 1,
                        last: Box::new(err),
                    })
                }
            }
        }
    }

    async fn reset(&self) {
        if let Ok(mut contexts) = self.contexts.lock() {
            if !contexts.is_empty() {
                info!("Clearing {} remote agent session(s)", contexts.len());
            }
            contexts.clear();
        }
    }

    fn transport_name(&self) -> &'static str {
        "a2a"
    }
}
