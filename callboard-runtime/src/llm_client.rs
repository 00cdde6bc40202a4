//! OpenAI-compatible chat-completions client implementing `ModelProvider`.

use crate::interfaces::{ModelProvider, RuntimeError};
use crate::types::{Message, ModelResponse, Role, ToolCallRequest};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<String>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ChatToolCall>>,
}

#[derive(Debug, Deserialize)]
struct ChatToolCall {
    #[serde(default)]
    id: Option<String>,
    function: ChatFunction,
}

#[derive(Debug, Deserialize)]
struct ChatFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}

/// Circuit breaker state.
struct CircuitBreaker {
    consecutive_failures: AtomicUsize,
    breaker_open: AtomicBool,
    opened_at: Mutex<Option<Instant>>,
    failure_threshold: usize,
    cooldown_duration: Duration,
}

impl CircuitBreaker {
    fn new(failure_threshold: usize, cooldown_duration: Duration) -> Self {
        Self {
            consecutive_failures: AtomicUsize::new(0),
            breaker_open: AtomicBool::new(false),
            opened_at: Mutex::new(None),
            failure_threshold,
            cooldown_duration,
        }
    }

    fn record_success(&self) {
        self.consecutive_failures.store(0, Ordering::SeqCst);
        self.breaker_open.store(false, Ordering::SeqCst);
        *self.opened_at.lock() = None;
    }

    fn record_failure(&self) {
        let failures = self.consecutive_failures.fetch_add(1, Ordering::SeqCst) + 1;
        if failures >= self.failure_threshold {
            self.breaker_open.store(true, Ordering::SeqCst);
            *self.opened_at.lock() = Some(Instant::now());
        }
    }

    fn should_allow_request(&self) -> Result<(), RuntimeError> {
        if !self.breaker_open.load(Ordering::SeqCst) {
            return Ok(());
        }

        if let Some(opened_time) = *self.opened_at.lock() {
            if opened_time.elapsed() >= self.cooldown_duration {
                // Half-open: let one trial through.
                return Ok(());
            }
        }

        Err(RuntimeError::ProviderError(
            "Circuit breaker open: model provider unavailable".to_string(),
        ))
    }
}

/// Client for any provider exposing `POST {base_url}/chat/completions`.
#[derive(Clone)]
pub struct LLMClient {
    base_url: String,
    model: String,
    client: reqwest::Client,
    max_retries: u32,
    circuit_breaker: Arc<CircuitBreaker>,
    api_key: Option<String>,
}

impl LLMClient {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>, max_retries: u32) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            base_url: base_url.into(),
            model: model.into(),
            client,
            max_retries,
            circuit_breaker: Arc::new(CircuitBreaker::new(5, Duration::from_secs(30))),
            api_key: None,
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn retry_delay(attempt: u32, err: &RuntimeError) -> Duration {
        let msg = err.to_string().to_lowercase();
        if msg.contains("rate limit") {
            return Duration::from_secs(2_u64.saturating_pow(attempt + 1).min(30));
        }
        Duration::from_millis(250_u64.saturating_mul(2_u64.saturating_pow(attempt)).min(5000))
    }

    async fn call_once(
        &self,
        system_prompt: &str,
        messages: &[Message],
        tool_catalogue: &[Value],
    ) -> Result<ModelResponse, CallFailure> {
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        let request = ChatRequest {
            model: self.model.clone(),
            messages: to_chat_messages(system_prompt, messages),
            tools: (!tool_catalogue.is_empty()).then(|| tool_catalogue.to_vec()),
            tool_choice: (!tool_catalogue.is_empty()).then(|| "auto".to_string()),
            temperature: 0.2,
            max_tokens: 4_096,
        };

        debug!(
            "model url={} model={} tools_count={}",
            url,
            self.model,
            tool_catalogue.len()
        );

        let mut req_builder = self.client.post(&url).json(&request);
        if let Some(api_key) = &self.api_key {
            req_builder = req_builder.header("Authorization", format!("Bearer {}", api_key));
        }

        let response = req_builder.send().await.map_err(|e| {
            let message = if e.is_connect() || e.is_timeout() {
                "Network connection failed".to_string()
            } else {
                format!("HTTP request failed: {}", e)
            };
            CallFailure::transient(message)
        })?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());

            return Err(match status.as_u16() {
                401 | 403 => CallFailure::permanent(format!(
                    "Authentication failed (HTTP {}). Details: {}",
                    status, error_body
                )),
                404 => CallFailure::permanent(format!(
                    "Invalid endpoint (404 Not Found). Details: {}",
                    error_body
                )),
                429 => CallFailure::transient(format!("Rate limit exceeded. Details: {}", error_body)),
                500..=599 => CallFailure::transient(format!(
                    "Provider error: {}. Details: {}",
                    status, error_body
                )),
                _ => CallFailure::permanent(format!("HTTP error: {}. Details: {}", status, error_body)),
            });
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| CallFailure::transient(format!("Failed to parse response: {}", e)))?;

        parse_completion(body).map_err(|e| CallFailure::permanent(e.to_string()))
    }
}

struct CallFailure {
    error: RuntimeError,
    retryable: bool,
}

impl CallFailure {
    fn transient(message: String) -> Self {
        Self {
            error: RuntimeError::ProviderError(message),
            retryable: true,
        }
    }

    fn permanent(message: String) -> Self {
        Self {
            error: RuntimeError::ProviderError(message),
            retryable: false,
        }
    }
}

#[async_trait]
impl ModelProvider for LLMClient {
    async fn complete(
        &self,
        system_prompt: &str,
        messages: &[Message],
        tool_catalogue: &[Value],
    ) -> Result<ModelResponse, RuntimeError> {
        self.circuit_breaker.should_allow_request()?;

        let mut last_error = None;
        for attempt in 0..=self.max_retries {
            debug!("Model call attempt {}/{}", attempt + 1, self.max_retries + 1);

            match self.call_once(system_prompt, messages, tool_catalogue).await {
                Ok(response) => {
                    self.circuit_breaker.record_success();
                    return Ok(response);
                }
                Err(failure) => {
                    warn!("Model call failed (attempt {}): {}", attempt + 1, failure.error);
                    let delay = Self::retry_delay(attempt, &failure.error);
                    let retryable = failure.retryable;
                    last_error = Some(failure.error);
                    if !retryable {
                        break;
                    }
                    if attempt < self.max_retries {
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        self.circuit_breaker.record_failure();
        Err(RuntimeError::ProviderError(format!(
            "Model call failed: {}",
            last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "Unknown error".to_string())
        )))
    }
}

/// Convert engine history to the chat-completions message list.
fn to_chat_messages(system_prompt: &str, messages: &[Message]) -> Vec<Value> {
    let mut chat = Vec::with_capacity(messages.len() + 1);
    if !system_prompt.is_empty() {
        chat.push(json!({"role": "system", "content": system_prompt}));
    }

    for msg in messages {
        match msg.role {
            Role::Assistant if !msg.tool_calls().is_empty() => {
                let calls: Vec<Value> = msg
                    .tool_calls()
                    .into_iter()
                    .map(|call| {
                        json!({
                            "id": call.id,
                            "type": "function",
                            "function": {
                                "name": call.name,
                                "arguments": call.input.to_string()
                            }
                        })
                    })
                    .collect();
                let content = match msg.text() {
                    text if text.is_empty() => Value::Null,
                    text => Value::String(text),
                };
                chat.push(json!({"role": "assistant", "content": content, "tool_calls": calls}));
            }
            Role::Tool => {
                let call_id = msg
                    .metadata
                    .as_ref()
                    .and_then(|m| m.get("call_id"))
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                chat.push(json!({"role": "tool", "tool_call_id": call_id, "content": msg.text()}));
            }
            ref role => {
                let role = match role {
                    Role::User => "user",
                    Role::Assistant => "assistant",
                    Role::System => "system",
                    Role::Tool => "tool",
                };
                chat.push(json!({"role": role, "content": msg.text()}));
            }
        }
    }
    chat
}

/// Map a chat-completions body onto a tool-use or terminal response.
fn parse_completion(body: ChatResponse) -> Result<ModelResponse, RuntimeError> {
    let choice = body
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| RuntimeError::ProviderError("No choices in response".to_string()))?;

    let tool_calls = choice.message.tool_calls.unwrap_or_default();
    if !tool_calls.is_empty() {
        let mut requests = Vec::with_capacity(tool_calls.len());
        for (index, call) in tool_calls.into_iter().enumerate() {
            if call.function.name.is_empty() {
                return Err(RuntimeError::ProviderError(
                    "Tool call missing function name".to_string(),
                ));
            }
            let input = if call.function.arguments.trim().is_empty() {
                json!({})
            } else {
                serde_json::from_str(&call.function.arguments).map_err(|e| {
                    RuntimeError::ProviderError(format!(
                        "Tool call {} has malformed arguments: {}",
                        call.function.name, e
                    ))
                })?
            };
            let id = call.id.unwrap_or_else(|| format!("call_{}", index));
            requests.push(ToolCallRequest::new(id, call.function.name, input));
        }

        return Ok(ModelResponse::ToolUse {
            schema_version: crate::types::SCHEMA_VERSION,
            content: choice.message.content.filter(|c| !c.trim().is_empty()),
            tool_calls: requests,
        });
    }

    if choice.finish_reason.as_deref() == Some("tool_calls") {
        return Err(RuntimeError::ProviderError(
            "finish_reason is tool_calls but no tool calls were returned".to_string(),
        ));
    }

    Ok(ModelResponse::terminal(choice.message.content.unwrap_or_default()))
}
