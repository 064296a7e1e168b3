//! Upstream LLM provider
//!
//! Chat-completion requests go to an OpenAI-compatible endpoint
//! (DeepSeek by default). The provider layer owns:
//! - Message and function-call wire types
//! - Response caching keyed by a SHA-256 over the outbound request
//! - Per-request timeouts and cancellation
//! - A mock mode for running without credentials

mod client;
mod logging;
mod mock;

pub use client::{read_budget, UpstreamClient};
pub use mock::{mock_response, MOCK_TRIGGER_WORDS};

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};

use crate::error::ProviderError;
use crate::tools::ToolDefinition;

/// Default sampling temperature for agent calls
pub const DEFAULT_TEMPERATURE: f32 = 0.7;
/// Default completion length for agent calls
pub const DEFAULT_MAX_TOKENS: u32 = 1024;

/// Message author
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Function,
}

/// A function invocation requested by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    /// JSON-encoded arguments, exactly as the model produced them
    #[serde(default)]
    pub arguments: String,
}

impl FunctionCall {
    pub fn new(name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            arguments: arguments.into(),
        }
    }

    /// Decode the arguments into a key-value map
    ///
    /// Malformed JSON or a non-object value yields an empty map.
    pub fn parsed_arguments(&self) -> Map<String, Value> {
        match serde_json::from_str::<Value>(&self.arguments) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }
}

/// A single message in the outbound conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    #[serde(default)]
    pub content: Option<String>,
    /// Function name for function-role messages
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_call: Option<FunctionCall>,
}

impl ChatMessage {
    fn text(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: Some(content.into()),
            name: None,
            function_call: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::text(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::text(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::text(Role::Assistant, content)
    }

    /// Assistant turn that requested a function call
    pub fn assistant_call(content: Option<String>, call: FunctionCall) -> Self {
        Self {
            role: Role::Assistant,
            content,
            name: None,
            function_call: Some(call),
        }
    }

    /// Result of a function call, fed back to the model
    pub fn function(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Function,
            content: Some(content.into()),
            name: Some(name.into()),
            function_call: None,
        }
    }

    pub fn content_text(&self) -> &str {
        self.content.as_deref().unwrap_or("")
    }
}

/// Parameters of one chat-completion call
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub functions: Option<Vec<ToolDefinition>>,
    pub use_cache: bool,
    /// Identifier under which the call can be cancelled
    pub request_id: Option<String>,
    /// Request budget; the client default applies when unset
    pub timeout: Option<Duration>,
}

impl CompletionRequest {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            functions: None,
            use_cache: true,
            request_id: None,
            timeout: None,
        }
    }

    pub fn with_functions(mut self, functions: Vec<ToolDefinition>) -> Self {
        self.functions = if functions.is_empty() { None } else { Some(functions) };
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_cache(mut self, use_cache: bool) -> Self {
        self.use_cache = use_cache;
        self
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Raw upstream response with accessors for the parts the agent reads
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CompletionResponse(Value);

impl CompletionResponse {
    pub fn new(raw: Value) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> &Value {
        &self.0
    }

    pub fn into_raw(self) -> Value {
        self.0
    }

    fn first_message(&self) -> Option<&Value> {
        self.0.get("choices")?.get(0)?.get("message")
    }

    /// Assistant text of the first choice
    pub fn text(&self) -> Option<&str> {
        self.first_message()?.get("content")?.as_str()
    }

    /// Function call of the first choice
    ///
    /// Accepts both the legacy `function_call` field and the first entry of
    /// `tool_calls`.
    pub fn function_call(&self) -> Option<FunctionCall> {
        let message = self.first_message()?;

        let call = match message.get("function_call").filter(|v| !v.is_null()) {
            Some(call) => call,
            None => message.get("tool_calls")?.get(0)?.get("function")?,
        };

        let name = call.get("name")?.as_str()?.to_string();
        let arguments = match call.get("arguments") {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        };
        Some(FunctionCall { name, arguments })
    }

    pub fn usage(&self) -> Option<&Value> {
        self.0.get("usage")
    }
}

/// Deterministic cache key for a completion request
///
/// SHA-256 over the compact JSON of `{"messages", "model"}`. Object keys
/// serialize in sorted order, so equal inputs give equal keys across
/// processes.
pub fn cache_key(model: &str, messages: &[ChatMessage]) -> String {
    let canonical = json!({
        "messages": messages,
        "model": model,
    });
    let digest = Sha256::digest(canonical.to_string().as_bytes());
    format!("completion:{:x}", digest)
}

/// Chat-completion backend used by the agent loop
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Run one completion, honoring the request's cache flag, id and timeout
    async fn generate_completion(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionResponse, ProviderError>;

    /// Abort the in-flight call registered under `request_id`
    ///
    /// Returns false when no such call is outstanding.
    fn cancel_request(&self, request_id: &str) -> bool;

    /// Whether responses are synthesized locally
    fn is_mock(&self) -> bool {
        false
    }
}
