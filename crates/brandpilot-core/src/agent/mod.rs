//! Conversational agent
//!
//! The agent answers one query at a time per call:
//! - Builds the prompt from the system prompt, session memory and the query
//! - Calls the completion provider with every tool offered as a function
//! - Runs requested tools and feeds their results back until the model
//!   answers in plain text, bounded by `max_tool_depth`
//! - Records the exchange in session memory and the request table
//!
//! Upstream failures never surface as errors to the caller; they turn into
//! degraded text responses and the request record keeps the detail.

pub mod memory;
pub mod prompt;
pub mod requests;

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, error, info, warn};

use crate::config::{AgentConfig, ProviderConfig};
use crate::error::Error;
use crate::provider::{ChatMessage, CompletionProvider, CompletionRequest};
use crate::tools::{is_error_result, ToolRegistry};

pub use memory::{ConversationMemory, Turn};
pub use prompt::{resolve_system_prompt, DEFAULT_SYSTEM_PROMPT};
pub use requests::{RequestState, RequestStatus, RequestStore};

const CANCELLED_RESPONSE: &str = "I apologize, but your request was cancelled. Please try again.";
const UNEXPECTED_FAILURE_RESPONSE: &str =
    "I apologize, but I encountered an error while processing your request. Please try again with a simpler query.";
const EMPTY_RESPONSE: &str = "I'm sorry, I couldn't generate a response. Please try rephrasing your request.";

/// Runtime knobs for the agent loop
#[derive(Debug, Clone)]
pub struct AgentSettings {
    pub system_prompt: String,
    pub memory_window: usize,
    pub max_sessions: usize,
    pub max_tool_depth: usize,
    pub initial_timeout: Duration,
    pub followup_timeout: Duration,
    pub tool_timeout: Duration,
    pub cleanup_delay: Duration,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl AgentSettings {
    pub fn from_config(agent: &AgentConfig, provider: &ProviderConfig) -> Self {
        Self {
            system_prompt: resolve_system_prompt(agent.system_prompt.as_deref()),
            memory_window: agent.memory_window,
            max_sessions: agent.max_sessions,
            max_tool_depth: agent.max_tool_depth,
            initial_timeout: Duration::from_secs(agent.initial_timeout_secs),
            followup_timeout: Duration::from_secs(agent.followup_timeout_secs),
            tool_timeout: Duration::from_secs(agent.tool_timeout_secs),
            cleanup_delay: Duration::from_secs(agent.cleanup_delay_secs),
            temperature: provider.temperature,
            max_tokens: provider.max_tokens,
        }
    }
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self::from_config(&AgentConfig::default(), &ProviderConfig::default())
    }
}

/// One tool invocation made while answering a query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRecord {
    pub tool: String,
    pub args: Map<String, Value>,
    pub result: String,
}

/// Final answer to a query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentResponse {
    pub response: String,
    pub session_id: String,
    pub request_id: String,
    pub tool_calls: Vec<ToolCallRecord>,
}

/// Result of the model/tool loop for one query
struct TurnOutcome {
    text: String,
    tool_calls: Vec<ToolCallRecord>,
    /// Set when the answer is degraded; becomes the record's error detail
    failure: Option<String>,
    /// False when the model never answered; such text stays out of history
    remember: bool,
}

impl TurnOutcome {
    fn answered(text: String, tool_calls: Vec<ToolCallRecord>) -> Self {
        Self {
            text,
            tool_calls,
            failure: None,
            remember: true,
        }
    }

    fn degraded(text: String, tool_calls: Vec<ToolCallRecord>, failure: impl ToString) -> Self {
        Self {
            text,
            tool_calls,
            failure: Some(failure.to_string()),
            remember: true,
        }
    }

    /// The first upstream call failed; nothing came back from the model
    fn unanswered(text: String, failure: impl ToString) -> Self {
        Self {
            remember: false,
            ..Self::degraded(text, Vec::new(), failure)
        }
    }
}

/// Join the model's text and a trailing note with a blank line
fn append_note(text: &str, note: &str) -> String {
    let text = text.trim();
    if text.is_empty() {
        note.trim().to_string()
    } else {
        format!("{}\n\n{}", text, note.trim())
    }
}

pub struct Agent {
    provider: Arc<dyn CompletionProvider>,
    tools: Arc<ToolRegistry>,
    memory: ConversationMemory,
    requests: Arc<RequestStore>,
    settings: AgentSettings,
}

impl Agent {
    pub fn new(provider: Arc<dyn CompletionProvider>, tools: Arc<ToolRegistry>, settings: AgentSettings) -> Self {
        Self {
            memory: ConversationMemory::new(settings.memory_window, settings.max_sessions),
            provider,
            tools,
            requests: Arc::new(RequestStore::new()),
            settings,
        }
    }

    pub fn settings(&self) -> &AgentSettings {
        &self.settings
    }

    pub fn memory(&self) -> &ConversationMemory {
        &self.memory
    }

    pub fn requests(&self) -> &Arc<RequestStore> {
        &self.requests
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn is_mock(&self) -> bool {
        self.provider.is_mock()
    }

    /// Answer a query within a session
    ///
    /// Always produces a response. Cancellation through [`Agent::cancel_request`]
    /// stops the loop at its next suspension point. If the returned future is
    /// dropped instead, the request record is marked cancelled.
    pub async fn process_query(&self, query: &str, session_id: &str) -> AgentResponse {
        let (request_id, cancel) = self.requests.register(session_id);
        let _settle = self.requests.guard(&request_id, self.settings.cleanup_delay);
        info!(request_id = %request_id, session_id = %session_id, "Processing query");

        let turn = AssertUnwindSafe(self.run_turn(query, session_id, &request_id)).catch_unwind();
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            result = turn => Some(result),
        };

        let (response, tool_calls) = match outcome {
            None => {
                info!(request_id = %request_id, "Request cancelled");
                (CANCELLED_RESPONSE.to_string(), Vec::new())
            }
            Some(Err(_)) => {
                error!(request_id = %request_id, "Agent loop panicked");
                self.requests.finish(
                    &request_id,
                    RequestState::Error,
                    Some(Error::Agent("agent loop panicked".to_string()).to_string()),
                );
                (UNEXPECTED_FAILURE_RESPONSE.to_string(), Vec::new())
            }
            Some(Ok(outcome)) => {
                let text = if outcome.text.trim().is_empty() {
                    EMPTY_RESPONSE.to_string()
                } else {
                    outcome.text
                };
                if outcome.remember {
                    self.memory.record(session_id, query, text.clone());
                }

                let state = match &outcome.failure {
                    Some(detail) => {
                        warn!(request_id = %request_id, error = %detail, "Request finished with degraded response");
                        RequestState::Error
                    }
                    None => RequestState::Completed,
                };
                self.requests.finish(&request_id, state, outcome.failure);
                (text, outcome.tool_calls)
            }
        };

        AgentResponse {
            response,
            session_id: session_id.to_string(),
            request_id,
            tool_calls,
        }
    }

    async fn run_turn(&self, query: &str, session_id: &str, request_id: &str) -> TurnOutcome {
        let mut messages = vec![ChatMessage::system(&self.settings.system_prompt)];
        messages.extend(self.memory.messages(session_id));
        messages.push(ChatMessage::user(query));
        let functions = self.tools.list();

        let initial = CompletionRequest::new(messages.clone())
            .with_functions(functions.clone())
            .with_temperature(self.settings.temperature)
            .with_max_tokens(self.settings.max_tokens)
            .with_request_id(request_id)
            .with_timeout(self.settings.initial_timeout);

        let mut response = match self.provider.generate_completion(initial).await {
            Ok(response) => response,
            Err(e) => {
                warn!(request_id = %request_id, error = %e, "Initial completion failed");
                return TurnOutcome::unanswered(
                    format!(
                        "I encountered an error while processing your request: {}. Please try a simpler query or try again later.",
                        e
                    ),
                    e,
                );
            }
        };

        let mut tool_calls: Vec<ToolCallRecord> = Vec::new();
        loop {
            let text = response.text().unwrap_or_default().to_string();
            let Some(call) = response.function_call() else {
                return TurnOutcome::answered(text.trim().to_string(), tool_calls);
            };

            if tool_calls.len() >= self.settings.max_tool_depth {
                let limit = Error::ToolDepthExceeded(self.settings.max_tool_depth);
                warn!(request_id = %request_id, tool = %call.name, "{}", limit);
                let latest = tool_calls.last().map(|c| c.result.as_str()).unwrap_or_default();
                let note = format!(
                    "I stopped after {} consecutive tool calls. Here's the latest result: {}",
                    self.settings.max_tool_depth, latest
                );
                return TurnOutcome::degraded(append_note(&text, &note), tool_calls, limit);
            }

            let args = call.parsed_arguments();
            debug!(request_id = %request_id, tool = %call.name, "Model requested tool");
            let result = self
                .tools
                .run(&call.name, args.clone(), self.settings.tool_timeout)
                .await;
            tool_calls.push(ToolCallRecord {
                tool: call.name.clone(),
                args,
                result: result.clone(),
            });

            // Tool failures are answered locally instead of going back to the model
            if is_error_result(&result) {
                return TurnOutcome::answered(append_note(&text, &result), tool_calls);
            }

            messages.push(ChatMessage::assistant_call(
                response.text().map(str::to_string),
                call.clone(),
            ));
            messages.push(ChatMessage::function(&call.name, &result));

            let followup = CompletionRequest::new(messages.clone())
                .with_functions(functions.clone())
                .with_temperature(self.settings.temperature)
                .with_max_tokens(self.settings.max_tokens)
                .with_cache(false)
                .with_request_id(request_id)
                .with_timeout(self.settings.followup_timeout);

            response = match self.provider.generate_completion(followup).await {
                Ok(response) => response,
                Err(e) => {
                    warn!(request_id = %request_id, error = %e, "Follow-up completion failed");
                    let note = format!(
                        "I encountered an error while processing the tool result. Here's what I found: {}",
                        result
                    );
                    return TurnOutcome::degraded(append_note(&text, &note), tool_calls, e);
                }
            };
        }
    }

    /// Cancel a request that is still processing
    pub fn cancel_request(&self, request_id: &str) -> bool {
        if !self.requests.cancel(request_id) {
            return false;
        }
        // The upstream call may already be finished; that's fine
        self.provider.cancel_request(request_id);
        info!(request_id = %request_id, "Cancellation requested");
        true
    }

    pub fn request_status(&self, request_id: &str) -> Option<RequestStatus> {
        self.requests.status(request_id)
    }
}
