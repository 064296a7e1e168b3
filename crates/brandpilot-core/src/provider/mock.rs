//! Canned responses for running without credentials

use serde_json::{json, Value};

use super::{CompletionRequest, CompletionResponse, Role};

/// Words in a user message that make the mock request a web search
pub const MOCK_TRIGGER_WORDS: &[&str] = &["search", "weather", "news", "look up"];

/// Synthesize a chat-completion response for `request`
///
/// - After a function result, the mock answers with that result.
/// - A user message containing a trigger word, with functions on offer,
///   produces a `web_search` call for the whole message.
/// - Anything else gets a fixed notice quoting the query.
pub fn mock_response(request: &CompletionRequest, model: &str) -> CompletionResponse {
    let last = request.messages.last();

    let message = match last {
        Some(msg) if msg.role == Role::Function => json!({
            "role": "assistant",
            "content": format!(
                "Based on the {} results: {}",
                msg.name.as_deref().unwrap_or("tool"),
                msg.content_text()
            ),
        }),
        Some(msg) if msg.role == Role::User && offers_search(request) && is_trigger(msg.content_text()) => json!({
            "role": "assistant",
            "content": null,
            "function_call": {
                "name": "web_search",
                "arguments": json!({"query": msg.content_text()}).to_string(),
            },
        }),
        _ => {
            let query = request
                .messages
                .iter()
                .rev()
                .find(|m| m.role == Role::User)
                .map(|m| m.content_text())
                .unwrap_or("");
            json!({
                "role": "assistant",
                "content": format!(
                    "This is a mock response from the DeepSeek API simulator. You asked: '{}'. \
                     Since this is running in mock mode, I can't provide a real response. \
                     Please set a valid DEEPSEEK_API_KEY in your environment variables.",
                    query
                ),
            })
        }
    };

    let finish_reason = if message.get("function_call").is_some() {
        "function_call"
    } else {
        "stop"
    };

    CompletionResponse::new(json!({
        "id": "mock-completion",
        "object": "chat.completion",
        "created": 0,
        "model": model,
        "choices": [{
            "index": 0,
            "message": message,
            "finish_reason": finish_reason,
        }],
        "usage": mock_usage(),
    }))
}

fn mock_usage() -> Value {
    json!({
        "prompt_tokens": 100,
        "completion_tokens": 50,
        "total_tokens": 150,
    })
}

fn offers_search(request: &CompletionRequest) -> bool {
    request
        .functions
        .as_ref()
        .is_some_and(|fs| fs.iter().any(|f| f.name == "web_search"))
}

fn is_trigger(text: &str) -> bool {
    let lower = text.to_lowercase();
    MOCK_TRIGGER_WORDS.iter().any(|w| lower.contains(w))
}
