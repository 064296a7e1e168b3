//! Upstream request/response logging
//!
//! Set the `LLM_LOG_FILE` environment variable to append one JSON line per
//! completion call to that file.
//!
//! Example: `LLM_LOG_FILE=/tmp/llm.log brandpilot-server`

use std::io::Write;
use std::time::Duration;

use serde_json::{json, Value};
use tracing::{debug, warn};

use super::{ChatMessage, CompletionRequest, CompletionResponse};
use crate::error::ProviderError;

/// Everything recorded for one completion call
pub(crate) struct Interaction<'a> {
    pub model: &'a str,
    pub request_id: Option<&'a str>,
    pub request: &'a CompletionRequest,
    pub cache_hit: bool,
    pub mock: bool,
    pub outcome: Result<&'a CompletionResponse, &'a ProviderError>,
    pub elapsed: Duration,
}

fn message_to_json(msg: &ChatMessage) -> Value {
    json!({
        "role": msg.role,
        "name": msg.name,
        "content": msg.content,
        "function_call": msg.function_call.as_ref().map(|c| &c.name),
    })
}

/// Append the interaction to `LLM_LOG_FILE` when it is set
pub(crate) fn log_interaction(interaction: Interaction<'_>) {
    let Ok(log_file) = std::env::var("LLM_LOG_FILE") else {
        return;
    };

    let request = interaction.request;
    let (response, error) = match interaction.outcome {
        Ok(response) => (Some(response.raw()), None),
        Err(e) => (None, Some(e.to_string())),
    };

    let entry = json!({
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "model": interaction.model,
        "request_id": interaction.request_id,
        "cache_hit": interaction.cache_hit,
        "mock": interaction.mock,
        "duration_ms": interaction.elapsed.as_millis() as u64,
        "request": {
            "messages": request.messages.iter().map(message_to_json).collect::<Vec<_>>(),
            "message_count": request.messages.len(),
            "functions": request.functions.as_ref()
                .map(|f| f.iter().map(|d| d.name.as_str()).collect::<Vec<_>>()),
            "temperature": request.temperature,
            "max_tokens": request.max_tokens,
            "use_cache": request.use_cache,
        },
        "response": response,
        "error": error,
    });

    match std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_file)
    {
        Ok(mut file) => {
            if let Err(e) = writeln!(file, "{}", entry) {
                warn!("Failed to write to LLM log file: {}", e);
            }
        }
        Err(e) => {
            warn!("Failed to open LLM log file {}: {}", log_file, e);
        }
    }

    debug!("Logged LLM interaction to {}", log_file);
}
