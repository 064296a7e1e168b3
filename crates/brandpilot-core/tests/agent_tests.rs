//! Agent loop integration tests
//!
//! The completion provider is replaced by a scripted double that replays
//! canned responses and records every request it receives.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use brandpilot_core::agent::{Agent, AgentSettings, RequestState};
use brandpilot_core::error::{ProviderError, ToolError};
use brandpilot_core::provider::{CompletionProvider, CompletionRequest, CompletionResponse, Role};
use brandpilot_core::tools::{BoxFuture, Tool, ToolRegistry, WebSearch};

enum Step {
    Reply(CompletionResponse),
    Fail(ProviderError),
    /// Never completes; only cancellation ends it
    Hang,
}

#[derive(Default)]
struct ScriptedProvider {
    steps: Mutex<VecDeque<Step>>,
    seen: Mutex<Vec<CompletionRequest>>,
    cancelled: Mutex<Vec<String>>,
}

impl ScriptedProvider {
    fn new(steps: Vec<Step>) -> Arc<Self> {
        Arc::new(Self {
            steps: Mutex::new(steps.into()),
            ..Default::default()
        })
    }

    fn requests(&self) -> Vec<CompletionRequest> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionProvider for ScriptedProvider {
    async fn generate_completion(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionResponse, ProviderError> {
        self.seen.lock().unwrap().push(request);
        let step = self.steps.lock().unwrap().pop_front();
        match step {
            Some(Step::Reply(response)) => Ok(response),
            Some(Step::Fail(e)) => Err(e),
            Some(Step::Hang) => std::future::pending().await,
            None => Err(ProviderError::Transport("script exhausted".to_string())),
        }
    }

    fn cancel_request(&self, request_id: &str) -> bool {
        self.cancelled.lock().unwrap().push(request_id.to_string());
        true
    }
}

fn text(content: &str) -> Step {
    Step::Reply(CompletionResponse::new(json!({
        "choices": [{"message": {"role": "assistant", "content": content}, "finish_reason": "stop"}]
    })))
}

fn call(content: Option<&str>, name: &str, arguments: &str) -> Step {
    Step::Reply(CompletionResponse::new(json!({
        "choices": [{
            "message": {
                "role": "assistant",
                "content": content,
                "function_call": {"name": name, "arguments": arguments}
            },
            "finish_reason": "function_call"
        }]
    })))
}

/// Echoes its `value` argument back
struct Echo;

impl Tool for Echo {
    fn name(&self) -> &str {
        "echo"
    }
    fn description(&self) -> &str {
        "Echo a value"
    }
    fn parameters_schema(&self) -> Value {
        json!({"type": "object", "properties": {"value": {"type": "string"}}})
    }
    fn execute(&self, params: Value) -> BoxFuture<'_, Result<String, ToolError>> {
        Box::pin(async move { Ok(format!("echo: {}", params["value"].as_str().unwrap_or_default())) })
    }
}

/// Never finishes within any reasonable budget
struct Sleeper;

impl Tool for Sleeper {
    fn name(&self) -> &str {
        "sleeper"
    }
    fn description(&self) -> &str {
        "Sleeps for an hour"
    }
    fn parameters_schema(&self) -> Value {
        json!({"type": "object"})
    }
    fn execute(&self, _params: Value) -> BoxFuture<'_, Result<String, ToolError>> {
        Box::pin(async move {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok("done".to_string())
        })
    }
}

fn registry() -> Arc<ToolRegistry> {
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(WebSearch));
    registry.register(Arc::new(Echo));
    registry.register(Arc::new(Sleeper));
    Arc::new(registry)
}

fn agent_with(provider: Arc<ScriptedProvider>, settings: AgentSettings) -> Agent {
    Agent::new(provider, registry(), settings)
}

fn agent(provider: Arc<ScriptedProvider>) -> Agent {
    agent_with(provider, AgentSettings::default())
}

mod loop_tests {
    use super::*;

    #[tokio::test]
    async fn test_plain_answer() {
        let provider = ScriptedProvider::new(vec![text("Hello there!")]);
        let agent = agent(provider.clone());

        let reply = agent.process_query("Hi", "s1").await;
        assert_eq!(reply.response, "Hello there!");
        assert_eq!(reply.session_id, "s1");
        assert!(reply.tool_calls.is_empty());
        assert!(reply.request_id.starts_with("req_"));

        let status = agent.request_status(&reply.request_id).unwrap();
        assert_eq!(status.status, RequestState::Completed);
        assert_eq!(agent.memory().turn_count("s1"), 1);

        let requests = provider.requests();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].use_cache);
        assert_eq!(requests[0].timeout, Some(Duration::from_secs(120)));
        assert_eq!(requests[0].request_id.as_deref(), Some(reply.request_id.as_str()));
        assert_eq!(requests[0].messages[0].role, Role::System);
        assert_eq!(requests[0].messages.last().unwrap().content_text(), "Hi");

        let offered: Vec<String> = requests[0]
            .functions
            .as_ref()
            .unwrap()
            .iter()
            .map(|f| f.name.clone())
            .collect();
        assert_eq!(offered, vec!["echo", "sleeper", "web_search"]);
    }

    #[tokio::test]
    async fn test_weather_query_uses_web_search() {
        let provider = ScriptedProvider::new(vec![
            call(None, "web_search", r#"{"query": "weather today"}"#),
            text("It's sunny today with a high of 75°F."),
        ]);
        let agent = agent(provider.clone());

        let reply = agent.process_query("What's the weather today?", "s1").await;
        assert_eq!(reply.response, "It's sunny today with a high of 75°F.");
        assert_eq!(reply.tool_calls.len(), 1);
        assert_eq!(reply.tool_calls[0].tool, "web_search");
        assert_eq!(reply.tool_calls[0].args["query"], "weather today");
        assert!(reply.tool_calls[0].result.contains("sunny"));

        let requests = provider.requests();
        assert_eq!(requests.len(), 2);
        let followup = &requests[1];
        assert!(!followup.use_cache);
        assert_eq!(followup.timeout, Some(Duration::from_secs(90)));

        let n = followup.messages.len();
        let assistant = &followup.messages[n - 2];
        assert_eq!(assistant.role, Role::Assistant);
        assert_eq!(assistant.function_call.as_ref().unwrap().name, "web_search");
        let result = &followup.messages[n - 1];
        assert_eq!(result.role, Role::Function);
        assert_eq!(result.name.as_deref(), Some("web_search"));
        assert!(result.content_text().contains("sunny"));
    }

    #[tokio::test]
    async fn test_tool_calls_recorded_in_order() {
        let provider = ScriptedProvider::new(vec![
            call(None, "echo", r#"{"value": "first"}"#),
            call(None, "echo", r#"{"value": "second"}"#),
            text("Done."),
        ]);
        let agent = agent(provider);

        let reply = agent.process_query("Echo twice", "s1").await;
        let results: Vec<&str> = reply.tool_calls.iter().map(|c| c.result.as_str()).collect();
        assert_eq!(results, vec!["echo: first", "echo: second"]);
        assert_eq!(reply.response, "Done.");
    }

    #[tokio::test]
    async fn test_malformed_arguments_become_empty_map() {
        let provider = ScriptedProvider::new(vec![call(None, "web_search", "{not json")]);
        let agent = agent(provider.clone());

        let reply = agent.process_query("search something", "s1").await;
        assert_eq!(reply.tool_calls.len(), 1);
        assert!(reply.tool_calls[0].args.is_empty());
        assert!(reply.tool_calls[0].result.starts_with("Error: Tool 'web_search' failed with error:"));
        assert_eq!(reply.response, reply.tool_calls[0].result);
        // Tool errors are answered without another model round-trip
        assert_eq!(provider.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let provider = ScriptedProvider::new(vec![call(Some("Let me try."), "teleport", "{}")]);
        let agent = agent(provider);

        let reply = agent.process_query("Beam me up", "s1").await;
        assert_eq!(reply.response, "Let me try.\n\nError: Tool 'teleport' not found.");
        assert_eq!(
            agent.request_status(&reply.request_id).unwrap().status,
            RequestState::Completed
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_tool_timeout_still_answers() {
        let provider = ScriptedProvider::new(vec![call(Some("Let me check."), "sleeper", "{}")]);
        let agent = agent(provider);

        let reply = agent.process_query("Take your time", "s1").await;
        assert_eq!(reply.tool_calls.len(), 1);
        let result = &reply.tool_calls[0].result;
        assert!(result.starts_with("Error:"));
        assert!(result.contains("timed out"));
        assert!(reply.response.starts_with("Let me check.\n\nError: Tool 'sleeper' timed out."));
    }

    #[tokio::test]
    async fn test_depth_limit() {
        let settings = AgentSettings {
            max_tool_depth: 2,
            ..Default::default()
        };
        let provider = ScriptedProvider::new(vec![
            call(None, "echo", r#"{"value": "1"}"#),
            call(None, "echo", r#"{"value": "2"}"#),
            call(None, "echo", r#"{"value": "3"}"#),
        ]);
        let agent = agent_with(provider, settings);

        let reply = agent.process_query("Loop forever", "s1").await;
        assert_eq!(reply.tool_calls.len(), 2);
        assert_eq!(
            reply.response,
            "I stopped after 2 consecutive tool calls. Here's the latest result: echo: 2"
        );

        let status = agent.request_status(&reply.request_id).unwrap();
        assert_eq!(status.status, RequestState::Error);
        assert_eq!(status.error.as_deref(), Some("Tool call depth limit of 2 exceeded"));
    }
}

mod failure_tests {
    use super::*;

    #[tokio::test]
    async fn test_initial_failure_gives_degraded_text() {
        let provider = ScriptedProvider::new(vec![Step::Fail(ProviderError::RateLimited)]);
        let agent = agent(provider);

        let reply = agent.process_query("Hi", "s1").await;
        assert!(reply
            .response
            .starts_with("I encountered an error while processing your request: DeepSeek API rate limit exceeded."));
        assert!(reply.response.ends_with("Please try a simpler query or try again later."));

        let status = agent.request_status(&reply.request_id).unwrap();
        assert_eq!(status.status, RequestState::Error);
        assert_eq!(
            status.error.as_deref(),
            Some("DeepSeek API rate limit exceeded. Please try again later.")
        );
    }

    #[tokio::test]
    async fn test_initial_failure_stays_out_of_history() {
        let provider = ScriptedProvider::new(vec![Step::Fail(ProviderError::RateLimited), text("ok")]);
        let agent = agent(provider.clone());

        agent.process_query("Hi", "s1").await;
        assert_eq!(agent.memory().turn_count("s1"), 0);

        agent.process_query("Again", "s1").await;
        let last = provider.requests().pop().unwrap();
        let contents: Vec<&str> = last.messages.iter().skip(1).map(|m| m.content_text()).collect();
        assert_eq!(contents, vec!["Again"]);
        assert_eq!(agent.memory().turn_count("s1"), 1);
    }

    #[tokio::test]
    async fn test_followup_failure_keeps_tool_result() {
        let provider = ScriptedProvider::new(vec![
            call(Some("Checking."), "echo", r#"{"value": "found it"}"#),
            Step::Fail(ProviderError::Server { status: 502 }),
        ]);
        let agent = agent(provider);

        let reply = agent.process_query("Find it", "s1").await;
        assert_eq!(
            reply.response,
            "Checking.\n\nI encountered an error while processing the tool result. Here's what I found: echo: found it"
        );
        assert_eq!(reply.tool_calls.len(), 1);
        assert_eq!(
            agent.request_status(&reply.request_id).unwrap().status,
            RequestState::Error
        );
        assert_eq!(agent.memory().turn_count("s1"), 1);
    }
}

mod memory_tests {
    use super::*;

    #[tokio::test]
    async fn test_history_bounded_by_window() {
        let settings = AgentSettings {
            memory_window: 2,
            ..Default::default()
        };
        let provider = ScriptedProvider::new(vec![text("a0"), text("a1"), text("a2"), text("a3")]);
        let agent = agent_with(provider.clone(), settings);

        for i in 0..4 {
            agent.process_query(&format!("q{}", i), "s1").await;
        }

        let last = provider.requests().pop().unwrap();
        let contents: Vec<&str> = last.messages.iter().skip(1).map(|m| m.content_text()).collect();
        assert_eq!(contents, vec!["q1", "a1", "q2", "a2", "q3"]);
        assert_eq!(agent.memory().turn_count("s1"), 2);
    }

    #[tokio::test]
    async fn test_sessions_do_not_share_history() {
        let provider = ScriptedProvider::new(vec![text("first"), text("second")]);
        let agent = agent(provider.clone());

        agent.process_query("hello", "alice").await;
        agent.process_query("hello", "bob").await;

        let requests = provider.requests();
        assert_eq!(requests[1].messages.len(), 2);
    }

    #[tokio::test]
    async fn test_session_count_is_capped() {
        let settings = AgentSettings {
            max_sessions: 3,
            ..Default::default()
        };
        let steps = (0..10).map(|i| text(&format!("a{}", i))).collect();
        let agent = agent_with(ScriptedProvider::new(steps), settings);

        for i in 0..10 {
            agent.process_query("Hello", &format!("anon-{}", i)).await;
        }

        assert_eq!(agent.memory().session_count(), 3);
        assert_eq!(agent.memory().turn_count("anon-0"), 0);
        assert_eq!(agent.memory().turn_count("anon-9"), 1);
    }
}

mod request_tests {
    use super::*;

    #[tokio::test]
    async fn test_cancel_in_flight_query() {
        let provider = ScriptedProvider::new(vec![Step::Hang]);
        let agent = Arc::new(agent(provider.clone()));

        let pending = {
            let agent = agent.clone();
            tokio::spawn(async move { agent.process_query("Take forever", "s1").await })
        };

        let mut request_id = None;
        for _ in 0..500 {
            if let Some(request) = provider.requests().first() {
                request_id = request.request_id.clone();
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        let request_id = request_id.unwrap();
        assert_eq!(
            agent.request_status(&request_id).unwrap().status,
            RequestState::Processing
        );

        assert!(agent.cancel_request(&request_id));
        let reply = tokio::time::timeout(Duration::from_secs(5), pending)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(reply.response, "I apologize, but your request was cancelled. Please try again.");
        assert_eq!(reply.request_id, request_id);

        let status = agent.request_status(&request_id).unwrap();
        assert_eq!(status.status, RequestState::Cancelled);
        assert!(!agent.cancel_request(&request_id));
        assert_eq!(*provider.cancelled.lock().unwrap(), vec![request_id]);
        assert_eq!(agent.memory().turn_count("s1"), 0);
    }

    #[tokio::test]
    async fn test_finished_request_cannot_be_cancelled() {
        let provider = ScriptedProvider::new(vec![text("ok")]);
        let agent = agent(provider.clone());

        let reply = agent.process_query("Hi", "s1").await;
        assert!(!agent.cancel_request(&reply.request_id));
        assert!(provider.cancelled.lock().unwrap().is_empty());
        assert_eq!(
            agent.request_status(&reply.request_id).unwrap().status,
            RequestState::Completed
        );
    }

    #[tokio::test]
    async fn test_unknown_request() {
        let agent = agent(ScriptedProvider::new(vec![]));
        assert!(agent.request_status("req_0000000000").is_none());
        assert!(!agent.cancel_request("req_0000000000"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_aborted_query_is_cancelled_and_dropped() {
        let provider = ScriptedProvider::new(vec![Step::Hang]);
        let agent = Arc::new(agent(provider.clone()));

        let pending = {
            let agent = agent.clone();
            tokio::spawn(async move { agent.process_query("Take forever", "s1").await })
        };

        let mut request_id = None;
        for _ in 0..500 {
            if let Some(request) = provider.requests().first() {
                request_id = request.request_id.clone();
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        let request_id = request_id.unwrap();

        pending.abort();
        assert!(pending.await.unwrap_err().is_cancelled());

        let status = agent.request_status(&request_id).unwrap();
        assert_eq!(status.status, RequestState::Cancelled);
        assert!(!agent.cancel_request(&request_id));
        assert_eq!(agent.memory().turn_count("s1"), 0);

        tokio::time::sleep(Duration::from_secs(3600)).await;
        assert!(agent.request_status(&request_id).is_none());
        assert!(agent.requests().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_finished_records_are_dropped_later() {
        let provider = ScriptedProvider::new(vec![text("ok")]);
        let agent = agent(provider);

        let reply = agent.process_query("Hi", "s1").await;
        tokio::time::sleep(Duration::from_secs(299)).await;
        assert!(agent.request_status(&reply.request_id).is_some());

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(agent.request_status(&reply.request_id).is_none());
    }
}
