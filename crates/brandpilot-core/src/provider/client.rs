//! HTTP client for the chat-completions endpoint

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};

use super::logging::{log_interaction, Interaction};
use super::mock::mock_response;
use super::{cache_key, CompletionProvider, CompletionRequest, CompletionResponse};
use crate::cache::SessionCache;
use crate::config::ProviderConfig;
use crate::error::{ProviderError, TimeoutPhase};

/// Lower bound of the body-read budget
const MIN_READ_TIMEOUT: Duration = Duration::from_secs(10);

/// Body-read budget for a given request budget: half of it, at least 10s
pub fn read_budget(timeout: Duration) -> Duration {
    (timeout / 2).max(MIN_READ_TIMEOUT)
}

/// In-flight calls by request id; the sequence number tells apart
/// successive calls made under the same id
type ActiveRequests = Arc<Mutex<HashMap<String, (u64, AbortHandle)>>>;

/// Removes an in-flight entry and aborts its task when the call ends,
/// including when the caller's future is dropped
struct ActiveGuard {
    active: ActiveRequests,
    request_id: String,
    seq: u64,
    abort: AbortHandle,
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        {
            let mut active = self.active.lock();
            if active.get(&self.request_id).is_some_and(|(seq, _)| *seq == self.seq) {
                active.remove(&self.request_id);
            }
        }
        self.abort.abort();
    }
}

/// Chat-completion client with caching, timeouts and cancellation
pub struct UpstreamClient {
    http: reqwest::Client,
    config: ProviderConfig,
    api_key: Option<String>,
    mock: bool,
    cache: Arc<SessionCache>,
    active: ActiveRequests,
    next_seq: AtomicU64,
}

impl UpstreamClient {
    pub fn new(config: ProviderConfig, cache: Arc<SessionCache>) -> Result<Self, ProviderError> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| ProviderError::Transport(format!("Failed to create HTTP client: {}", e)))?;

        let mock = config.is_mock();
        if mock {
            warn!("No usable API key configured, upstream client running in mock mode");
        } else {
            info!(model = %config.model, base_url = %config.base_url, "Upstream client ready");
        }

        Ok(Self {
            http,
            api_key: config.get_api_key(),
            mock,
            config,
            cache,
            active: Arc::new(Mutex::new(HashMap::new())),
            next_seq: AtomicU64::new(0),
        })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// Number of network calls currently registered for cancellation
    pub fn active_request_count(&self) -> usize {
        self.active.lock().len()
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }

    fn build_payload(&self, request: &CompletionRequest) -> Value {
        let mut payload = json!({
            "model": self.config.model,
            "messages": request.messages,
            "temperature": request.temperature,
            "max_tokens": request.max_tokens,
        });
        if let Some(functions) = &request.functions {
            payload["functions"] = json!(functions);
        }
        payload
    }

    async fn cached(&self, key: &str) -> Option<CompletionResponse> {
        let raw = self.cache.get(key).await?;
        match serde_json::from_str::<Value>(&raw) {
            Ok(value) => Some(CompletionResponse::new(value)),
            Err(e) => {
                warn!(error = %e, "Discarding undecodable cache entry");
                None
            }
        }
    }

    async fn call_network(
        &self,
        request: &CompletionRequest,
        request_id: &str,
    ) -> Result<CompletionResponse, ProviderError> {
        let timeout = request.timeout.unwrap_or_else(|| self.config.request_timeout());
        let builder = self.http.post(self.endpoint()).json(&self.build_payload(request));
        let builder = match &self.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        };

        let task = tokio::spawn(send(builder, timeout));
        let abort = task.abort_handle();
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        self.active
            .lock()
            .insert(request_id.to_string(), (seq, abort.clone()));
        let _guard = ActiveGuard {
            active: self.active.clone(),
            request_id: request_id.to_string(),
            seq,
            abort,
        };

        match task.await {
            Ok(result) => result,
            Err(e) if e.is_cancelled() => Err(ProviderError::Cancelled),
            Err(e) => Err(ProviderError::Transport(format!("Request task failed: {}", e))),
        }
    }
}

async fn send(
    builder: reqwest::RequestBuilder,
    timeout: Duration,
) -> Result<CompletionResponse, ProviderError> {
    let read_timeout = read_budget(timeout);

    let response = tokio::time::timeout(timeout, builder.send())
        .await
        .map_err(|_| ProviderError::Timeout {
            phase: TimeoutPhase::Request,
            seconds: timeout.as_secs(),
        })?
        .map_err(|e| ProviderError::Transport(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        let body = match tokio::time::timeout(read_timeout, response.text()).await {
            Ok(Ok(body)) => body,
            _ => String::new(),
        };
        return Err(ProviderError::from_status(status.as_u16(), body));
    }

    let body = tokio::time::timeout(read_timeout, response.bytes())
        .await
        .map_err(|_| ProviderError::Timeout {
            phase: TimeoutPhase::Read,
            seconds: read_timeout.as_secs(),
        })?
        .map_err(|e| ProviderError::Transport(e.to_string()))?;

    let value: Value =
        serde_json::from_slice(&body).map_err(|e| ProviderError::Decode(e.to_string()))?;
    Ok(CompletionResponse::new(value))
}

#[async_trait]
impl CompletionProvider for UpstreamClient {
    async fn generate_completion(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionResponse, ProviderError> {
        let started = Instant::now();

        if self.mock {
            if self.config.mock_latency_ms > 0 {
                tokio::time::sleep(Duration::from_millis(self.config.mock_latency_ms)).await;
            }
            let response = mock_response(&request, &self.config.model);
            log_interaction(Interaction {
                model: &self.config.model,
                request_id: request.request_id.as_deref(),
                request: &request,
                cache_hit: false,
                mock: true,
                outcome: Ok(&response),
                elapsed: started.elapsed(),
            });
            return Ok(response);
        }

        let key = cache_key(&self.config.model, &request.messages);
        if request.use_cache {
            if let Some(response) = self.cached(&key).await {
                debug!(key = %key, "Completion cache hit");
                log_interaction(Interaction {
                    model: &self.config.model,
                    request_id: request.request_id.as_deref(),
                    request: &request,
                    cache_hit: true,
                    mock: false,
                    outcome: Ok(&response),
                    elapsed: started.elapsed(),
                });
                return Ok(response);
            }
            debug!(key = %key, "Completion cache miss");
        }

        let request_id = request
            .request_id
            .clone()
            .unwrap_or_else(|| format!("upstream_{}", uuid::Uuid::new_v4().simple()));

        let result = self.call_network(&request, &request_id).await;

        log_interaction(Interaction {
            model: &self.config.model,
            request_id: Some(&request_id),
            request: &request,
            cache_hit: false,
            mock: false,
            outcome: result.as_ref(),
            elapsed: started.elapsed(),
        });

        match &result {
            Ok(response) if request.use_cache => {
                self.cache
                    .set(&key, &response.raw().to_string(), Some(self.config.cache_ttl()))
                    .await;
            }
            Ok(_) => {}
            Err(e) => warn!(request_id = %request_id, error = %e, "Upstream call failed"),
        }

        result
    }

    fn cancel_request(&self, request_id: &str) -> bool {
        match self.active.lock().remove(request_id) {
            Some((_, handle)) => {
                handle.abort();
                info!(request_id = %request_id, "Cancelled upstream request");
                true
            }
            None => false,
        }
    }

    fn is_mock(&self) -> bool {
        self.mock
    }
}
