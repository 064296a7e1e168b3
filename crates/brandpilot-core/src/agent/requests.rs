//! Tracking of in-flight agent requests
//!
//! Each query gets a record that starts out `processing` and moves to exactly
//! one terminal state. Records linger for a grace period after finishing so
//! clients can still poll their status.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Lifecycle state of a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestState {
    Processing,
    Completed,
    Cancelled,
    Error,
}

impl RequestState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, RequestState::Processing)
    }
}

/// Point-in-time view of a request, as reported to clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestStatus {
    pub status: RequestState,
    pub request_id: String,
    pub session_id: String,
    /// Unix timestamp in seconds
    pub start_time: f64,
    /// Seconds since the request started
    pub elapsed_time: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

struct RequestRecord {
    session_id: String,
    started_at: DateTime<Utc>,
    started: Instant,
    state: RequestState,
    error: Option<String>,
    cancel: CancellationToken,
}

/// Shared table of request records keyed by request id
#[derive(Default)]
pub struct RequestStore {
    records: Mutex<HashMap<String, RequestRecord>>,
}

impl RequestStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fresh request id: `req_` followed by 10 hex characters
    pub fn new_request_id() -> String {
        let id = uuid::Uuid::new_v4().simple().to_string();
        format!("req_{}", &id[..10])
    }

    /// Create a `processing` record under a new unique id
    pub fn register(&self, session_id: &str) -> (String, CancellationToken) {
        let mut records = self.records.lock();
        let mut request_id = Self::new_request_id();
        while records.contains_key(&request_id) {
            request_id = Self::new_request_id();
        }

        let cancel = CancellationToken::new();
        records.insert(
            request_id.clone(),
            RequestRecord {
                session_id: session_id.to_string(),
                started_at: Utc::now(),
                started: Instant::now(),
                state: RequestState::Processing,
                error: None,
                cancel: cancel.clone(),
            },
        );
        (request_id, cancel)
    }

    /// Move a processing request to a terminal state
    ///
    /// Returns false if the request is unknown or already finished.
    pub fn finish(&self, request_id: &str, state: RequestState, error: Option<String>) -> bool {
        let mut records = self.records.lock();
        match records.get_mut(request_id) {
            Some(record) if record.state == RequestState::Processing && state.is_terminal() => {
                record.state = state;
                record.error = error;
                true
            }
            _ => false,
        }
    }

    /// Mark a processing request cancelled and fire its token
    pub fn cancel(&self, request_id: &str) -> bool {
        let mut records = self.records.lock();
        match records.get_mut(request_id) {
            Some(record) if record.state == RequestState::Processing => {
                record.state = RequestState::Cancelled;
                record.cancel.cancel();
                true
            }
            _ => false,
        }
    }

    pub fn status(&self, request_id: &str) -> Option<RequestStatus> {
        let records = self.records.lock();
        let record = records.get(request_id)?;
        Some(RequestStatus {
            status: record.state,
            request_id: request_id.to_string(),
            session_id: record.session_id.clone(),
            start_time: record.started_at.timestamp_millis() as f64 / 1000.0,
            elapsed_time: record.started.elapsed().as_secs_f64(),
            error: record.error.clone(),
        })
    }

    pub fn remove(&self, request_id: &str) -> bool {
        self.records.lock().remove(request_id).is_some()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    /// Drop the record after `delay` without blocking the caller
    ///
    /// Outside a runtime there is nothing to sleep on, so the record goes at once.
    pub fn schedule_removal(self: &Arc<Self>, request_id: &str, delay: Duration) {
        let Ok(runtime) = Handle::try_current() else {
            self.remove(request_id);
            return;
        };
        let store = Arc::clone(self);
        let request_id = request_id.to_string();
        runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            if store.remove(&request_id) {
                debug!(request_id = %request_id, "Dropped finished request record");
            }
        });
    }

    /// Guard that settles the record when the owning query goes away
    pub fn guard(self: &Arc<Self>, request_id: &str, cleanup_delay: Duration) -> RequestGuard {
        RequestGuard {
            store: Arc::clone(self),
            request_id: request_id.to_string(),
            cleanup_delay,
        }
    }
}

/// Settles one request record on drop
///
/// A record still `processing` when the guard drops belongs to a query whose
/// future was dropped or aborted; it becomes `cancelled`. Removal is scheduled
/// either way.
pub struct RequestGuard {
    store: Arc<RequestStore>,
    request_id: String,
    cleanup_delay: Duration,
}

impl Drop for RequestGuard {
    fn drop(&mut self) {
        if self.store.finish(&self.request_id, RequestState::Cancelled, None) {
            info!(request_id = %self.request_id, "Request dropped before finishing");
        }
        self.store.schedule_removal(&self.request_id, self.cleanup_delay);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_id_format() {
        let id = RequestStore::new_request_id();
        assert!(id.starts_with("req_"));
        assert_eq!(id.len(), 14);
        assert!(id[4..].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_terminal_state_is_final() {
        let store = RequestStore::new();
        let (id, _) = store.register("s1");
        assert_eq!(store.status(&id).unwrap().status, RequestState::Processing);

        assert!(store.finish(&id, RequestState::Completed, None));
        assert!(!store.finish(&id, RequestState::Error, Some("late".into())));
        assert!(!store.cancel(&id));

        let status = store.status(&id).unwrap();
        assert_eq!(status.status, RequestState::Completed);
        assert_eq!(status.error, None);
    }

    #[test]
    fn test_cancel_fires_token() {
        let store = RequestStore::new();
        let (id, token) = store.register("s1");
        assert!(store.cancel(&id));
        assert!(token.is_cancelled());
        assert!(!store.finish(&id, RequestState::Completed, None));
        assert_eq!(store.status(&id).unwrap().status, RequestState::Cancelled);
    }

    #[test]
    fn test_unknown_request() {
        let store = RequestStore::new();
        assert!(store.status("req_missing").is_none());
        assert!(!store.cancel("req_missing"));
    }

    #[test]
    fn test_status_serialization() {
        let store = RequestStore::new();
        let (id, _) = store.register("s1");
        let value = serde_json::to_value(store.status(&id).unwrap()).unwrap();
        assert_eq!(value["status"], "processing");
        assert_eq!(value["session_id"], "s1");
        assert!(value.get("error").is_none());
        assert!(value["start_time"].as_f64().unwrap() > 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_guard_cancels_unfinished_record() {
        let store = Arc::new(RequestStore::new());
        let (id, _) = store.register("s1");
        drop(store.guard(&id, Duration::from_secs(300)));

        assert_eq!(store.status(&id).unwrap().status, RequestState::Cancelled);
        tokio::time::sleep(Duration::from_secs(301)).await;
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_guard_keeps_terminal_state() {
        let store = Arc::new(RequestStore::new());
        let (id, _) = store.register("s1");
        let guard = store.guard(&id, Duration::from_secs(300));
        store.finish(&id, RequestState::Completed, None);
        drop(guard);
        assert_eq!(store.status(&id).unwrap().status, RequestState::Completed);
    }

    #[test]
    fn test_removal_without_runtime_is_immediate() {
        let store = Arc::new(RequestStore::new());
        let (id, _) = store.register("s1");
        drop(store.guard(&id, Duration::from_secs(300)));
        assert!(store.status(&id).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_scheduled_removal() {
        let store = Arc::new(RequestStore::new());
        let (id, _) = store.register("s1");
        store.finish(&id, RequestState::Completed, None);
        store.schedule_removal(&id, Duration::from_secs(300));

        tokio::time::sleep(Duration::from_secs(299)).await;
        assert!(store.status(&id).is_some());
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(store.status(&id).is_none());
    }
}
