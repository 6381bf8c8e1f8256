//! Mock control plane for testing.
//!
//! Allows scripting call outcomes and capturing sent requests for
//! verification.

use super::{CallResult, ControlPlane, HeartbeatRequest, RegisterRequest};
use crate::error::ControlPlaneError;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Mock control plane for testing.
///
/// Scripted results are consumed in call order; once a script is empty the
/// default result is returned. By default every call succeeds in 1ms and the
/// listing echoes every relay that has registered so far.
#[derive(Debug, Clone, Default)]
pub struct MockControlPlane {
    inner: Arc<Mutex<MockInner>>,
}

#[derive(Debug, Default)]
struct MockInner {
    register_script: VecDeque<CallResult>,
    register_default: Option<CallResult>,
    heartbeat_script: VecDeque<CallResult>,
    heartbeat_default: Option<CallResult>,
    listing: Option<Result<Vec<serde_json::Value>, u16>>,
    registrations: Vec<RegisterRequest>,
    heartbeats: Vec<HeartbeatRequest>,
    list_calls: usize,
}

const DEFAULT_RESULT: CallResult = CallResult {
    ok: true,
    elapsed_ms: 1.0,
    status: 200,
};

impl MockControlPlane {
    /// Create a new mock control plane.
    pub fn new() -> Self {
        Self::default()
    }

    fn inner(&self) -> MutexGuard<'_, MockInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue results for the next register calls, in order.
    pub fn script_registers(&self, results: impl IntoIterator<Item = CallResult>) {
        self.inner().register_script.extend(results);
    }

    /// Result returned once the register script is exhausted.
    pub fn set_register_default(&self, result: CallResult) {
        self.inner().register_default = Some(result);
    }

    /// Queue results for the next heartbeat calls, in order.
    pub fn script_heartbeats(&self, results: impl IntoIterator<Item = CallResult>) {
        self.inner().heartbeat_script.extend(results);
    }

    /// Result returned once the heartbeat script is exhausted.
    pub fn set_heartbeat_default(&self, result: CallResult) {
        self.inner().heartbeat_default = Some(result);
    }

    /// Return these entries from the listing instead of echoing registrations.
    pub fn set_listing(&self, entries: Vec<serde_json::Value>) {
        self.inner().listing = Some(Ok(entries));
    }

    /// Make the listing fail with the given HTTP status.
    pub fn fail_listing(&self, status: u16) {
        self.inner().listing = Some(Err(status));
    }

    /// Every registration request received.
    pub fn registrations(&self) -> Vec<RegisterRequest> {
        self.inner().registrations.clone()
    }

    /// Every heartbeat request received.
    pub fn heartbeats(&self) -> Vec<HeartbeatRequest> {
        self.inner().heartbeats.clone()
    }

    /// How many times the listing was requested.
    pub fn list_calls(&self) -> usize {
        self.inner().list_calls
    }
}

#[async_trait]
impl ControlPlane for MockControlPlane {
    async fn register(&self, request: RegisterRequest) -> CallResult {
        let mut inner = self.inner();
        inner.registrations.push(request);
        inner
            .register_script
            .pop_front()
            .or(inner.register_default)
            .unwrap_or(DEFAULT_RESULT)
    }

    async fn heartbeat(&self, request: HeartbeatRequest) -> CallResult {
        let mut inner = self.inner();
        inner.heartbeats.push(request);
        inner
            .heartbeat_script
            .pop_front()
            .or(inner.heartbeat_default)
            .unwrap_or(DEFAULT_RESULT)
    }

    async fn list_relays(&self) -> Result<Vec<serde_json::Value>, ControlPlaneError> {
        let mut inner = self.inner();
        inner.list_calls += 1;
        match &inner.listing {
            Some(Ok(entries)) => Ok(entries.clone()),
            Some(Err(status)) => Err(ControlPlaneError::Status(*status)),
            None => Ok(inner
                .registrations
                .iter()
                .map(|r| serde_json::json!({ "relay_id": r.relay_id }))
                .collect()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn register(id: &str) -> RegisterRequest {
        RegisterRequest::synthetic(id, "10.1.1.1:20000".into())
    }

    #[tokio::test]
    async fn defaults_succeed_and_echo_registrations() {
        let mock = MockControlPlane::new();
        let result = mock.register(register("a")).await;
        assert!(result.ok);

        let listing = mock.list_relays().await.unwrap();
        assert_eq!(listing, vec![serde_json::json!({ "relay_id": "a" })]);
        assert_eq!(mock.list_calls(), 1);
    }

    #[tokio::test]
    async fn script_consumed_before_default() {
        let mock = MockControlPlane::new();
        mock.script_heartbeats([CallResult::from_status(503, 9.0)]);
        mock.set_heartbeat_default(CallResult::from_status(202, 2.0));

        let hb = || HeartbeatRequest {
            relay_id: "a".into(),
            load_pct: 5.0,
        };
        assert_eq!(mock.heartbeat(hb()).await.status, 503);
        assert_eq!(mock.heartbeat(hb()).await.status, 202);
        assert_eq!(mock.heartbeat(hb()).await.status, 202);
        assert_eq!(mock.heartbeats().len(), 3);
    }

    #[tokio::test]
    async fn listing_can_fail() {
        let mock = MockControlPlane::new();
        mock.fail_listing(503);
        let err = mock.list_relays().await.unwrap_err();
        assert!(matches!(err, ControlPlaneError::Status(503)));
    }
}
