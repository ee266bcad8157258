//! Scripted pairing transport

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Value, json};

use crate::error::{ConnectError, Result};
use crate::protocol::{PairingRequest, PairingResponse, PairingTransport};

/// Fingerprint every scripted response presents unless overridden
pub const MOCK_FINGERPRINT: &str =
    "9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08";

/// Response body with `STATUS.RESULT` set
#[must_use]
pub fn status_body(result: &str) -> Value {
    json!({ "STATUS": { "RESULT": result } })
}

/// Response body with a status and one `ITEM` field
#[must_use]
pub fn item_body(result: &str, field: &str, value: Value) -> Value {
    json!({
        "STATUS": { "RESULT": result },
        "ITEM": { field: value },
    })
}

#[derive(Default)]
struct State {
    responses: HashMap<&'static str, VecDeque<Result<PairingResponse>>>,
    requests: Vec<PairingRequest>,
    delay: Option<Duration>,
}

/// Transport answering from per-path queues of scripted responses
///
/// A request to a path with an empty queue fails with a transport error.
#[derive(Default)]
pub struct MockTransport {
    state: Mutex<State>,
}

impl MockTransport {
    /// Transport with nothing scripted
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a `200 OK` body for `path`
    pub fn respond(&self, path: &'static str, body: Value) {
        self.respond_with(
            path,
            Ok(PairingResponse {
                body,
                peer_fingerprint: Some(MOCK_FINGERPRINT.to_string()),
            }),
        );
    }

    /// Queue an arbitrary outcome for `path`
    pub fn respond_with(&self, path: &'static str, response: Result<PairingResponse>) {
        self.state
            .lock()
            .responses
            .entry(path)
            .or_default()
            .push_back(response);
    }

    /// Queue a failure for `path`
    pub fn fail(&self, path: &'static str, error: ConnectError) {
        self.respond_with(path, Err(error));
    }

    /// Delay every response
    pub fn set_delay(&self, delay: Duration) {
        self.state.lock().delay = Some(delay);
    }

    /// Every request so far
    #[must_use]
    pub fn requests(&self) -> Vec<PairingRequest> {
        self.state.lock().requests.clone()
    }

    /// Requests sent to `path`
    #[must_use]
    pub fn requests_to(&self, path: &str) -> Vec<PairingRequest> {
        self.state
            .lock()
            .requests
            .iter()
            .filter(|r| r.path == path)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl PairingTransport for MockTransport {
    async fn put(&self, request: PairingRequest) -> Result<PairingResponse> {
        let path = request.path;
        let delay = {
            let mut state = self.state.lock();
            state.requests.push(request);
            state.delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        self.state
            .lock()
            .responses
            .get_mut(path)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| {
                Err(ConnectError::transport(format!(
                    "no scripted response for {path}"
                )))
            })
    }
}
