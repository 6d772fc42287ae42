use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::sync::oneshot;
use tracing::{debug, warn};
use xrpc::wire::RpcResponse;

use crate::ClientError;

/// Invoked once with the call's outcome, on a worker task rather than the
/// connection's reader task.
pub type ResponseCallback = Box<dyn FnOnce(Result<RpcResponse, ClientError>) + Send + 'static>;

enum Completer {
    Waiter(oneshot::Sender<RpcResponse>),
    Callback(ResponseCallback),
}

struct PendingCall {
    completer: Completer,
    created_at: Instant,
}

/// Outstanding calls awaiting their correlated responses, keyed by the
/// logical request id.
///
/// Each entry is removed exactly once, by whichever of {response arrival,
/// timeout expiry} happens first; the loser finds the id gone and becomes a
/// no-op. A response for an unknown id (for instance one that already timed
/// out) is logged and dropped, never an error.
pub struct PendingCallTable {
    calls: Mutex<HashMap<String, PendingCall>>,
}

impl PendingCallTable {
    pub fn new() -> Self {
        PendingCallTable {
            calls: Mutex::new(HashMap::new()),
        }
    }

    /// Registers a blocking-wait call and hands back the receiver its
    /// response will arrive on.
    pub fn register(&self, request_id: &str) -> oneshot::Receiver<RpcResponse> {
        let (tx, rx) = oneshot::channel();
        let mut calls = self.calls.lock().unwrap_or_else(|e| e.into_inner());
        calls.insert(
            request_id.to_string(),
            PendingCall {
                completer: Completer::Waiter(tx),
                created_at: Instant::now(),
            },
        );
        rx
    }

    /// Registers a callback-style call. The callback fires off the reader
    /// task once the response arrives or the timeout expires.
    pub fn register_callback(&self, request_id: &str, callback: ResponseCallback) {
        let mut calls = self.calls.lock().unwrap_or_else(|e| e.into_inner());
        calls.insert(
            request_id.to_string(),
            PendingCall {
                completer: Completer::Callback(callback),
                created_at: Instant::now(),
            },
        );
    }

    /// Spawns the timeout enforcement for a callback registration. When the
    /// deadline passes first, the callback fires with a timeout error.
    pub fn enforce_timeout(self: &Arc<Self>, request_id: &str, timeout: Duration) {
        let table = self.clone();
        let request_id = request_id.to_string();
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            let expired = {
                let mut calls = table.calls.lock().unwrap_or_else(|e| e.into_inner());
                calls.remove(&request_id)
            };
            if let Some(call) = expired {
                if let Completer::Callback(callback) = call.completer {
                    callback(Err(ClientError::CallTimeout {
                        request_id: request_id.clone(),
                    }));
                }
            }
        });
    }

    /// Resolves the matching outstanding call, if it is still outstanding.
    /// Called from the connection's reader path; callbacks are dispatched
    /// on a spawned worker task so a slow callback cannot stall frame
    /// processing for other in-flight calls on the same connection.
    pub fn complete(&self, response: RpcResponse) {
        let call = {
            let mut calls = self.calls.lock().unwrap_or_else(|e| e.into_inner());
            calls.remove(&response.request_id)
        };
        match call {
            Some(call) => {
                debug!(
                    request_id = %response.request_id,
                    elapsed_ms = call.created_at.elapsed().as_millis() as u64,
                    "completing pending call"
                );
                match call.completer {
                    Completer::Waiter(tx) => {
                        // The waiter may have given up between our remove and
                        // this send; that is its timeout to report.
                        let _ = tx.send(response);
                    }
                    Completer::Callback(callback) => {
                        tokio::spawn(async move { callback(Ok(response)) });
                    }
                }
            }
            None => {
                warn!(
                    request_id = %response.request_id,
                    "response for unknown or expired request id dropped"
                );
            }
        }
    }

    /// Withdraws a registration. Returns false when a racing `complete`
    /// already removed it.
    pub fn discard(&self, request_id: &str) -> bool {
        let mut calls = self.calls.lock().unwrap_or_else(|e| e.into_inner());
        calls.remove(request_id).is_some()
    }

    pub fn len(&self) -> usize {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Waits for the registered response, enforcing the per-call timeout.
    /// Exactly-once removal: when the timeout fires first the entry is
    /// withdrawn; when withdrawal loses the race to `complete`, the
    /// already-sent response is delivered instead of a timeout error.
    pub async fn await_response(
        &self,
        request_id: &str,
        mut rx: oneshot::Receiver<RpcResponse>,
        timeout: Duration,
    ) -> Result<RpcResponse, ClientError> {
        tokio::select! {
            outcome = &mut rx => outcome.map_err(|_| ClientError::ConnectionClosed),
            _ = tokio::time::sleep(timeout) => {
                if self.discard(request_id) {
                    Err(ClientError::CallTimeout {
                        request_id: request_id.to_string(),
                    })
                } else {
                    // complete() won the race; the response is in the channel.
                    rx.await.map_err(|_| ClientError::ConnectionClosed)
                }
            }
        }
    }
}

impl Default for PendingCallTable {
    fn default() -> Self {
        Self::new()
    }
}
