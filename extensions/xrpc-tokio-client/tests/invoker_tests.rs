use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use xrpc::wire::{RpcRequest, RpcResponse};
use xrpc_tokio_client::{
    ClientError, FailFastInvoker, FaultTolerantInvoker, RequestSender, RetryInvoker,
};

/// Fails the first `failures` sends, succeeds afterwards, and records every
/// address it was handed.
struct FlakySender {
    failures: u32,
    calls: AtomicU32,
    addresses: Mutex<Vec<String>>,
}

impl FlakySender {
    fn new(failures: u32) -> Self {
        FlakySender {
            failures,
            calls: AtomicU32::new(0),
            addresses: Mutex::new(Vec::new()),
        }
    }

    fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RequestSender for FlakySender {
    async fn send(&self, address: &str, request: &RpcRequest) -> Result<RpcResponse, ClientError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        self.addresses.lock().unwrap().push(address.to_string());
        if call < self.failures {
            Err(ClientError::ConnectionClosed)
        } else {
            Ok(RpcResponse::success(request.request_id.clone(), None))
        }
    }
}

fn sample_request() -> RpcRequest {
    RpcRequest {
        request_id: "req-1".into(),
        service_name: "demo".into(),
        service_version: "1.0".into(),
        method_name: "run".into(),
        param_types: vec![],
        params: vec![],
    }
}

#[tokio::test]
async fn fail_fast_makes_exactly_one_attempt() {
    let sender = FlakySender::new(1);
    let outcome = FailFastInvoker
        .invoke(&sender, "10.0.0.1:9000", &sample_request())
        .await;
    assert!(matches!(outcome, Err(ClientError::ConnectionClosed)));
    assert_eq!(sender.call_count(), 1);
}

#[tokio::test]
async fn fail_fast_passes_a_success_through() {
    let sender = FlakySender::new(0);
    let response = FailFastInvoker
        .invoke(&sender, "10.0.0.1:9000", &sample_request())
        .await
        .unwrap();
    assert!(response.is_success());
    assert_eq!(sender.call_count(), 1);
}

#[tokio::test]
async fn retry_recovers_within_the_attempt_budget() {
    let sender = FlakySender::new(2);
    let response = RetryInvoker::new(3)
        .invoke(&sender, "10.0.0.1:9000", &sample_request())
        .await
        .unwrap();
    assert!(response.is_success());
    assert_eq!(sender.call_count(), 3);
}

#[tokio::test]
async fn retry_exhausts_after_exactly_the_configured_attempts() {
    let sender = FlakySender::new(u32::MAX);
    let outcome = RetryInvoker::new(3)
        .invoke(&sender, "10.0.0.1:9000", &sample_request())
        .await;
    match outcome {
        Err(ClientError::InvocationFailed { attempts }) => assert_eq!(attempts, 3),
        other => panic!("expected InvocationFailed, got {other:?}"),
    }
    assert_eq!(sender.call_count(), 3);
}

#[tokio::test]
async fn retry_sticks_to_the_selected_address() {
    let sender = FlakySender::new(u32::MAX);
    let _ = RetryInvoker::new(4)
        .invoke(&sender, "10.0.0.7:9000", &sample_request())
        .await;
    let addresses = sender.addresses.lock().unwrap();
    assert_eq!(addresses.len(), 4);
    assert!(addresses.iter().all(|a| a == "10.0.0.7:9000"));
}

#[tokio::test]
async fn zero_attempts_is_clamped_to_one() {
    let sender = FlakySender::new(u32::MAX);
    let _ = RetryInvoker::new(0)
        .invoke(&sender, "10.0.0.1:9000", &sample_request())
        .await;
    assert_eq!(sender.call_count(), 1);
}
