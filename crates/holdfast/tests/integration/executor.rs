/*
 *  Copyright 2025-2026 Colliery Software
 *
 *  Licensed under the Apache License, Version 2.0 (the "License");
 *  you may not use this file except in compliance with the License.
 *  You may obtain a copy of the License at
 *
 *      http://www.apache.org/licenses/LICENSE-2.0
 *
 *  Unless required by applicable law or agreed to in writing, software
 *  distributed under the License is distributed on an "AS IS" BASIS,
 *  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *  See the License for the specific language governing permissions and
 *  limitations under the License.
 */

//! Request processing: claiming, backend calls, retries and failures.

use holdfast::dispatcher::PollingDistributor;
use holdfast::executor::{ProcessOutcome, RequestProcessor};
use holdfast::queue::WorkQueue;
use holdfast::{BackendError, RequestStatus, RetryPolicy};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Barrier;

use crate::fixtures::{
    fresh_store, queued_request, received_request, CountingQueue, ScriptedBackend, TestStore,
};

fn processor(
    store: &TestStore,
    backend: Arc<ScriptedBackend>,
    max_attempts: i32,
    execution_timeout: Duration,
) -> (RequestProcessor, Arc<CountingQueue>) {
    let queue = Arc::new(CountingQueue::new(store.dal.clone()));
    let processor = RequestProcessor::new(
        store.dal.clone(),
        backend,
        queue.clone(),
        Arc::new(PollingDistributor::new()),
        max_attempts,
        execution_timeout,
        RetryPolicy::immediate(),
    );
    (processor, queue)
}

#[tokio::test]
async fn test_success_stores_result() {
    let store = fresh_store().await;
    let request = queued_request(&store.dal, "alice", "corr").await;
    let backend = Arc::new(ScriptedBackend::succeeding(b"{\"rows\":42}"));
    let (processor, _queue) = processor(&store, backend.clone(), 3, Duration::from_secs(5));

    assert_eq!(processor.process(request.id).await, ProcessOutcome::Succeeded);
    assert_eq!(backend.calls(), 1);

    let stored = store
        .dal
        .deferred_request()
        .get(request.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, RequestStatus::Succeeded);
    assert_eq!(stored.result.as_deref(), Some(&b"{\"rows\":42}"[..]));
    assert_eq!(stored.attempts, 1);
}

#[tokio::test]
async fn test_unclaimable_requests_are_skipped() {
    let store = fresh_store().await;
    let received = received_request(&store.dal, "alice", "corr").await;
    let backend = Arc::new(ScriptedBackend::succeeding(b"{}"));
    let (processor, _queue) = processor(&store, backend.clone(), 3, Duration::from_secs(5));

    assert_eq!(processor.process(received.id).await, ProcessOutcome::Skipped);
    assert_eq!(
        processor.process(holdfast::RequestId::new()).await,
        ProcessOutcome::Skipped
    );
    assert_eq!(backend.calls(), 0);
}

/// Duplicate deliveries processed at the same moment call the backend once.
#[tokio::test]
async fn test_duplicate_deliveries_execute_once() {
    let store = fresh_store().await;
    let request = queued_request(&store.dal, "alice", "corr").await;
    let backend = Arc::new(
        ScriptedBackend::succeeding(b"{}").with_delay(Duration::from_millis(100)),
    );
    let (processor, _queue) = processor(&store, backend.clone(), 3, Duration::from_secs(5));

    const NUM_WORKERS: usize = 4;
    let barrier = Arc::new(Barrier::new(NUM_WORKERS));
    let mut handles = Vec::new();
    for _ in 0..NUM_WORKERS {
        let processor = processor.clone();
        let barrier = barrier.clone();
        handles.push(tokio::spawn(async move {
            barrier.wait().await;
            processor.process(request.id).await
        }));
    }

    let mut outcomes = Vec::new();
    for handle in handles {
        outcomes.push(handle.await.unwrap());
    }

    assert_eq!(backend.calls(), 1, "backend must be called exactly once");
    assert_eq!(
        outcomes
            .iter()
            .filter(|o| **o == ProcessOutcome::Succeeded)
            .count(),
        1
    );
    assert_eq!(
        outcomes
            .iter()
            .filter(|o| **o == ProcessOutcome::Skipped)
            .count(),
        NUM_WORKERS - 1
    );
}

#[tokio::test]
async fn test_transient_failure_is_retried() {
    let store = fresh_store().await;
    let request = queued_request(&store.dal, "alice", "corr").await;
    let backend = Arc::new(
        ScriptedBackend::succeeding(b"{\"ok\":true}")
            .then(Err(BackendError::Retryable("503 from backend".to_string()))),
    );
    let (processor, queue) = processor(&store, backend.clone(), 3, Duration::from_secs(5));

    assert_eq!(
        processor.process(request.id).await,
        ProcessOutcome::RetryScheduled {
            delay: Duration::ZERO
        }
    );

    let requeued = store
        .dal
        .deferred_request()
        .get(request.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(requeued.status, RequestStatus::Queued);
    assert_eq!(requeued.attempts, 1);
    assert_eq!(requeued.last_error.as_deref(), Some("503 from backend"));
    assert_eq!(queue.enqueued(), 1);

    let delivery = queue.dequeue().await.unwrap().unwrap();
    assert_eq!(delivery.request_id, request.id);
    assert_eq!(processor.process(request.id).await, ProcessOutcome::Succeeded);
    assert_eq!(backend.calls(), 2);
}

#[tokio::test]
async fn test_retries_exhaust_into_failed() {
    let store = fresh_store().await;
    let request = queued_request(&store.dal, "alice", "corr").await;
    let backend = Arc::new(ScriptedBackend::always(BackendError::Retryable(
        "connection reset by peer".to_string(),
    )));
    let (processor, _queue) = processor(&store, backend.clone(), 3, Duration::from_secs(5));

    let mut outcomes = Vec::new();
    for _ in 0..3 {
        outcomes.push(processor.process(request.id).await);
    }
    assert!(matches!(outcomes[0], ProcessOutcome::RetryScheduled { .. }));
    assert!(matches!(outcomes[1], ProcessOutcome::RetryScheduled { .. }));
    assert_eq!(outcomes[2], ProcessOutcome::Exhausted);
    assert_eq!(backend.calls(), 3);

    let failed = store
        .dal
        .deferred_request()
        .get(request.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(failed.status, RequestStatus::Failed);
    assert_eq!(failed.attempts, 3);
    assert_eq!(
        failed.failure_reason.as_deref(),
        Some("connection reset by peer")
    );

    assert_eq!(processor.process(request.id).await, ProcessOutcome::Skipped);
    assert_eq!(backend.calls(), 3);
}

#[tokio::test]
async fn test_terminal_failure_is_not_retried() {
    let store = fresh_store().await;
    let request = queued_request(&store.dal, "alice", "corr").await;
    let backend = Arc::new(ScriptedBackend::always(BackendError::Terminal(
        "400 from backend: missing field".to_string(),
    )));
    let (processor, queue) = processor(&store, backend.clone(), 5, Duration::from_secs(5));

    assert_eq!(processor.process(request.id).await, ProcessOutcome::Failed);
    assert_eq!(backend.calls(), 1);
    assert_eq!(queue.enqueued(), 0);

    let failed = store
        .dal
        .deferred_request()
        .get(request.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(failed.status, RequestStatus::Failed);
    assert_eq!(
        failed.failure_reason.as_deref(),
        Some("400 from backend: missing field")
    );
}

#[tokio::test]
async fn test_timeout_counts_as_retryable() {
    let store = fresh_store().await;
    let request = queued_request(&store.dal, "alice", "corr").await;
    let backend = Arc::new(
        ScriptedBackend::succeeding(b"{}").with_delay(Duration::from_millis(500)),
    );
    let (processor, _queue) = processor(&store, backend.clone(), 3, Duration::from_millis(50));

    assert!(matches!(
        processor.process(request.id).await,
        ProcessOutcome::RetryScheduled { .. }
    ));

    let stored = store
        .dal
        .deferred_request()
        .get(request.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, RequestStatus::Queued);
    assert!(stored
        .last_error
        .as_deref()
        .unwrap_or_default()
        .contains("timed out"));
}
