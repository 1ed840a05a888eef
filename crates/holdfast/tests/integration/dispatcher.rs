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

//! Completion signal handling.

use holdfast::config::ReconcilerConfig;
use holdfast::dispatcher::{Dispatcher, PollingDistributor};
use holdfast::queue::WorkQueue;
use holdfast::reconciler::Reconciler;
use holdfast::{EngineError, RequestStatus, SignalOutcome};
use std::sync::Arc;
use std::time::Duration;

use crate::fixtures::{fresh_store, received_request, CountingQueue, TestStore};

fn dispatcher(store: &TestStore) -> (Dispatcher, Arc<CountingQueue>) {
    let queue = Arc::new(CountingQueue::new(store.dal.clone()));
    let dispatcher = Dispatcher::new(
        store.dal.clone(),
        queue.clone(),
        Arc::new(PollingDistributor::new()),
    );
    (dispatcher, queue)
}

#[tokio::test]
async fn test_completion_queues_request_once() {
    let store = fresh_store().await;
    let request = received_request(&store.dal, "alice", "corr").await;
    let (dispatcher, queue) = dispatcher(&store);

    let first = dispatcher.on_upload_complete("corr").await.unwrap();
    assert_eq!(first, SignalOutcome::Queued(request.id));

    let second = dispatcher.on_upload_complete("corr").await.unwrap();
    assert_eq!(
        second,
        SignalOutcome::AlreadyProgressed {
            request_id: request.id,
            status: RequestStatus::Queued,
        }
    );

    assert_eq!(queue.enqueued(), 1);
    assert_eq!(queue.pending().await.unwrap(), 1);
}

#[tokio::test]
async fn test_concurrent_duplicate_signals_enqueue_once() {
    let store = fresh_store().await;
    received_request(&store.dal, "alice", "corr").await;
    let (dispatcher, queue) = dispatcher(&store);

    let mut handles = Vec::new();
    for _ in 0..5 {
        let dispatcher = dispatcher.clone();
        handles.push(tokio::spawn(async move {
            dispatcher.on_upload_complete("corr").await.unwrap()
        }));
    }

    let mut queued = 0;
    for handle in handles {
        if matches!(handle.await.unwrap(), SignalOutcome::Queued(_)) {
            queued += 1;
        }
    }

    assert_eq!(queued, 1);
    assert_eq!(queue.enqueued(), 1);
}

#[tokio::test]
async fn test_progress_then_complete() {
    let store = fresh_store().await;
    let request = received_request(&store.dal, "alice", "corr").await;
    let (dispatcher, _queue) = dispatcher(&store);

    assert_eq!(
        dispatcher.on_upload_progress("corr").await.unwrap(),
        SignalOutcome::ProgressRecorded(request.id)
    );
    assert_eq!(
        dispatcher.on_upload_progress("corr").await.unwrap(),
        SignalOutcome::AlreadyProgressed {
            request_id: request.id,
            status: RequestStatus::UploadInProgress,
        }
    );
    assert_eq!(
        dispatcher.on_upload_complete("corr").await.unwrap(),
        SignalOutcome::Queued(request.id)
    );

    // A late progress signal must not pull the request back.
    assert_eq!(
        dispatcher.on_upload_progress("corr").await.unwrap(),
        SignalOutcome::AlreadyProgressed {
            request_id: request.id,
            status: RequestStatus::Queued,
        }
    );
}

#[tokio::test]
async fn test_stale_signal_mutates_nothing() {
    let store = fresh_store().await;
    let request = received_request(&store.dal, "alice", "corr").await;
    let (dispatcher, queue) = dispatcher(&store);

    let err = dispatcher.on_upload_complete("unknown").await.unwrap_err();
    assert!(matches!(err, EngineError::StaleSignal(ref id) if id == "unknown"));

    let err = dispatcher.on_upload_progress("unknown").await.unwrap_err();
    assert!(matches!(err, EngineError::StaleSignal(_)));

    let stored = store
        .dal
        .deferred_request()
        .get(request.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, RequestStatus::Received);
    assert_eq!(stored.updated_at, request.updated_at);
    assert_eq!(queue.enqueued(), 0);
}

#[tokio::test]
async fn test_lost_enqueue_is_recovered_by_reconciler() {
    let store = fresh_store().await;
    let request = received_request(&store.dal, "alice", "corr").await;
    let (dispatcher, queue) = dispatcher(&store);

    queue.set_failing(true);
    let outcome = dispatcher.on_upload_complete("corr").await.unwrap();
    assert_eq!(outcome, SignalOutcome::Queued(request.id));
    assert_eq!(queue.pending().await.unwrap(), 0);

    let stored = store
        .dal
        .deferred_request()
        .get(request.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, RequestStatus::Queued);

    queue.set_failing(false);
    tokio::time::sleep(Duration::from_millis(20)).await;

    let reconciler = Reconciler::new(
        store.dal.clone(),
        queue.clone(),
        Arc::new(PollingDistributor::new()),
        ReconcilerConfig {
            queued_stale_after: Duration::from_millis(1),
            ..ReconcilerConfig::default()
        },
    );
    let report = reconciler.sweep().await.unwrap();

    assert_eq!(report.resignaled, 1);
    assert_eq!(report.reclaimed, 0);
    assert_eq!(queue.pending().await.unwrap(), 1);
    let delivery = queue.dequeue().await.unwrap().unwrap();
    assert_eq!(delivery.request_id, request.id);
}
