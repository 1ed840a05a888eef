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

//! Reconciliation of abandoned executions and lost signals.

use holdfast::config::ReconcilerConfig;
use holdfast::dispatcher::PollingDistributor;
use holdfast::queue::WorkQueue;
use holdfast::reconciler::{Reconciler, SweepReport};
use holdfast::RequestStatus;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

use crate::fixtures::{fresh_store, queued_request, CountingQueue, TestStore};

fn reconciler(store: &TestStore, config: ReconcilerConfig) -> (Reconciler, Arc<CountingQueue>) {
    let queue = Arc::new(CountingQueue::new(store.dal.clone()));
    let reconciler = Reconciler::new(
        store.dal.clone(),
        queue.clone(),
        Arc::new(PollingDistributor::new()),
        config,
    );
    (reconciler, queue)
}

#[tokio::test]
async fn test_abandoned_execution_is_requeued() {
    let store = fresh_store().await;
    let request = queued_request(&store.dal, "alice", "corr").await;
    store
        .dal
        .deferred_request()
        .claim(request.id, 3)
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;

    let (reconciler, queue) = reconciler(
        &store,
        ReconcilerConfig {
            executing_stale_after: Duration::from_millis(1),
            ..ReconcilerConfig::default()
        },
    );
    let report = reconciler.sweep().await.unwrap();
    assert_eq!(
        report,
        SweepReport {
            reclaimed: 1,
            resignaled: 0,
        }
    );

    let stored = store
        .dal
        .deferred_request()
        .get(request.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, RequestStatus::Queued);
    assert_eq!(stored.attempts, 1);
    assert_eq!(
        stored.last_error.as_deref(),
        Some("execution abandoned during attempt 1")
    );
    assert_eq!(queue.pending().await.unwrap(), 1);
}

#[tokio::test]
async fn test_fresh_requests_are_left_alone() {
    let store = fresh_store().await;
    let executing = queued_request(&store.dal, "alice", "a").await;
    queued_request(&store.dal, "alice", "b").await;
    store
        .dal
        .deferred_request()
        .claim(executing.id, 3)
        .await
        .unwrap();

    let (reconciler, queue) = reconciler(&store, ReconcilerConfig::default());
    assert_eq!(reconciler.sweep().await.unwrap(), SweepReport::default());
    assert_eq!(queue.enqueued(), 0);

    let stored = store
        .dal
        .deferred_request()
        .get(executing.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, RequestStatus::Executing);
}

#[tokio::test]
async fn test_resignal_does_not_duplicate_pending_entry() {
    let store = fresh_store().await;
    let request = queued_request(&store.dal, "alice", "corr").await;
    let (reconciler, queue) = reconciler(
        &store,
        ReconcilerConfig {
            queued_stale_after: Duration::from_millis(1),
            ..ReconcilerConfig::default()
        },
    );
    queue.enqueue(request.id).await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;

    let report = reconciler.sweep().await.unwrap();
    assert_eq!(report.resignaled, 1);
    assert_eq!(queue.pending().await.unwrap(), 1);
}

#[tokio::test]
async fn test_spawned_reconciler_stops_on_shutdown() {
    let store = fresh_store().await;
    let (reconciler, _queue) = reconciler(
        &store,
        ReconcilerConfig {
            sweep_interval: Duration::from_millis(10),
            ..ReconcilerConfig::default()
        },
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = reconciler.spawn(shutdown_rx);
    tokio::time::sleep(Duration::from_millis(50)).await;

    shutdown_tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .expect("reconciler should stop promptly")
        .unwrap();
}
