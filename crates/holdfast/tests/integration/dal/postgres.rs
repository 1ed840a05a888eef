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

//! Concurrency tests that need a multi-connection PostgreSQL pool.
//!
//! Run with `cargo test --features postgres --test integration` against a
//! server reachable at `TEST_POSTGRES_URL`.

use chrono::Utc;
use diesel::connection::SimpleConnection;
use diesel::sql_types::BigInt;
use diesel::{Connection, PgConnection, QueryableByName, RunQueryDsl};
use holdfast::dal::TransitionOutcome;
use holdfast::models::request_event::RequestEventType;
use holdfast::RequestStatus;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Barrier;

use crate::fixtures::{fresh_postgres_store, queued_request, received_request, wait_until};

#[derive(QueryableByName)]
struct Waiting {
    #[diesel(sql_type = BigInt)]
    count: i64,
}

/// Number of sessions on this database blocked on a row or table lock.
fn lock_waiters(conn: &mut PgConnection) -> i64 {
    diesel::sql_query(
        "SELECT count(*) AS count FROM pg_stat_activity \
         WHERE datname = current_database() AND wait_event_type = 'Lock'",
    )
    .get_result::<Waiting>(conn)
    .unwrap()
    .count
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_take_next_returns_distinct_entries() {
    let store = fresh_postgres_store(4).await;
    let outbox = store.dal.request_outbox();
    let due = Utc::now() - chrono::Duration::seconds(1);
    for n in 0..8 {
        let request = received_request(&store.dal, "alice", &format!("corr-{}", n)).await;
        assert!(outbox.insert(request.id, due).await.unwrap());
    }

    let barrier = Arc::new(Barrier::new(4));
    let mut handles = Vec::new();
    for _ in 0..4 {
        let dal = store.dal.clone();
        let barrier = barrier.clone();
        handles.push(tokio::spawn(async move {
            barrier.wait().await;
            dal.request_outbox().take_next(Utc::now()).await.unwrap()
        }));
    }

    let mut taken = HashSet::new();
    for handle in handles {
        let entry = handle.await.unwrap().expect("every consumer should get an entry");
        assert!(taken.insert(entry.request_id), "entry delivered twice");
    }
    assert_eq!(store.dal.request_outbox().count_pending().await.unwrap(), 4);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_claim_loses_to_concurrent_writer() {
    let store = fresh_postgres_store(2).await;
    let request = queued_request(&store.dal, "alice", "corr").await;

    // Another writer moves the row to Executing and holds its lock.
    let mut writer = PgConnection::establish(&store.url).unwrap();
    writer
        .batch_execute(&format!(
            "BEGIN; UPDATE deferred_requests \
             SET status = 'Executing', attempts = attempts + 1 WHERE id = '{}'",
            request.id
        ))
        .unwrap();

    // The claim reads the committed Queued row, then blocks on the update.
    let dal = store.dal.clone();
    let id = request.id;
    let claim = tokio::spawn(async move { dal.deferred_request().claim(id, 3).await });

    let url = store.url.clone();
    let blocked = wait_until(Duration::from_secs(10), || {
        let url = url.clone();
        async move {
            tokio::task::spawn_blocking(move || {
                let mut conn = PgConnection::establish(&url).unwrap();
                lock_waiters(&mut conn) > 0
            })
            .await
            .unwrap()
        }
    })
    .await;
    assert!(blocked, "claim never waited on the row lock");

    writer.batch_execute("COMMIT").unwrap();

    let current = match claim.await.unwrap().unwrap() {
        TransitionOutcome::NotApplied(current) => current,
        other => panic!("expected the claim to be refused, got {:?}", other),
    };
    assert_eq!(current.status, RequestStatus::Executing);
    assert_eq!(current.attempts, 1);

    let events = store
        .dal
        .request_event()
        .list_for_request(request.id)
        .await
        .unwrap();
    assert!(events
        .iter()
        .all(|event| event.event_type != RequestEventType::RequestClaimed.as_str()));
}
