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

//! Request store tests: creation, lookups, events and the outbox table.

use chrono::{Duration, Utc};
use holdfast::models::deferred_request::NewDeferredRequest;
use holdfast::models::request_event::RequestEventType;
use holdfast::{RequestId, RequestStatus, StoreError};
use std::collections::HashSet;

use crate::fixtures::{fresh_store, queued_request, received_request};

#[tokio::test]
async fn test_create_assigns_unique_ids_in_received() {
    let store = fresh_store().await;

    let mut ids = HashSet::new();
    for i in 0..10 {
        let request = received_request(&store.dal, "alice", &format!("corr-{}", i)).await;
        assert_eq!(request.status, RequestStatus::Received);
        assert_eq!(request.attempts, 0);
        assert!(request.result.is_none());
        assert!(request.failure_reason.is_none());
        assert!(ids.insert(request.id), "duplicate request id {}", request.id);
    }

    assert_eq!(ids.len(), 10);
}

#[tokio::test]
async fn test_create_keeps_payload_bytes_verbatim() {
    let store = fresh_store().await;
    let payload = vec![0u8, 159, 146, 150, 255];

    let created = store
        .dal
        .deferred_request()
        .create(NewDeferredRequest {
            owner_id: "alice".to_string(),
            upload_correlation_id: "binary".to_string(),
            payload: payload.clone(),
        })
        .await
        .expect("Failed to create request");

    let loaded = store
        .dal
        .deferred_request()
        .get(created.id)
        .await
        .expect("Failed to load request")
        .expect("request should exist");
    assert_eq!(loaded.payload, payload);
    assert_eq!(loaded.upload_correlation_id, "binary");
}

#[tokio::test]
async fn test_correlation_id_is_unique() {
    let store = fresh_store().await;
    received_request(&store.dal, "alice", "shared").await;

    let duplicate = store
        .dal
        .deferred_request()
        .create(NewDeferredRequest {
            owner_id: "bob".to_string(),
            upload_correlation_id: "shared".to_string(),
            payload: b"{}".to_vec(),
        })
        .await;

    assert!(matches!(duplicate, Err(StoreError::Database(_))));
}

#[tokio::test]
async fn test_owner_scoped_lookup() {
    let store = fresh_store().await;
    let request = received_request(&store.dal, "alice", "corr").await;
    let requests = store.dal.deferred_request();

    assert!(requests
        .get_for_owner("alice", request.id)
        .await
        .unwrap()
        .is_some());
    assert!(requests
        .get_for_owner("mallory", request.id)
        .await
        .unwrap()
        .is_none());
    assert!(requests
        .get_for_owner("alice", RequestId::new())
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_find_by_correlation_id() {
    let store = fresh_store().await;
    let request = received_request(&store.dal, "alice", "corr-42").await;

    let found = store
        .dal
        .deferred_request()
        .find_by_correlation_id("corr-42")
        .await
        .unwrap()
        .expect("request should be found");
    assert_eq!(found.id, request.id);

    assert!(store
        .dal
        .deferred_request()
        .find_by_correlation_id("corr-missing")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_count_by_status() {
    let store = fresh_store().await;
    received_request(&store.dal, "alice", "a").await;
    received_request(&store.dal, "alice", "b").await;
    queued_request(&store.dal, "alice", "c").await;

    let counts = store.dal.deferred_request().count_by_status().await.unwrap();
    let lookup = |status| {
        counts
            .iter()
            .find(|(s, _)| *s == status)
            .map(|(_, n)| *n)
            .unwrap_or(0)
    };

    assert_eq!(lookup(RequestStatus::Received), 2);
    assert_eq!(lookup(RequestStatus::Queued), 1);
    assert_eq!(lookup(RequestStatus::Executing), 0);
}

#[tokio::test]
async fn test_list_stale_respects_cutoff_and_status() {
    let store = fresh_store().await;
    let queued = queued_request(&store.dal, "alice", "q").await;
    received_request(&store.dal, "alice", "r").await;
    let requests = store.dal.deferred_request();

    let future = Utc::now() + Duration::minutes(1);
    let stale = requests
        .list_stale(RequestStatus::Queued, future, 10)
        .await
        .unwrap();
    assert_eq!(stale.len(), 1);
    assert_eq!(stale[0].id, queued.id);

    let past = Utc::now() - Duration::minutes(1);
    assert!(requests
        .list_stale(RequestStatus::Queued, past, 10)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_create_records_event() {
    let store = fresh_store().await;
    let request = received_request(&store.dal, "alice", "corr").await;

    let events = store
        .dal
        .request_event()
        .list_for_request(request.id)
        .await
        .unwrap();

    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind(), Some(RequestEventType::RequestCreated));
    assert!(events[0]
        .event_data
        .as_deref()
        .unwrap_or_default()
        .contains("corr"));
}

#[tokio::test]
async fn test_event_retention_cleanup() {
    let store = fresh_store().await;
    queued_request(&store.dal, "alice", "a").await;
    received_request(&store.dal, "alice", "b").await;
    let events = store.dal.request_event();

    let past = Utc::now() - Duration::days(1);
    assert_eq!(events.count_older_than(past).await.unwrap(), 0);
    assert_eq!(events.delete_older_than(past).await.unwrap(), 0);

    let future = Utc::now() + Duration::minutes(1);
    assert_eq!(events.count_older_than(future).await.unwrap(), 3);
    assert_eq!(events.delete_older_than(future).await.unwrap(), 3);
    assert_eq!(events.count_older_than(future).await.unwrap(), 0);
}

#[tokio::test]
async fn test_outbox_holds_one_entry_per_request() {
    let store = fresh_store().await;
    let request = queued_request(&store.dal, "alice", "corr").await;
    let outbox = store.dal.request_outbox();

    assert!(outbox.insert(request.id, Utc::now()).await.unwrap());
    assert!(!outbox.insert(request.id, Utc::now()).await.unwrap());
    assert_eq!(outbox.count_pending().await.unwrap(), 1);

    let taken = outbox
        .take_next(Utc::now())
        .await
        .unwrap()
        .expect("entry should be due");
    assert_eq!(taken.request_id, request.id);
    assert!(outbox.take_next(Utc::now()).await.unwrap().is_none());
    assert_eq!(outbox.count_pending().await.unwrap(), 0);
}

#[tokio::test]
async fn test_outbox_withholds_entries_until_due() {
    let store = fresh_store().await;
    let later = queued_request(&store.dal, "alice", "later").await;
    let now = queued_request(&store.dal, "alice", "now").await;
    let outbox = store.dal.request_outbox();

    outbox
        .insert(later.id, Utc::now() + Duration::minutes(5))
        .await
        .unwrap();
    outbox.insert(now.id, Utc::now()).await.unwrap();

    let first = outbox.take_next(Utc::now()).await.unwrap().unwrap();
    assert_eq!(first.request_id, now.id);
    assert!(outbox.take_next(Utc::now()).await.unwrap().is_none());

    let pending = outbox.list_pending(10).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].request_id, later.id);

    let due = outbox
        .take_next(Utc::now() + Duration::minutes(10))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(due.request_id, later.id);
}
