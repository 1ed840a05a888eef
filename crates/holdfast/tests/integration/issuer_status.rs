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

//! Request intake and status polling.

use holdfast::issuer::UploadHandleIssuer;
use holdfast::status::StatusService;
use holdfast::{EngineError, RequestId, RequestStatus, SlotKind};
use std::sync::Arc;

use crate::fixtures::{fresh_store, SequentialUploads, TestStore};

const MAX_PAYLOAD: usize = 64;

fn issuer(store: &TestStore) -> (UploadHandleIssuer, Arc<SequentialUploads>) {
    let uploads = Arc::new(SequentialUploads::default());
    (
        UploadHandleIssuer::new(store.dal.clone(), uploads.clone(), MAX_PAYLOAD),
        uploads,
    )
}

async fn stored_count(store: &TestStore) -> i64 {
    store
        .dal
        .deferred_request()
        .count_by_status()
        .await
        .unwrap()
        .iter()
        .map(|(_, n)| n)
        .sum()
}

#[tokio::test]
async fn test_create_returns_upload_slot() {
    let store = fresh_store().await;
    let (issuer, uploads) = issuer(&store);

    let created = issuer
        .create("alice", br#"{"method":"ingest"}"#.to_vec())
        .await
        .unwrap();

    assert!(created.upload_location.starts_with("https://uploads.test/v1/upload-1-"));
    assert_eq!(created.upload_token.as_deref(), Some("token-1"));
    assert_eq!(uploads.issued(), 1);

    let stored = store
        .dal
        .deferred_request()
        .get(created.request_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, RequestStatus::Received);
    assert_eq!(stored.owner_id, "alice");
    assert!(created.upload_location.ends_with(&stored.upload_correlation_id));
}

#[tokio::test]
async fn test_slot_kind_reaches_upload_service() {
    let store = fresh_store().await;
    let (issuer, uploads) = issuer(&store);

    issuer.create("alice", b"{}".to_vec()).await.unwrap();
    issuer
        .create_with_kind("alice", b"{}".to_vec(), SlotKind::Url)
        .await
        .unwrap();

    assert_eq!(uploads.kinds(), vec![SlotKind::File, SlotKind::Url]);
}

#[tokio::test]
async fn test_create_rejects_bad_input_before_reserving_upload() {
    let store = fresh_store().await;
    let (issuer, uploads) = issuer(&store);

    assert!(matches!(
        issuer.create("", b"{}".to_vec()).await,
        Err(EngineError::Unauthorized)
    ));
    assert!(matches!(
        issuer.create("alice", Vec::new()).await,
        Err(EngineError::Validation(_))
    ));
    assert!(matches!(
        issuer.create("alice", vec![b'x'; MAX_PAYLOAD + 1]).await,
        Err(EngineError::Validation(_))
    ));

    assert_eq!(uploads.issued(), 0);
    assert_eq!(stored_count(&store).await, 0);
}

#[tokio::test]
async fn test_payload_at_limit_is_accepted() {
    let store = fresh_store().await;
    let (issuer, _uploads) = issuer(&store);

    assert!(issuer.create("alice", vec![b'x'; MAX_PAYLOAD]).await.is_ok());
}

#[tokio::test]
async fn test_upload_service_outage_persists_nothing() {
    let store = fresh_store().await;
    let (issuer, uploads) = issuer(&store);
    uploads.set_unavailable(true);

    let err = issuer.create("alice", b"{}".to_vec()).await.unwrap_err();
    assert!(matches!(err, EngineError::UpstreamUnavailable(_)));
    assert_eq!(stored_count(&store).await, 0);
}

#[tokio::test]
async fn test_status_is_owner_scoped() {
    let store = fresh_store().await;
    let (issuer, _uploads) = issuer(&store);
    let status = StatusService::new(store.dal.clone());
    let created = issuer.create("alice", b"{}".to_vec()).await.unwrap();

    let view = status.get("alice", created.request_id).await.unwrap();
    assert_eq!(view.status, RequestStatus::Received);
    assert!(!view.is_terminal());

    assert!(matches!(
        status.get("mallory", created.request_id).await,
        Err(EngineError::NotFound)
    ));
    assert!(matches!(
        status.get("alice", RequestId::new()).await,
        Err(EngineError::NotFound)
    ));
    assert!(matches!(
        status.get("", created.request_id).await,
        Err(EngineError::Unauthorized)
    ));
}

#[tokio::test]
async fn test_status_exposes_result_only_when_succeeded() {
    let store = fresh_store().await;
    let (issuer, _uploads) = issuer(&store);
    let status = StatusService::new(store.dal.clone());
    let requests = store.dal.deferred_request();

    let created = issuer.create("alice", b"{}".to_vec()).await.unwrap();
    let correlation_id = requests
        .get(created.request_id)
        .await
        .unwrap()
        .unwrap()
        .upload_correlation_id;
    requests.mark_queued(&correlation_id).await.unwrap();
    requests.claim(created.request_id, 3).await.unwrap();

    let executing = status.get("alice", created.request_id).await.unwrap();
    assert_eq!(executing.status, RequestStatus::Executing);
    assert!(executing.result.is_none());

    requests
        .mark_succeeded(created.request_id, b"{\"answer\":42}".to_vec())
        .await
        .unwrap();
    let done = status.get("alice", created.request_id).await.unwrap();
    assert!(done.is_terminal());
    assert_eq!(done.result.as_deref(), Some(&b"{\"answer\":42}"[..]));
    assert!(done.failure_reason.is_none());
}

#[tokio::test]
async fn test_status_exposes_failure_reason() {
    let store = fresh_store().await;
    let (issuer, _uploads) = issuer(&store);
    let status = StatusService::new(store.dal.clone());
    let requests = store.dal.deferred_request();

    let created = issuer.create("alice", b"{}".to_vec()).await.unwrap();
    let correlation_id = requests
        .get(created.request_id)
        .await
        .unwrap()
        .unwrap()
        .upload_correlation_id;
    requests.mark_queued(&correlation_id).await.unwrap();
    requests.claim(created.request_id, 3).await.unwrap();
    requests
        .mark_failed(created.request_id, "schema mismatch".to_string())
        .await
        .unwrap();

    let view = status.get("alice", created.request_id).await.unwrap();
    assert_eq!(view.status, RequestStatus::Failed);
    assert_eq!(view.failure_reason.as_deref(), Some("schema mismatch"));
    assert!(view.result.is_none());
}
