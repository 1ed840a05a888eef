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

//! Diesel table definitions shared by both backends.
//!
//! Column types are restricted to ones with identical mappings on
//! PostgreSQL and SQLite so a single schema serves both.

diesel::table! {
    deferred_requests (id) {
        id -> Text,
        owner_id -> Text,
        upload_correlation_id -> Text,
        payload -> Binary,
        status -> Text,
        result -> Nullable<Binary>,
        failure_reason -> Nullable<Text>,
        last_error -> Nullable<Text>,
        attempts -> Integer,
        created_at -> Timestamp,
        updated_at -> Timestamp,
    }
}

diesel::table! {
    request_events (id) {
        id -> Text,
        request_id -> Text,
        event_type -> Text,
        event_data -> Nullable<Text>,
        created_at -> Timestamp,
    }
}

diesel::table! {
    request_outbox (request_id) {
        request_id -> Text,
        available_at -> Timestamp,
        created_at -> Timestamp,
    }
}

diesel::joinable!(request_events -> deferred_requests (request_id));
diesel::joinable!(request_outbox -> deferred_requests (request_id));

diesel::allow_tables_to_appear_in_same_query!(deferred_requests, request_events, request_outbox);
