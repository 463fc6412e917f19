//! Common test utilities

#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::util::ServiceExt;
use uuid::Uuid;

use finance_tracker::api::{build_router, AppState};
use finance_tracker::storage::{MemoryStorage, PgStorage, SharedStorage};

/// Router over a fresh in-memory backend
pub fn memory_app() -> (Router, SharedStorage) {
    let storage: SharedStorage = Arc::new(MemoryStorage::new());
    (build_router(AppState::new(storage.clone(), 24)), storage)
}

/// Router over the in-memory backend without account support
pub fn minimal_app() -> Router {
    let storage: SharedStorage = Arc::new(MemoryStorage::without_accounts());
    build_router(AppState::new(storage, 24))
}

/// Connect to DATABASE_URL and clear every table
pub async fn setup_test_db() -> PgStorage {
    dotenvy::dotenv().ok();
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for tests");

    let storage = PgStorage::connect(&database_url, 5)
        .await
        .expect("Failed to connect to DB");

    sqlx::query(
        "TRUNCATE TABLE ledger_entries, transfers, expenses, accounts, idempotency_keys CASCADE",
    )
    .execute(storage.pool())
    .await
    .expect("Failed to clean up DB");

    storage
}

/// A client bound to one request user
pub struct TestClient {
    pub app: Router,
    pub user_id: Uuid,
}

impl TestClient {
    pub fn new(app: Router) -> Self {
        Self {
            app,
            user_id: Uuid::new_v4(),
        }
    }

    pub fn as_user(&self, user_id: Uuid) -> Self {
        Self {
            app: self.app.clone(),
            user_id,
        }
    }

    pub async fn send(
        &self,
        method: &str,
        uri: &str,
        body: Option<Value>,
        headers: &[(&str, String)],
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder()
            .method(method)
            .uri(format!("/api/v1{}", uri))
            .header("X-Request-User-Id", self.user_id.to_string());
        for (name, value) in headers {
            builder = builder.header(*name, value);
        }

        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.send("GET", uri, None, &[]).await
    }

    pub async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send("POST", uri, Some(body), &[]).await
    }

    pub async fn patch(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send("PATCH", uri, Some(body), &[]).await
    }

    pub async fn delete(&self, uri: &str) -> (StatusCode, Value) {
        self.send("DELETE", uri, None, &[]).await
    }

    /// Open an account and return its id
    pub async fn open_account(&self, name: &str, account_type: &str, opening: &str) -> String {
        let (status, json) = self
            .post(
                "/accounts",
                serde_json::json!({
                    "name": name,
                    "account_type": account_type,
                    "opening_balance": opening,
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "account creation failed: {}", json);
        json["id"].as_str().unwrap().to_string()
    }

    pub async fn balance(&self, account_id: &str) -> String {
        let (status, json) = self.get(&format!("/accounts/{}", account_id)).await;
        assert_eq!(status, StatusCode::OK);
        json["balance"].as_str().unwrap().to_string()
    }

    pub async fn assert_reconciled(&self, account_id: &str) {
        let (status, json) = self
            .get(&format!("/accounts/{}/reconciliation", account_id))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["is_consistent"], true, "{}", json);
    }
}
