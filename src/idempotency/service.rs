//! Idempotency Service
//!
//! Remembers the response of a successful mutating request under its
//! `Idempotency-Key`, so a client retry replays the response instead of
//! charging an account twice.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::MAX_IDEMPOTENCY_TTL_HOURS;
use crate::error::{AppError, AppResult};
use crate::storage::SharedStorage;

/// Stored response for one idempotency key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdempotencyRecord {
    pub key: Uuid,
    pub user_id: Uuid,
    /// SHA-256 of the request body, hex encoded
    pub request_hash: String,
    pub response_status: u16,
    pub response_body: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Response to send back for a replayed request
#[derive(Debug, Clone, PartialEq)]
pub struct StoredResponse {
    pub status: u16,
    pub body: serde_json::Value,
}

/// Lookup and recording of idempotent responses
#[derive(Clone)]
pub struct IdempotencyService {
    storage: SharedStorage,
    ttl: Duration,
}

impl IdempotencyService {
    /// `ttl_hours` is clamped to `1..=MAX_IDEMPOTENCY_TTL_HOURS`
    pub fn new(storage: SharedStorage, ttl_hours: i64) -> Self {
        Self {
            storage,
            ttl: Duration::hours(ttl_hours.clamp(1, MAX_IDEMPOTENCY_TTL_HOURS)),
        }
    }

    /// Compute SHA-256 hash of request body for conflict detection
    pub fn compute_request_hash(body: &[u8]) -> String {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(body);
        hex::encode(hasher.finalize())
    }

    /// Find the stored response for `key`.
    ///
    /// Returns `Ok(None)` when the key is unknown or expired, and
    /// `AppError::IdempotencyConflict` when the key was used for a
    /// different request body.
    pub async fn replay(
        &self,
        user_id: Uuid,
        key: Uuid,
        request_hash: &str,
    ) -> AppResult<Option<StoredResponse>> {
        let Some(record) = self.storage.get_idempotency_record(user_id, key).await? else {
            return Ok(None);
        };

        if record.expires_at < Utc::now() {
            return Ok(None);
        }

        if record.request_hash != request_hash {
            tracing::warn!(%key, %user_id, "Idempotency key reused with a different request");
            return Err(AppError::IdempotencyConflict);
        }

        tracing::debug!(%key, %user_id, "Replaying stored response");
        Ok(Some(StoredResponse {
            status: record.response_status,
            body: record.response_body,
        }))
    }

    /// Store the response of a successful request
    pub async fn remember(
        &self,
        user_id: Uuid,
        key: Uuid,
        request_hash: String,
        status: u16,
        body: serde_json::Value,
    ) -> AppResult<()> {
        let now = Utc::now();
        let record = IdempotencyRecord {
            key,
            user_id,
            request_hash,
            response_status: status,
            response_body: body,
            created_at: now,
            expires_at: now + self.ttl,
        };

        self.storage.save_idempotency_record(&record).await?;
        Ok(())
    }
}
