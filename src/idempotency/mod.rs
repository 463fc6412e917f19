//! Idempotency module
//!
//! Prevents duplicate request processing using idempotency keys.

mod service;

pub use service::{IdempotencyRecord, IdempotencyService, StoredResponse};
