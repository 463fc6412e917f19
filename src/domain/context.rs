//! Request scope handed to every handler

use uuid::Uuid;

/// Who is asking, and the id their request is logged under
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperationContext {
    /// From `X-Request-User-Id`; every read and write is scoped to it
    pub request_user_id: Option<Uuid>,
    pub correlation_id: Uuid,
}

impl OperationContext {
    /// Anonymous context with a fresh correlation id
    pub fn new() -> Self {
        Self {
            request_user_id: None,
            correlation_id: Uuid::new_v4(),
        }
    }

    pub fn with_request_user(mut self, user_id: Uuid) -> Self {
        self.request_user_id = Some(user_id);
        self
    }

    /// Keep the caller's correlation id instead of the generated one
    pub fn with_correlation_id(mut self, correlation_id: Uuid) -> Self {
        self.correlation_id = correlation_id;
        self
    }
}

impl Default for OperationContext {
    fn default() -> Self {
        Self::new()
    }
}
