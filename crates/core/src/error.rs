use crate::types::DbId;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: DbId },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Retry not allowed: {0}")]
    RetryNotAllowed(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Webhook signature verification failed")]
    SignatureInvalid,

    #[error("Internal error: {0}")]
    Internal(String),
}
