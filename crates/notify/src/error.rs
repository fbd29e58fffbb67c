//! Engine error types.

use meridian_core::error::CoreError;

/// Error type for persistence-seam failures.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A database error from sqlx.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A store-level consistency failure.
    #[error("Store error: {0}")]
    Internal(String),
}

/// Error type surfaced by the notification engine.
///
/// Transport failures are deliberately absent: they are recovered into
/// `failed` log rows at the point of sending and never propagate.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    /// A domain-level error (not-found, validation, retry rules).
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A persistence failure.
    #[error(transparent)]
    Store(#[from] StoreError),
}
