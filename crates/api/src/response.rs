//! Shared response envelope types for API handlers.
//!
//! Operator endpoints answer with a `{ "success": true, "message": ...,
//! "data": ... }` envelope. Use [`ApiResponse`] instead of ad-hoc
//! `serde_json::json!` blocks to get compile-time type safety and
//! consistent serialization. Error responses use the same envelope with
//! `success: false` (see [`AppError`](crate::error::AppError)).

use serde::Serialize;

/// Standard success envelope.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    /// A successful response with a payload.
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
        }
    }
}

impl ApiResponse<()> {
    /// A successful response without a payload.
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_is_omitted_when_absent() {
        let with_data = serde_json::to_value(ApiResponse::ok("done", 7)).unwrap();
        assert_eq!(with_data["success"], true);
        assert_eq!(with_data["message"], "done");
        assert_eq!(with_data["data"], 7);

        let without = serde_json::to_value(ApiResponse::message("done")).unwrap();
        assert!(without.get("data").is_none());
    }
}
