//! API handlers for the PrestAmigo backend

pub mod capital;
pub mod loans;
pub mod profiles;
pub mod proofs;

use serde::Serialize;

pub use capital::*;
pub use loans::*;
pub use profiles::*;
pub use proofs::*;

/// Standard success envelope for API responses
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    /// Wrap a successful payload
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}
