use axum::{http::HeaderMap, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub mod health;
pub use self::health::health;

pub mod navigation;
pub use self::navigation::navigation;

pub mod verify;
pub use self::verify::verify;

pub mod protected;
pub use self::protected::protected;

/// Error envelope: every failure leaves the server as `{success, message}`.
#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ApiMessage {
    pub success: bool,
    pub message: String,
}

pub(crate) fn failure(status: StatusCode, message: &str) -> (StatusCode, Json<ApiMessage>) {
    (
        status,
        Json(ApiMessage {
            success: false,
            message: message.to_string(),
        }),
    )
}

/// Client identity for rate limiting: first hop of `x-forwarded-for`, then
/// `x-real-ip`.
pub(crate) fn extract_client_ip(headers: &HeaderMap) -> Option<String> {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty());
    if forwarded.is_some() {
        return forwarded.map(str::to_string);
    }
    headers
        .get("x-real-ip")
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// Extract the token from an `Authorization: Bearer <token>` header.
pub(crate) fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
}
