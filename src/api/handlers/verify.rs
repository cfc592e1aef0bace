use crate::api::{
    auth::{self, NavClaims},
    handlers::{extract_client_ip, failure, ApiMessage},
    rate_limit::RateLimitDecision,
    store::Group,
    AppState,
};
use axum::{
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, instrument};
use utoipa::ToSchema;

#[derive(ToSchema, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct VerifyRequest {
    pub group_id: Option<u32>,
    pub password: Option<String>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResponse {
    pub success: bool,
    pub message: String,
    pub token: String,
    pub expires_in: String,
}

#[utoipa::path(
    post,
    path = "/api/auth/verify",
    request_body = VerifyRequest,
    responses(
        (status = 200, description = "Password accepted, token issued", body = VerifyResponse),
        (status = 400, description = "Missing group id or password", body = ApiMessage),
        (status = 401, description = "Invalid password", body = ApiMessage),
        (status = 404, description = "Group not found or not protected", body = ApiMessage),
        (status = 429, description = "Too many attempts", body = ApiMessage),
        (status = 500, description = "Verification failed", body = ApiMessage)
    ),
    tag = "faro"
)]
#[instrument(skip(state, headers, payload))]
pub async fn verify(
    headers: HeaderMap,
    Extension(state): Extension<Arc<AppState>>,
    payload: Option<Json<VerifyRequest>>,
) -> impl IntoResponse {
    let request: VerifyRequest = match payload {
        Some(Json(payload)) => payload,
        None => {
            return failure(StatusCode::BAD_REQUEST, "Missing group id or password")
                .into_response()
        }
    };

    let (group_id, password) = match (request.group_id, request.password.as_deref()) {
        (Some(group_id), Some(password)) if !password.is_empty() => (group_id, password),
        _ => {
            return failure(StatusCode::BAD_REQUEST, "Missing group id or password")
                .into_response()
        }
    };

    // The limiter wraps the whole endpoint: every call counts, and the check
    // runs before any password work.
    let client_ip = extract_client_ip(&headers);
    if state.limiter().register_attempt(client_ip.as_deref()) == RateLimitDecision::Limited {
        debug!("Rate limited verify attempt for group {}", group_id);
        return failure(
            StatusCode::TOO_MANY_REQUESTS,
            "Too many attempts, try again later",
        )
        .into_response();
    }

    // One message for "no such group" and "group is not protected" so the
    // response does not reveal which groups exist.
    let Some(group) = state.store().protected_group(group_id) else {
        return failure(StatusCode::NOT_FOUND, "Group not found or not protected")
            .into_response();
    };

    let Some(password_hash) = group.password_hash.as_deref() else {
        // Unreachable per the store invariant, but never mint without a hash.
        error!("Protected group {} has no password hash", group.id);
        return failure(StatusCode::INTERNAL_SERVER_ERROR, "Verification failed")
            .into_response();
    };

    match bcrypt::verify(password, password_hash) {
        Ok(true) => {}
        Ok(false) => {
            return failure(StatusCode::UNAUTHORIZED, "Invalid password").into_response();
        }
        Err(err) => {
            error!("Password hash comparison failed: {err}");
            return failure(StatusCode::INTERNAL_SERVER_ERROR, "Verification failed")
                .into_response();
        }
    }

    let now = Utc::now().timestamp();
    match issue_token(state.token_secret(), group, now) {
        Ok(token) => (
            StatusCode::OK,
            Json(VerifyResponse {
                success: true,
                message: "Password accepted".to_string(),
                token,
                expires_in: auth::TOKEN_TTL_LABEL.to_string(),
            }),
        )
            .into_response(),
        Err(err) => {
            error!("Failed to sign access token: {err}");
            failure(StatusCode::INTERNAL_SERVER_ERROR, "Verification failed").into_response()
        }
    }
}

/// Mint a token bound to `group`, valid for 24 hours from `now`.
fn issue_token(secret: &[u8], group: &Group, now: i64) -> Result<String, auth::Error> {
    let password_hash = group.password_hash.as_deref().unwrap_or_default();
    let claims = NavClaims {
        v: auth::TOKEN_VERSION,
        gid: group.id,
        gname: group.name.clone(),
        phf: auth::hash_fingerprint(password_hash),
        iat: now,
        exp: now + auth::TOKEN_TTL_SECONDS,
    };
    auth::sign_hs256(secret, &claims)
}
