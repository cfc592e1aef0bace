use crate::api::{
    auth::{self, verify_hs256},
    handlers::{bearer_token, failure, ApiMessage},
    store::Link,
    AppState,
};
use axum::{
    extract::{Extension, Path},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, instrument};
use utoipa::ToSchema;

/// Full group payload, links included. Only ever built after the token checks
/// pass.
#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ProtectedGroup {
    pub id: u32,
    pub name: String,
    pub description: String,
    pub links: Vec<Link>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ProtectedResponse {
    pub success: bool,
    pub group: ProtectedGroup,
}

#[utoipa::path(
    get,
    path = "/api/navigation/protected/{group_id}",
    params(
        ("group_id" = u32, Path, description = "Group to unlock")
    ),
    responses(
        (status = 200, description = "Token accepted, full group returned", body = ProtectedResponse),
        (status = 401, description = "Missing, invalid, expired or stale token", body = ApiMessage),
        (status = 403, description = "Token was issued for another group", body = ApiMessage),
        (status = 404, description = "Group not found or not protected", body = ApiMessage)
    ),
    tag = "faro"
)]
#[instrument(skip(state, headers))]
pub async fn protected(
    headers: HeaderMap,
    Path(group_id): Path<u32>,
    Extension(state): Extension<Arc<AppState>>,
) -> impl IntoResponse {
    let Some(token) = bearer_token(&headers) else {
        return failure(StatusCode::UNAUTHORIZED, "Missing access token").into_response();
    };

    let claims = match verify_hs256(&token, state.token_secret(), Utc::now().timestamp()) {
        Ok(claims) => claims,
        Err(err) => {
            debug!("Rejected access token: {err}");
            return failure(StatusCode::UNAUTHORIZED, "Invalid access token").into_response();
        }
    };

    // A valid token for group A never opens group B.
    if claims.gid != group_id {
        return failure(StatusCode::FORBIDDEN, "Token not valid for this group").into_response();
    }

    let Some(group) = state.store().protected_group(group_id) else {
        return failure(StatusCode::NOT_FOUND, "Group not found or not protected")
            .into_response();
    };

    // Tokens minted before a password rotation carry the old fingerprint and
    // stop working immediately.
    let stored_hash = group.password_hash.as_deref().unwrap_or_default();
    if claims.phf != auth::hash_fingerprint(stored_hash) {
        debug!("Token fingerprint does not match stored hash for group {group_id}");
        return failure(StatusCode::UNAUTHORIZED, "Invalid access token").into_response();
    }

    (
        StatusCode::OK,
        Json(ProtectedResponse {
            success: true,
            group: ProtectedGroup {
                id: group.id,
                name: group.name.clone(),
                description: group.description.clone(),
                links: group.links.clone(),
            },
        }),
    )
        .into_response()
}
