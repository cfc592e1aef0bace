use crate::api::{store::GroupView, AppState};
use axum::{extract::Extension, response::IntoResponse, Json};
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;

#[derive(ToSchema, Serialize, Debug)]
pub struct Catalogue {
    pub success: bool,
    pub groups: Vec<GroupView>,
}

#[utoipa::path(
    get,
    path = "/api/navigation",
    responses(
        (status = 200, description = "Public catalogue; protected groups appear with empty links", body = Catalogue)
    ),
    tag = "faro"
)]
pub async fn navigation(Extension(state): Extension<Arc<AppState>>) -> impl IntoResponse {
    Json(Catalogue {
        success: true,
        groups: state.store().catalogue(),
    })
}
