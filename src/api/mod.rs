#[allow(unused_imports)]
use crate::api::handlers::{
    health, health::__path_health, navigation, navigation::__path_navigation, protected,
    protected::__path_protected, verify, verify::__path_verify,
};
use crate::api::{rate_limit::MemoryRateLimiter, rate_limit::RateLimiter, store::NavStore};
use anyhow::Result;
use axum::{
    body::Body,
    http::{header, HeaderMap, HeaderName, HeaderValue, Method, Request},
    routing::{get, post},
    Extension, Router,
};
use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::PropagateRequestIdLayer,
    set_header::SetRequestHeaderLayer,
    trace::TraceLayer,
};
use tracing::{debug_span, info, Span};
use ulid::Ulid;
use utoipa::OpenApi;

pub mod auth;
pub mod handlers;
pub mod rate_limit;
pub mod store;

/// Shared per-process state handed to every request handler.
///
/// Built once at startup and injected through an `Extension`; tests construct
/// it around fixture stores and limiters.
pub struct AppState {
    store: NavStore,
    token_secret: SecretString,
    limiter: Arc<dyn RateLimiter>,
}

impl AppState {
    #[must_use]
    pub fn new(store: NavStore, token_secret: SecretString) -> Self {
        Self {
            store,
            token_secret,
            limiter: Arc::new(MemoryRateLimiter::new()),
        }
    }

    #[must_use]
    pub fn with_limiter(mut self, limiter: Arc<dyn RateLimiter>) -> Self {
        self.limiter = limiter;
        self
    }

    #[must_use]
    pub fn store(&self) -> &NavStore {
        &self.store
    }

    #[must_use]
    pub fn token_secret(&self) -> &[u8] {
        self.token_secret.expose_secret().as_bytes()
    }

    #[must_use]
    pub fn limiter(&self) -> &dyn RateLimiter {
        self.limiter.as_ref()
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(health, navigation, verify, protected),
    components(schemas(
        handlers::ApiMessage,
        handlers::health::Health,
        handlers::navigation::Catalogue,
        handlers::protected::ProtectedGroup,
        handlers::protected::ProtectedResponse,
        handlers::verify::VerifyRequest,
        handlers::verify::VerifyResponse,
        store::GroupView,
        store::Link,
    )),
    tags(
        (name = "faro", description = "Link dashboard API"),
    )
)]
struct ApiDoc;

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}

/// Build the application router around shared state.
///
/// Kept separate from [`new`] so tests can drive the router directly.
#[must_use]
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        // allow `GET` and `POST` when accessing the resource
        .allow_methods([Method::GET, Method::POST])
        // allow requests from any origin
        .allow_origin(Any);

    Router::new()
        .route("/api/navigation", get(navigation))
        .route("/api/auth/verify", post(verify))
        .route("/api/navigation/protected/:group_id", get(protected))
        .route("/api/health", get(health))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(cors)
                .layer(Extension(state)),
        )
}

/// Serve the API until the process receives ctrl-c.
///
/// # Errors
/// Returns an error if the listener cannot bind or the server fails.
pub async fn new(port: u16, state: Arc<AppState>) -> Result<()> {
    let app = router(state);

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("Gracefully shutdown");
        })
        .await?;

    Ok(())
}

// span
fn make_span(request: &Request<Body>) -> Span {
    let path = request.uri().path();
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let headers = redacted_headers(request.headers());

    debug_span!("http-request", path, ?headers, request_id)
}

/// Headers as recorded in spans. The authorization value is the bearer token
/// itself and must never reach the logs.
fn redacted_headers(headers: &HeaderMap) -> HeaderMap {
    let mut headers = headers.clone();
    if headers.contains_key(header::AUTHORIZATION) {
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("redacted"));
    }
    headers
}
