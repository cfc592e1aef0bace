use anyhow::Result;
use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use faro::api::{
    auth::{self, NavClaims},
    handlers::{verify::VerifyResponse, ApiMessage},
    rate_limit::{MemoryRateLimiter, NoopRateLimiter, RateLimiter},
    router,
    store::NavStore,
    AppState,
};
use secrecy::SecretString;
use serde_json::{json, Value};
use std::{sync::Arc, time::Duration};
use tower::ServiceExt;

const SECRET: &str = "integration-test-secret";
const PASSWORD: &str = "open sesame";

fn fixture_store() -> Result<NavStore> {
    let hash = bcrypt::hash(PASSWORD, 4)?;
    let seed = json!({
        "groups": [
            {
                "id": 1,
                "name": "Everyday Tools",
                "description": "Public tools",
                "isProtected": false,
                "links": [
                    {"name": "Mail", "url": "https://mail.test", "description": "Inbox"},
                    {"name": "Calendar", "url": "https://cal.test", "description": "Agenda"}
                ]
            },
            {
                "id": 2,
                "name": "Admin Console",
                "description": "Gated",
                "isProtected": true,
                "passwordHash": hash,
                "links": [
                    {"name": "Router", "url": "https://router.test", "description": "LAN admin"}
                ]
            },
            {
                "id": 3,
                "name": "Home Lab",
                "description": "Also gated",
                "isProtected": true,
                "passwordHash": hash,
                "links": []
            }
        ]
    });
    NavStore::from_json(&seed.to_string())
}

fn app_with_limiter(limiter: Arc<dyn RateLimiter>) -> Result<Router> {
    let state = AppState::new(fixture_store()?, SecretString::from(SECRET))
        .with_limiter(limiter);
    Ok(router(Arc::new(state)))
}

fn app() -> Result<Router> {
    app_with_limiter(Arc::new(NoopRateLimiter))
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .body(Body::empty())
        .expect("request")
}

fn get_with_token(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .expect("request")
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("request")
}

async fn json_body(response: axum::response::Response) -> Result<Value> {
    let bytes = to_bytes(response.into_body(), usize::MAX).await?;
    Ok(serde_json::from_slice(&bytes)?)
}

async fn mint_token(app: &Router, group_id: u32) -> Result<String> {
    let response = app
        .clone()
        .oneshot(post_json(
            "/api/auth/verify",
            json!({"groupId": group_id, "password": PASSWORD}),
        ))
        .await?;
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = to_bytes(response.into_body(), usize::MAX).await?;
    let verified: VerifyResponse = serde_json::from_slice(&bytes)?;
    assert!(verified.success);
    assert_eq!(verified.expires_in, "24h");
    Ok(verified.token)
}

#[tokio::test]
async fn health_reports_running_and_identifies_the_app() -> Result<()> {
    let response = app()?.oneshot(get("/api/health")).await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-app"));

    let body = json_body(response).await?;
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["message"], json!("Server is running"));
    assert!(body["timestamp"].is_string());
    Ok(())
}

#[tokio::test]
async fn catalogue_withholds_protected_links_and_hashes() -> Result<()> {
    let response = app()?.oneshot(get("/api/navigation")).await?;
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = to_bytes(response.into_body(), usize::MAX).await?;
    let raw = String::from_utf8(bytes.to_vec())?;
    assert!(!raw.contains("passwordHash"));
    assert!(!raw.contains("$2a$"));

    let body: Value = serde_json::from_str(&raw)?;
    assert_eq!(body["success"], json!(true));
    let groups = body["groups"].as_array().expect("groups array");
    assert_eq!(groups.len(), 3);
    assert_eq!(groups[0]["links"].as_array().map(Vec::len), Some(2));
    assert_eq!(groups[1]["isProtected"], json!(true));
    assert_eq!(groups[1]["links"].as_array().map(Vec::len), Some(0));
    Ok(())
}

#[tokio::test]
async fn verify_requires_group_id_and_password() -> Result<()> {
    let app = app()?;

    for body in [
        json!({}),
        json!({"groupId": 2}),
        json!({"password": PASSWORD}),
        json!({"groupId": 2, "password": ""}),
    ] {
        let response = app.clone().oneshot(post_json("/api/auth/verify", body)).await?;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let bytes = to_bytes(response.into_body(), usize::MAX).await?;
        let message: ApiMessage = serde_json::from_slice(&bytes)?;
        assert!(!message.success);
        assert_eq!(message.message, "Missing group id or password");
    }
    Ok(())
}

#[tokio::test]
async fn verify_does_not_reveal_which_groups_exist() -> Result<()> {
    let app = app()?;

    // Unknown id and an existing public group answer identically.
    for group_id in [99, 1] {
        let response = app
            .clone()
            .oneshot(post_json(
                "/api/auth/verify",
                json!({"groupId": group_id, "password": PASSWORD}),
            ))
            .await?;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = json_body(response).await?;
        assert_eq!(body["message"], json!("Group not found or not protected"));
    }
    Ok(())
}

#[tokio::test]
async fn verify_rejects_a_wrong_password() -> Result<()> {
    let response = app()?
        .oneshot(post_json(
            "/api/auth/verify",
            json!({"groupId": 2, "password": "not it"}),
        ))
        .await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let body = json_body(response).await?;
    assert_eq!(body["success"], json!(false));
    assert_eq!(body["message"], json!("Invalid password"));
    Ok(())
}

#[tokio::test]
async fn correct_password_unlocks_the_group() -> Result<()> {
    let app = app()?;
    let token = mint_token(&app, 2).await?;

    let response = app
        .oneshot(get_with_token("/api/navigation/protected/2", &token))
        .await?;
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await?;
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["group"]["id"], json!(2));
    assert_eq!(body["group"]["name"], json!("Admin Console"));
    assert_eq!(body["group"]["links"].as_array().map(Vec::len), Some(1));
    Ok(())
}

#[tokio::test]
async fn protected_requires_a_bearer_token() -> Result<()> {
    let response = app()?.oneshot(get("/api/navigation/protected/2")).await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let body = json_body(response).await?;
    assert_eq!(body["message"], json!("Missing access token"));
    Ok(())
}

#[tokio::test]
async fn protected_rejects_a_malformed_token() -> Result<()> {
    let response = app()?
        .oneshot(get_with_token("/api/navigation/protected/2", "not.a.token"))
        .await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let body = json_body(response).await?;
    assert_eq!(body["message"], json!("Invalid access token"));
    Ok(())
}

#[tokio::test]
async fn token_for_one_group_does_not_open_another() -> Result<()> {
    let app = app()?;
    let token = mint_token(&app, 2).await?;

    let response = app
        .oneshot(get_with_token("/api/navigation/protected/3", &token))
        .await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let body = json_body(response).await?;
    assert_eq!(body["message"], json!("Token not valid for this group"));
    Ok(())
}

#[tokio::test]
async fn expired_token_is_rejected() -> Result<()> {
    let app = app()?;

    // Token expired 24 hours ago, signed with the right secret.
    let now = chrono::Utc::now().timestamp();
    let claims = NavClaims {
        v: auth::TOKEN_VERSION,
        gid: 2,
        gname: "Admin Console".to_string(),
        phf: "irrelevant".to_string(),
        iat: now - 2 * auth::TOKEN_TTL_SECONDS,
        exp: now - auth::TOKEN_TTL_SECONDS,
    };
    let token = auth::sign_hs256(SECRET.as_bytes(), &claims)?;

    let response = app
        .oneshot(get_with_token("/api/navigation/protected/2", &token))
        .await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn token_with_a_stale_fingerprint_is_rejected() -> Result<()> {
    let app = app()?;

    // A well-formed token whose fingerprint was minted against a password
    // hash the store no longer holds.
    let now = chrono::Utc::now().timestamp();
    let claims = NavClaims {
        v: auth::TOKEN_VERSION,
        gid: 2,
        gname: "Admin Console".to_string(),
        phf: auth::hash_fingerprint("$2a$04$previouspreviousprevious"),
        iat: now,
        exp: now + auth::TOKEN_TTL_SECONDS,
    };
    let token = auth::sign_hs256(SECRET.as_bytes(), &claims)?;

    let response = app
        .oneshot(get_with_token("/api/navigation/protected/2", &token))
        .await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let body = json_body(response).await?;
    assert_eq!(body["message"], json!("Invalid access token"));
    Ok(())
}

#[tokio::test]
async fn verify_rate_limits_per_caller() -> Result<()> {
    let limiter = Arc::new(MemoryRateLimiter::with_policy(
        Duration::from_secs(60),
        2,
    ));
    let app = app_with_limiter(limiter)?;

    let attempt = |ip: &'static str| {
        let mut request = post_json(
            "/api/auth/verify",
            json!({"groupId": 2, "password": "not it"}),
        );
        request
            .headers_mut()
            .insert("x-forwarded-for", ip.parse().expect("header"));
        request
    };

    for _ in 0..2 {
        let response = app.clone().oneshot(attempt("203.0.113.10")).await?;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    let response = app.clone().oneshot(attempt("203.0.113.10")).await?;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    let body = json_body(response).await?;
    assert_eq!(body["message"], json!("Too many attempts, try again later"));

    // Another caller is unaffected.
    let response = app.clone().oneshot(attempt("198.51.100.7")).await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn failed_attempts_count_against_the_limit_before_success() -> Result<()> {
    let limiter = Arc::new(MemoryRateLimiter::with_policy(
        Duration::from_secs(60),
        3,
    ));
    let app = app_with_limiter(limiter)?;

    for _ in 0..3 {
        let response = app
            .clone()
            .oneshot(post_json(
                "/api/auth/verify",
                json!({"groupId": 2, "password": "not it"}),
            ))
            .await?;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    // Even the correct password is turned away once the window is spent.
    let response = app
        .clone()
        .oneshot(post_json(
            "/api/auth/verify",
            json!({"groupId": 2, "password": PASSWORD}),
        ))
        .await?;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    Ok(())
}
