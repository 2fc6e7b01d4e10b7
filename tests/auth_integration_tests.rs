use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use member_service::{
    AppConfig, AppState, ApiError, Env, InMemoryMemberRepository, create_router,
    auth::{Access, authorize_admin, authorize_request},
};
use serde_json::Value;
use std::sync::Arc;
use tower::util::ServiceExt;

// --- Configuration Fixtures ---

fn keyed_config() -> AppConfig {
    AppConfig {
        api_key: Some("secret-key".to_string()),
        ..AppConfig::default()
    }
}

fn production_without_key() -> AppConfig {
    AppConfig {
        env: Env::Production,
        api_key: None,
        ..AppConfig::default()
    }
}

fn app(config: AppConfig) -> Router {
    create_router(AppState {
        repo: Arc::new(InMemoryMemberRepository::new()),
        config,
    })
}

async fn call(app: &Router, method: &str, uri: &str, api_key: Option<&str>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(key) = api_key {
        builder = builder.header("x-api-key", key);
    }
    let response = app
        .clone()
        .oneshot(builder.body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

// --- authorize_request ---

#[test]
fn test_missing_key_is_unauthorized() {
    let result = authorize_request(&keyed_config(), "/api/users", None);
    assert!(matches!(result, Err(ApiError::Unauthorized(_))));
}

#[test]
fn test_empty_key_counts_as_missing() {
    let result = authorize_request(&keyed_config(), "/api/users", Some("".as_bytes()));
    assert!(matches!(result, Err(ApiError::Unauthorized(_))));
}

#[test]
fn test_wrong_key_is_forbidden() {
    let result = authorize_request(&keyed_config(), "/api/users", Some("secret-key ".as_bytes()));
    assert!(matches!(result, Err(ApiError::Forbidden(_))));
}

#[test]
fn test_matching_key_is_granted() {
    let result = authorize_request(&keyed_config(), "/api/users", Some("secret-key".as_bytes()));
    assert_eq!(result.unwrap(), Access::Granted);
}

#[test]
fn test_health_bypasses_every_check() {
    for config in [keyed_config(), production_without_key()] {
        assert_eq!(
            authorize_request(&config, "/health", Some("wrong".as_bytes())).unwrap(),
            Access::HealthCheck
        );
        assert_eq!(
            authorize_request(&config, "/health", None).unwrap(),
            Access::HealthCheck
        );
    }
}

#[test]
fn test_no_key_in_production_fails_closed() {
    let result = authorize_request(&production_without_key(), "/api/users", Some("anything".as_bytes()));
    assert!(matches!(result, Err(ApiError::ServerMisconfigured)));
}

#[test]
fn test_no_key_outside_production_is_open() {
    let result = authorize_request(&AppConfig::default(), "/api/users", None);
    assert_eq!(result.unwrap(), Access::Insecure);
}

// --- authorize_admin ---

#[test]
fn test_admin_key_must_match_when_configured() {
    let config = AppConfig {
        api_key: Some("secret-key".to_string()),
        admin_api_key: Some("admin-key".to_string()),
        ..AppConfig::default()
    };

    assert!(matches!(
        authorize_admin(&config, Some("secret-key".as_bytes())),
        Err(ApiError::Forbidden(_))
    ));
    assert!(matches!(authorize_admin(&config, None), Err(ApiError::Forbidden(_))));
    assert!(authorize_admin(&config, Some("admin-key".as_bytes())).is_ok());
}

#[test]
fn test_without_admin_key_everyone_authenticated_is_admin() {
    assert!(authorize_admin(&keyed_config(), Some("secret-key".as_bytes())).is_ok());
    assert!(authorize_admin(&AppConfig::default(), None).is_ok());
}

// --- Router-level behaviour ---

#[tokio::test]
async fn test_router_rejects_missing_key_with_envelope() {
    let app = app(keyed_config());
    let (status, body) = call(&app, "GET", "/api/users/1", None).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "API key is missing");
}

#[tokio::test]
async fn test_router_rejects_wrong_key() {
    let app = app(keyed_config());
    let (status, body) = call(&app, "GET", "/api/users/1", Some("nope")).await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "Invalid API key");
}

#[tokio::test]
async fn test_router_lets_correct_key_through() {
    let app = app(keyed_config());
    // Passing the guard reaches the handler, which reports the missing member.
    let (status, body) = call(&app, "GET", "/api/users/1", Some("secret-key")).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "User not found");
}

#[tokio::test]
async fn test_router_health_needs_no_key() {
    let app = app(keyed_config());

    let (status, body) = call(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    let (status, _) = call(&app, "GET", "/health", Some("wrong")).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_router_production_without_key_returns_500() {
    let app = app(production_without_key());

    let (status, body) = call(&app, "GET", "/api/users", Some("whatever")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["message"], "Server configuration error");

    let (status, _) = call(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_router_unknown_path_is_still_guarded() {
    let app = app(keyed_config());

    let (status, _) = call(&app, "GET", "/nowhere", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = call(&app, "GET", "/nowhere", Some("secret-key")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Route not found");
}

#[tokio::test]
async fn test_router_admin_routes_need_admin_key() {
    let app = app(AppConfig {
        api_key: Some("secret-key".to_string()),
        admin_api_key: Some("admin-key".to_string()),
        ..AppConfig::default()
    });

    let (status, body) = call(&app, "GET", "/api/users", Some("secret-key")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "Admin privileges required");

    let (status, _) = call(&app, "DELETE", "/api/users", Some("secret-key")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // The admin key alone does not pass the primary guard.
    let (status, _) = call(&app, "GET", "/api/users", Some("admin-key")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_router_admin_key_equal_to_primary_key() {
    let app = app(AppConfig {
        api_key: Some("shared".to_string()),
        admin_api_key: Some("shared".to_string()),
        ..AppConfig::default()
    });

    let (status, body) = call(&app, "GET", "/api/users", Some("shared")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 0);
}

#[tokio::test]
async fn test_request_id_is_propagated() {
    let app = app(keyed_config());
    let response = app
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert!(response.headers().contains_key("x-request-id"));
}
