use axum::{
    Router,
    extract::FromRef,
    http::HeaderName,
    middleware,
};
use utoipa::OpenApi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

pub mod auth;
pub mod config;
pub mod database;
pub mod error;
pub mod handlers;
pub mod models;
pub mod repository;
pub mod validation;

// Route tables, split by access level (public docs vs. key-guarded members).
pub mod routes;
use routes::{members, public};

// --- Public Re-exports ---

pub use config::{AppConfig, Env};
pub use database::{MongoGateway, MongoSettings};
pub use error::{ApiError, RepositoryError};
pub use repository::{
    InMemoryMemberRepository, MemberRepository, MongoMemberRepository, RepositoryState,
};

/// ApiDoc
///
/// OpenAPI document for the member service, served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::list_members, handlers::get_member, handlers::upsert_member,
        handlers::delete_member, handlers::delete_all_members, handlers::health_check
    ),
    components(schemas(models::Member, models::MemberPayload)),
    tags(
        (name = "member-service", description = "Member registry API")
    )
)]
pub struct ApiDoc;

/// AppState
///
/// The single, cheaply clonable container shared by every request.
#[derive(Clone)]
pub struct AppState {
    /// Persistence layer (MongoDB in production, in-memory in tests).
    pub repo: RepositoryState,
    /// The loaded, immutable environment configuration.
    pub config: AppConfig,
}

// --- Axum FromRef Extractor Implementations ---

// Lets guards and handlers pull just the piece of state they need.

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// create_router
///
/// Assembles the routing table, the API key guard and the observability layers.
///
/// Request pipeline: request id -> trace span -> API key guard -> (admin
/// extractor / validator inside the handler) -> repository.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");

    let base_router = Router::new()
        .merge(public::public_routes())
        // The guard wraps every member route and the fallback. It lets the
        // health probe through on its own.
        .merge(members::member_routes().layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_api_key,
        )))
        .with_state(state);

    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(
                    x_request_id.clone(),
                    MakeRequestUuid,
                ))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// Opens the per-request span, tagged with the `x-request-id` so every log line
/// of one request can be correlated.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
