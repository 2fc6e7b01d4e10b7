use crate::{AppState, ApiDoc};
use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Public Router Module
///
/// Endpoints reachable without an API key. Only the generated API
/// documentation lives here; it exposes no member data.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /swagger-ui, GET /api-docs/openapi.json
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
