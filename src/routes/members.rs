use crate::{AppState, auth::HEALTH_PATH, handlers};
use axum::{Router, routing::get};

/// Resource root for member records.
pub const MEMBERS_PATH: &str = "/api/users";

/// Member Router Module
///
/// Every route here sits behind `auth::require_api_key`. The guard itself lets
/// `HEALTH_PATH` through, so the probe can share this router.
///
/// Admin-only operations (list-all, delete-all) take the `AdminAccess`
/// extractor, so the admin check runs inside the handler's argument list.
pub fn member_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness probe for load balancers; bypasses the key check.
        .route(HEALTH_PATH, get(handlers::health_check))
        // GET    /api/users  list all (admin)
        // POST   /api/users  create or update by user_id
        // DELETE /api/users  delete all (admin)
        .route(
            MEMBERS_PATH,
            get(handlers::list_members)
                .post(handlers::upsert_member)
                .delete(handlers::delete_all_members),
        )
        // GET    /api/users/{id}  fetch one
        // DELETE /api/users/{id}  delete one
        .route(
            "/api/users/{id}",
            get(handlers::get_member).delete(handlers::delete_member),
        )
        // Unknown paths still go through the guard, then answer with a 404 envelope.
        .fallback(handlers::route_not_found)
}
