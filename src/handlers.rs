use crate::{
    AppState,
    auth::AdminAccess,
    error::ApiError,
    models::{ApiResponse, Member, MemberPayload, UpsertOutcome},
    validation,
};
use axum::{
    Json,
    extract::{
        Path, State,
        rejection::{JsonRejection, PathRejection},
    },
    http::StatusCode,
};
use serde_json::Value;

type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

// --- Member Handlers ---

/// list_members
///
/// [Admin] Returns every stored member along with the total count.
#[utoipa::path(
    get,
    path = "/api/users",
    responses(
        (status = 200, description = "Envelope with all members in `data` and `count`"),
        (status = 403, description = "Admin privileges required"),
        (status = 500, description = "Storage failure")
    )
)]
pub async fn list_members(
    _admin: AdminAccess,
    State(state): State<AppState>,
) -> ApiResult<Vec<Member>> {
    let members = state.repo.list_members().await?;
    let count = members.len() as u64;
    Ok(Json(ApiResponse::ok(members).with_count(count)))
}

/// get_member
///
/// Looks a member up by exact `user_id`.
#[utoipa::path(
    get,
    path = "/api/users/{id}",
    params(("id" = String, Path, description = "Member user_id")),
    responses(
        (status = 200, description = "Envelope with the member in `data`"),
        (status = 400, description = "Missing id"),
        (status = 404, description = "User not found")
    )
)]
pub async fn get_member(
    State(state): State<AppState>,
    id: Result<Path<String>, PathRejection>,
) -> ApiResult<Member> {
    let user_id = required_id(id)?;
    match state.repo.find_member(&user_id).await? {
        Some(member) => Ok(Json(ApiResponse::ok(member))),
        None => Err(ApiError::NotFound("User not found".to_string())),
    }
}

/// upsert_member
///
/// Creates the member or replaces its `roles` and `nickname`. Answers 201
/// when a new document was inserted, 200 when an existing one was replaced,
/// and echoes the submitted fields either way.
///
/// A duplicate-key error here means another writer inserted the same
/// `user_id` between our match and insert; it is reported as a 400.
#[utoipa::path(
    post,
    path = "/api/users",
    request_body = MemberPayload,
    responses(
        (status = 201, description = "User created"),
        (status = 200, description = "User updated"),
        (status = 400, description = "Validation failure or duplicate user ID")
    )
)]
pub async fn upsert_member(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<MemberPayload>>), ApiError> {
    let Json(body) = body.map_err(|rejection| {
        tracing::debug!(%rejection, "unreadable member body");
        ApiError::InvalidInput("Request body must be valid JSON".to_string())
    })?;
    let payload = validation::validate_member_payload(&body)?;

    let outcome = match state.repo.upsert_member(&payload).await {
        Ok(outcome) => outcome,
        Err(e) if e.is_duplicate_key() => {
            tracing::warn!(user_id = %payload.user_id, "duplicate key on upsert");
            return Err(ApiError::InvalidInput("Duplicate user ID".to_string()));
        }
        Err(e) => return Err(e.into()),
    };

    let (status, message) = match outcome {
        UpsertOutcome::Created => (StatusCode::CREATED, "User created"),
        UpsertOutcome::Updated => (StatusCode::OK, "User updated"),
    };
    tracing::info!(user_id = %payload.user_id, ?outcome, "member upserted");

    Ok((status, Json(ApiResponse::ok(payload).with_message(message))))
}

/// delete_member
///
/// Removes a single member by exact `user_id`.
#[utoipa::path(
    delete,
    path = "/api/users/{id}",
    params(("id" = String, Path, description = "Member user_id")),
    responses(
        (status = 200, description = "User deleted"),
        (status = 400, description = "Missing id"),
        (status = 404, description = "User not found")
    )
)]
pub async fn delete_member(
    State(state): State<AppState>,
    id: Result<Path<String>, PathRejection>,
) -> ApiResult<()> {
    let user_id = required_id(id)?;
    if state.repo.delete_member(&user_id).await? {
        tracing::info!(%user_id, "member deleted");
        Ok(Json(ApiResponse::message("User deleted")))
    } else {
        Err(ApiError::NotFound("User not found".to_string()))
    }
}

/// delete_all_members
///
/// [Admin] Clears the collection and reports how many members were removed.
#[utoipa::path(
    delete,
    path = "/api/users",
    responses(
        (status = 200, description = "All users deleted, `count` holds the number removed"),
        (status = 403, description = "Admin privileges required")
    )
)]
pub async fn delete_all_members(
    _admin: AdminAccess,
    State(state): State<AppState>,
) -> ApiResult<()> {
    let removed = state.repo.delete_all_members().await?;
    tracing::warn!(removed, "all members deleted");
    Ok(Json(ApiResponse::message("All users deleted").with_count(removed)))
}

// --- Service Handlers ---

/// health_check
///
/// Liveness probe. Never authenticated.
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is up"))
)]
pub async fn health_check() -> Json<ApiResponse<()>> {
    Json(ApiResponse::message("ok"))
}

/// Fallback for paths no route matches.
pub async fn route_not_found() -> ApiError {
    ApiError::NotFound("Route not found".to_string())
}

fn required_id(id: Result<Path<String>, PathRejection>) -> Result<String, ApiError> {
    match id {
        Ok(Path(id)) if !id.is_empty() => Ok(id),
        _ => Err(ApiError::InvalidInput("User ID is required".to_string())),
    }
}
