use axum::{
    extract::{FromRef, FromRequestParts, Request, State},
    http::{HeaderMap, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::{config::AppConfig, error::ApiError};

/// Header carrying the shared secret.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Path that is always reachable without a key.
pub const HEALTH_PATH: &str = "/health";

/// Access
///
/// Why the authentication guard let a request through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// The health check, which is never authenticated.
    HealthCheck,
    /// No API key configured outside production: authentication is disabled.
    Insecure,
    /// The presented key matched the configured one.
    Granted,
}

/// authorize_request
///
/// The authentication decision, independent of any HTTP plumbing.
///
/// - `HEALTH_PATH` is always allowed, whatever the header says.
/// - No key configured: production fails closed with `ServerMisconfigured`,
///   any other mode lets the request through.
/// - Key configured: a missing (or empty) header is `Unauthorized`, a
///   different value is `Forbidden`, an exact match proceeds.
pub fn authorize_request(
    config: &AppConfig,
    path: &str,
    presented: Option<&[u8]>,
) -> Result<Access, ApiError> {
    if path == HEALTH_PATH {
        return Ok(Access::HealthCheck);
    }

    let Some(expected) = config.api_key.as_deref() else {
        if config.is_production() {
            tracing::error!("no API_KEY set in production mode, refusing request");
            return Err(ApiError::ServerMisconfigured);
        }
        tracing::warn!("no API_KEY set, authentication disabled");
        return Ok(Access::Insecure);
    };

    match presented {
        None | Some([]) => Err(ApiError::Unauthorized("API key is missing".to_string())),
        Some(key) if key == expected.as_bytes() => Ok(Access::Granted),
        Some(_) => Err(ApiError::Forbidden("Invalid API key".to_string())),
    }
}

/// authorize_admin
///
/// When `ADMIN_API_KEY` is configured the presented primary key must equal it.
/// Without one, anything that got past `authorize_request` counts as admin.
pub fn authorize_admin(config: &AppConfig, presented: Option<&[u8]>) -> Result<(), ApiError> {
    match config.admin_api_key.as_deref() {
        Some(admin_key) if presented != Some(admin_key.as_bytes()) => Err(ApiError::Forbidden(
            "Admin privileges required".to_string(),
        )),
        _ => Ok(()),
    }
}

fn presented_key(headers: &HeaderMap) -> Option<&[u8]> {
    headers.get(API_KEY_HEADER).map(|value| value.as_bytes())
}

/// require_api_key
///
/// Middleware wrapping every member route. Short-circuits with the error
/// envelope when `authorize_request` rejects, otherwise hands the request on.
pub async fn require_api_key(
    State(config): State<AppConfig>,
    request: Request,
    next: Next,
) -> Response {
    let decision = authorize_request(
        &config,
        request.uri().path(),
        presented_key(request.headers()),
    );

    match decision {
        Ok(_) => next.run(request).await,
        Err(rejection) => rejection.into_response(),
    }
}

/// AdminAccess
///
/// Extractor marking a handler as admin-only. Taking it as an argument runs
/// `authorize_admin` before the handler body executes.
#[derive(Debug, Clone, Copy)]
pub struct AdminAccess;

impl<S> FromRequestParts<S> for AdminAccess
where
    S: Send + Sync,
    AppConfig: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let config = AppConfig::from_ref(state);
        authorize_admin(&config, presented_key(&parts.headers))?;
        Ok(AdminAccess)
    }
}
