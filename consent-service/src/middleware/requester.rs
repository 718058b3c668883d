use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use service_core::error::AppError;
use uuid::Uuid;

use crate::models::Requester;

pub const USER_ID_HEADER: &str = "X-User-ID";
pub const USER_ROLE_HEADER: &str = "X-User-Role";

/// Requester extractor.
///
/// The gateway in front of this service authenticates the user and forwards
/// `X-User-ID`, plus `X-User-Role: admin` for administrators or
/// `X-User-Role: service` for internal callers. This service
/// trusts those headers and performs no authentication of its own.
#[async_trait]
impl<S> FromRequestParts<S> for Requester
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::unauthorized("Missing X-User-ID header"))?;

        let user_id = Uuid::parse_str(user_id.trim())
            .map_err(|_| AppError::unauthorized("Malformed X-User-ID header"))?;

        let role = parts
            .headers
            .get(USER_ROLE_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .unwrap_or_default();

        tracing::Span::current().record("user_id", tracing::field::display(user_id));

        Ok(Requester {
            user_id,
            is_admin: role.eq_ignore_ascii_case("admin"),
            is_service: role.eq_ignore_ascii_case("service"),
        })
    }
}
