//! Share token handlers.

use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
};
use uuid::Uuid;

use crate::dtos::{IssueShareTokenRequest, ListShareTokensQuery, RevokeResponse};
use crate::models::Requester;
use crate::services::share::{IssuedShareToken, ShareTokenSummary, ShareValidation};
use crate::AppState;
use service_core::error::AppError;

/// POST /share/tokens
#[tracing::instrument(skip(state, req), fields(story_id = %req.story_id, user_id = %requester.user_id))]
pub async fn issue(
    State(state): State<AppState>,
    requester: Requester,
    Json(req): Json<IssueShareTokenRequest>,
) -> Result<(StatusCode, Json<IssuedShareToken>), AppError> {
    let issued = state.shares.issue(req.into(), &requester).await?;
    Ok((StatusCode::CREATED, Json(issued)))
}

/// GET /share/tokens?story_id=
#[tracing::instrument(skip(state), fields(user_id = %requester.user_id))]
pub async fn list(
    State(state): State<AppState>,
    requester: Requester,
    Query(query): Query<ListShareTokensQuery>,
) -> Result<Json<Vec<ShareTokenSummary>>, AppError> {
    let tokens = state.shares.list(query.story_id, &requester).await?;
    Ok(Json(tokens))
}

/// DELETE /share/tokens/:token_id
#[tracing::instrument(skip(state), fields(user_id = %requester.user_id))]
pub async fn revoke(
    State(state): State<AppState>,
    requester: Requester,
    Path(token_id): Path<Uuid>,
) -> Result<Json<RevokeResponse>, AppError> {
    let revoked = state.shares.revoke(token_id, &requester).await?;
    Ok(Json(RevokeResponse { revoked }))
}

/// GET /share/:token
///
/// Public. Always 200; a refused token carries `valid: false` and a reason.
#[tracing::instrument(skip_all)]
pub async fn validate(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Json<ShareValidation>, AppError> {
    let validation = state.shares.validate_and_consume(&token).await?;
    Ok(Json(validation))
}
