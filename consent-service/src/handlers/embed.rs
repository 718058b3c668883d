//! Syndication consent and embed handlers.

use axum::{
    extract::{Json, Path, Query, State},
    http::{header, HeaderMap, StatusCode},
};
use uuid::Uuid;
use validator::Validate;

use crate::dtos::{EmbedQuery, IssueEmbedTokenRequest, RevokeResponse, SetSyndicationRequest};
use crate::models::Requester;
use crate::services::syndication::{
    EmbedPayload, IssuedEmbedToken, SyndicationConsentSummary, SyndicationDecision,
};
use crate::AppState;
use service_core::error::AppError;

/// PUT /syndication/:gallery_id/sites/:site_id
#[tracing::instrument(skip(state, req), fields(user_id = %requester.user_id))]
pub async fn set_consent(
    State(state): State<AppState>,
    requester: Requester,
    Path((gallery_id, site_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<SetSyndicationRequest>,
) -> Result<Json<SyndicationConsentSummary>, AppError> {
    let decision = SyndicationDecision {
        gallery_id,
        site_id,
        status: req.status,
        allow_full_resolution: req.allow_full_resolution,
        allow_download: req.allow_download,
        allow_embedding: req.allow_embedding,
    };
    let consent = state.syndication.set_consent(decision, &requester).await?;
    Ok(Json(consent))
}

/// POST /embed/tokens
#[tracing::instrument(
    skip(state, req),
    fields(gallery_id = %req.gallery_id, site_id = %req.site_id, user_id = %requester.user_id)
)]
pub async fn issue(
    State(state): State<AppState>,
    requester: Requester,
    Json(req): Json<IssueEmbedTokenRequest>,
) -> Result<(StatusCode, Json<IssuedEmbedToken>), AppError> {
    req.validate()?;
    let issued = state.syndication.issue_token(req.into(), &requester).await?;
    Ok((StatusCode::CREATED, Json(issued)))
}

/// DELETE /embed/tokens/:token_id
#[tracing::instrument(skip(state), fields(user_id = %requester.user_id))]
pub async fn revoke(
    State(state): State<AppState>,
    requester: Requester,
    Path(token_id): Path<Uuid>,
) -> Result<Json<RevokeResponse>, AppError> {
    let revoked = state.syndication.revoke_token(token_id, &requester).await?;
    Ok(Json(RevokeResponse { revoked }))
}

/// GET /embed/:gallery_id?token=
///
/// Public. The requesting origin comes from `Origin`, else `Referer`.
#[tracing::instrument(skip(state, headers, query))]
pub async fn resolve(
    State(state): State<AppState>,
    Path(gallery_id): Path<Uuid>,
    Query(query): Query<EmbedQuery>,
    headers: HeaderMap,
) -> Result<Json<EmbedPayload>, AppError> {
    let origin = headers
        .get(header::ORIGIN)
        .or_else(|| headers.get(header::REFERER))
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty() && *v != "null");

    let payload = state
        .syndication
        .resolve(gallery_id, &query.token, origin)
        .await?;
    Ok(Json(payload))
}
