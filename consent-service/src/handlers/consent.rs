//! Consent registry handlers.

use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
};
use validator::Validate;

use crate::dtos::{
    GrantConsentRequest, RecordViewRequest, RecordViewResponse, RevokeAllConsentRequest,
    RevokeAllResponse, RevokeConsentRequest, RevokeResponse, StatusQuery, UpdateConsentRequest,
};
use crate::models::Requester;
use crate::services::registry::{GrantOutcome, GrantSummary, SiteStory, StatusSummary};
use uuid::Uuid;
use crate::AppState;
use service_core::error::AppError;

/// POST /consent/grant
#[tracing::instrument(
    skip(state, req),
    fields(story_id = %req.story_id, site_id = %req.site_id, user_id = %requester.user_id)
)]
pub async fn grant(
    State(state): State<AppState>,
    requester: Requester,
    Json(req): Json<GrantConsentRequest>,
) -> Result<(StatusCode, Json<GrantOutcome>), AppError> {
    req.validate()?;
    let outcome = state.registry.grant(req.into(), &requester).await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

/// PATCH /consent/grant
#[tracing::instrument(
    skip(state, req),
    fields(story_id = %req.story_id, site_id = %req.site_id, user_id = %requester.user_id)
)]
pub async fn update(
    State(state): State<AppState>,
    requester: Requester,
    Json(req): Json<UpdateConsentRequest>,
) -> Result<Json<GrantSummary>, AppError> {
    req.validate()?;
    let summary = state
        .registry
        .update(req.story_id, req.site_id, req.changes(), &requester)
        .await?;
    Ok(Json(summary))
}

/// DELETE /consent/revoke
#[tracing::instrument(
    skip(state, req),
    fields(story_id = %req.story_id, site_id = %req.site_id, user_id = %requester.user_id)
)]
pub async fn revoke(
    State(state): State<AppState>,
    requester: Requester,
    Json(req): Json<RevokeConsentRequest>,
) -> Result<Json<RevokeResponse>, AppError> {
    req.validate()?;
    let revoked = state
        .registry
        .revoke(req.story_id, req.site_id, &requester, req.reason)
        .await?;
    Ok(Json(RevokeResponse { revoked }))
}

/// DELETE /consent/revoke-all
#[tracing::instrument(skip(state, req), fields(story_id = %req.story_id, user_id = %requester.user_id))]
pub async fn revoke_all(
    State(state): State<AppState>,
    requester: Requester,
    Json(req): Json<RevokeAllConsentRequest>,
) -> Result<Json<RevokeAllResponse>, AppError> {
    req.validate()?;
    let visibility_ids = state
        .registry
        .revoke_all(req.story_id, &requester, req.reason)
        .await?;
    Ok(Json(RevokeAllResponse {
        revoked_count: visibility_ids.len(),
        visibility_ids,
    }))
}

/// GET /consent/status?story_id=
#[tracing::instrument(skip(state), fields(user_id = %requester.user_id))]
pub async fn status(
    State(state): State<AppState>,
    requester: Requester,
    Query(query): Query<StatusQuery>,
) -> Result<Json<StatusSummary>, AppError> {
    let summary = state.registry.status(query.story_id, &requester).await?;
    Ok(Json(summary))
}

/// GET /consent/sites/:site_id/stories
#[tracing::instrument(skip(state), fields(user_id = %requester.user_id))]
pub async fn site_stories(
    State(state): State<AppState>,
    requester: Requester,
    Path(site_id): Path<Uuid>,
) -> Result<Json<Vec<SiteStory>>, AppError> {
    let stories = state.registry.stories_for_site(site_id, &requester).await?;
    Ok(Json(stories))
}

/// POST /consent/views
///
/// Called by the rendering service each time a site displays a story.
#[tracing::instrument(
    skip(state, req),
    fields(story_id = %req.story_id, site_id = %req.site_id, user_id = %requester.user_id)
)]
pub async fn record_view(
    State(state): State<AppState>,
    requester: Requester,
    Json(req): Json<RecordViewRequest>,
) -> Result<Json<RecordViewResponse>, AppError> {
    let counted = state
        .registry
        .record_view(req.story_id, req.site_id, &requester)
        .await?;
    Ok(Json(RecordViewResponse { counted }))
}
