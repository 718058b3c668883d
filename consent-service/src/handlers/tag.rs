//! Face tag consent handlers.

use axum::{
    extract::{Json, State},
    http::StatusCode,
};

use crate::dtos::{FaceTagResponse, ProposeTagRequest, RemoveTagRequest, RespondTagRequest};
use crate::models::Requester;
use crate::AppState;
use service_core::error::AppError;

/// POST /tag/propose
#[tracing::instrument(skip(state, req), fields(media_id = %req.media_id, user_id = %requester.user_id))]
pub async fn propose(
    State(state): State<AppState>,
    requester: Requester,
    Json(req): Json<ProposeTagRequest>,
) -> Result<(StatusCode, Json<FaceTagResponse>), AppError> {
    let tag = state.tags.propose(req.into(), &requester).await?;
    Ok((StatusCode::CREATED, Json(tag.into())))
}

/// PATCH /tag/respond
#[tracing::instrument(skip(state, req), fields(face_id = %req.face_id, user_id = %requester.user_id))]
pub async fn respond(
    State(state): State<AppState>,
    requester: Requester,
    Json(req): Json<RespondTagRequest>,
) -> Result<Json<FaceTagResponse>, AppError> {
    let tag = state
        .tags
        .respond(req.face_id, &requester, req.consent, req.can_be_public)
        .await?;
    Ok(Json(tag.into()))
}

/// DELETE /tag/remove
#[tracing::instrument(skip(state, req), fields(face_id = %req.face_id, user_id = %requester.user_id))]
pub async fn remove(
    State(state): State<AppState>,
    requester: Requester,
    Json(req): Json<RemoveTagRequest>,
) -> Result<StatusCode, AppError> {
    state.tags.untag(req.face_id, &requester).await?;
    Ok(StatusCode::NO_CONTENT)
}
