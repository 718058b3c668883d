//! Existence-then-ownership checks shared by the domain services.
//!
//! Existence is checked first so that a missing record reports `NotFound`
//! regardless of who asks.

use service_core::error::AppError;
use uuid::Uuid;

use super::store::Directory;
use crate::models::{Gallery, Requester, Site, Story};

pub async fn owned_story<D: Directory + ?Sized>(
    directory: &D,
    story_id: Uuid,
    requester: &Requester,
) -> Result<Story, AppError> {
    let story = directory
        .get_story(story_id)
        .await?
        .ok_or_else(|| AppError::not_found("Story not found"))?;

    if story.owner_id != requester.user_id {
        tracing::warn!(
            story_id = %story_id,
            requester = %requester.user_id,
            "Requester does not own story"
        );
        return Err(AppError::forbidden("Only the story owner can do this"));
    }
    Ok(story)
}

pub async fn owned_gallery<D: Directory + ?Sized>(
    directory: &D,
    gallery_id: Uuid,
    requester: &Requester,
) -> Result<Gallery, AppError> {
    let gallery = directory
        .get_gallery(gallery_id)
        .await?
        .ok_or_else(|| AppError::not_found("Gallery not found"))?;

    if gallery.owner_id != requester.user_id {
        tracing::warn!(
            gallery_id = %gallery_id,
            requester = %requester.user_id,
            "Requester does not own gallery"
        );
        return Err(AppError::forbidden("Only the gallery owner can do this"));
    }
    Ok(gallery)
}

pub async fn existing_site<D: Directory + ?Sized>(
    directory: &D,
    site_id: Uuid,
) -> Result<Site, AppError> {
    directory
        .get_site(site_id)
        .await?
        .ok_or_else(|| AppError::not_found("Site not found"))
}
