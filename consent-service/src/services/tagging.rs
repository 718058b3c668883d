//! Two-party tag consent for face-to-person links.
//!
//! The uploader (or an admin) proposes; only the tagged person can accept or
//! refuse, and the proposer is never that person. Untagging is always possible
//! for either side.

use service_core::error::AppError;
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

use super::clock::Clock;
use super::metrics;
use super::store::{audit, ConsentStore};
use crate::models::{
    AuditEvent, AuditEventType, FaceLocation, FaceTag, FaceTagStatus, MediaAsset, Requester,
};

#[derive(Debug, Clone)]
pub struct ProposeTagRequest {
    pub media_id: Uuid,
    pub face_id: Option<Uuid>,
    pub location: Option<FaceLocation>,
    pub person_id: Uuid,
}

#[derive(Clone)]
pub struct TagConsent {
    store: Arc<dyn ConsentStore>,
    clock: Arc<dyn Clock>,
}

impl TagConsent {
    pub fn new(store: Arc<dyn ConsentStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    async fn media(&self, media_id: Uuid) -> Result<MediaAsset, AppError> {
        self.store
            .get_media(media_id)
            .await?
            .ok_or_else(|| AppError::not_found("Media not found"))
    }

    async fn face(&self, face_id: Uuid) -> Result<FaceTag, AppError> {
        self.store
            .find_face_tag(face_id)
            .await?
            .ok_or_else(|| AppError::not_found("Face not found"))
    }

    #[instrument(skip(self, request), fields(media_id = %request.media_id, proposer = %proposer.user_id))]
    pub async fn propose(
        &self,
        request: ProposeTagRequest,
        proposer: &Requester,
    ) -> Result<FaceTag, AppError> {
        let media = self.media(request.media_id).await?;
        if media.uploader_id != proposer.user_id && !proposer.is_admin {
            return Err(AppError::forbidden(
                "Only the uploader or an admin can propose a tag",
            ));
        }
        if request.person_id == proposer.user_id {
            return Err(AppError::forbidden(
                "A tag needs the consent of someone other than the proposer",
            ));
        }

        let now = self.clock.now();
        let (mut tag, is_new) = match request.face_id {
            Some(face_id) => {
                let tag = self.face(face_id).await?;
                if tag.media_id != request.media_id {
                    return Err(AppError::not_found("Face not found on this media"));
                }
                if tag.status() == FaceTagStatus::Linked {
                    return Err(AppError::conflict(
                        "Face is already linked; untag it before proposing a new person",
                    ));
                }
                (tag, false)
            }
            None => {
                let location = request
                    .location
                    .ok_or_else(|| AppError::invalid("location is required for a new face"))?;
                if location.width <= 0 || location.height <= 0 {
                    return Err(AppError::invalid("Face width and height must be positive"));
                }
                (FaceTag::detected(request.media_id, location, now), true)
            }
        };

        tag.propose(request.person_id, proposer.user_id, now);
        if is_new {
            self.store.insert_face_tag(&tag).await?;
        } else {
            self.store.update_face_tag(&tag).await?;
        }

        audit(
            self.store.as_ref(),
            AuditEvent::user_action(
                proposer.user_id,
                AuditEventType::TagProposed,
                "face_tag",
                tag.face_id,
                Some(serde_json::json!({ "person_id": request.person_id })),
                now,
            ),
        )
        .await;
        metrics::record_tag_transition(FaceTagStatus::PendingConsent.as_str());

        tracing::info!(face_id = %tag.face_id, "Tag proposed");
        Ok(tag)
    }

    /// The tagged person's answer. Nobody else may answer, admins included.
    #[instrument(skip(self), fields(person = %person.user_id))]
    pub async fn respond(
        &self,
        face_id: Uuid,
        person: &Requester,
        consent: bool,
        can_be_public: Option<bool>,
    ) -> Result<FaceTag, AppError> {
        let mut tag = self.face(face_id).await?;

        if tag.person_id != Some(person.user_id) {
            tracing::warn!(face_id = %face_id, "Tag response from someone other than the tagged person");
            return Err(AppError::forbidden(
                "Only the tagged person can respond to this tag",
            ));
        }
        if tag.proposed_by == Some(person.user_id) {
            tracing::warn!(face_id = %face_id, "Proposer attempted to answer their own tag");
            return Err(AppError::forbidden(
                "The proposer cannot consent on behalf of the tagged person",
            ));
        }
        if tag.status() != FaceTagStatus::PendingConsent {
            return Err(AppError::conflict(format!(
                "Tag is {}, not awaiting consent",
                tag.status().as_str()
            )));
        }

        let now = self.clock.now();
        tag.respond(consent, can_be_public, now);
        self.store.update_face_tag(&tag).await?;

        audit(
            self.store.as_ref(),
            AuditEvent::user_action(
                person.user_id,
                AuditEventType::TagResponded,
                "face_tag",
                face_id,
                Some(serde_json::json!({
                    "consent": consent,
                    "can_be_public": tag.can_be_public,
                })),
                now,
            ),
        )
        .await;
        metrics::record_tag_transition(tag.status().as_str());

        tracing::info!(face_id = %face_id, status = tag.status().as_str(), "Tag response recorded");
        Ok(tag)
    }

    /// Reset to an anonymous detection from any state.
    #[instrument(skip(self), fields(requester = %requester.user_id))]
    pub async fn untag(&self, face_id: Uuid, requester: &Requester) -> Result<(), AppError> {
        let mut tag = self.face(face_id).await?;

        let is_tagged_person = tag.person_id == Some(requester.user_id);
        if !requester.is_admin && !is_tagged_person {
            let media = self.media(tag.media_id).await?;
            if media.uploader_id != requester.user_id {
                return Err(AppError::forbidden(
                    "Only the uploader, an admin or the tagged person can remove a tag",
                ));
            }
        }

        let now = self.clock.now();
        let previous = tag.status();
        tag.untag(now);
        self.store.update_face_tag(&tag).await?;

        audit(
            self.store.as_ref(),
            AuditEvent::user_action(
                requester.user_id,
                AuditEventType::TagRemoved,
                "face_tag",
                face_id,
                Some(serde_json::json!({ "previous_status": previous.as_str() })),
                now,
            ),
        )
        .await;
        metrics::record_tag_transition(FaceTagStatus::Detected.as_str());

        tracing::info!(face_id = %face_id, "Tag removed");
        Ok(())
    }
}
