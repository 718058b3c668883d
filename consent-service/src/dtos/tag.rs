use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{FaceLocation, FaceTag, FaceTagStatus};

#[derive(Debug, Deserialize)]
pub struct ProposeTagRequest {
    pub media_id: Uuid,
    /// Existing detection to tag; a new one is created from `location` when absent.
    pub face_id: Option<Uuid>,
    pub location: Option<FaceLocation>,
    pub person_id: Uuid,
}

impl From<ProposeTagRequest> for crate::services::tagging::ProposeTagRequest {
    fn from(req: ProposeTagRequest) -> Self {
        Self {
            media_id: req.media_id,
            face_id: req.face_id,
            location: req.location,
            person_id: req.person_id,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RespondTagRequest {
    pub face_id: Uuid,
    pub consent: bool,
    pub can_be_public: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct RemoveTagRequest {
    pub face_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct FaceTagResponse {
    pub face_id: Uuid,
    pub media_id: Uuid,
    pub location: FaceLocation,
    pub person_id: Option<Uuid>,
    pub status: FaceTagStatus,
    pub uploader_consent_at: Option<DateTime<Utc>>,
    pub person_consent_at: Option<DateTime<Utc>>,
    pub recognition_consent_granted: bool,
    pub can_be_public: bool,
    pub updated_at: DateTime<Utc>,
}

impl From<FaceTag> for FaceTagResponse {
    fn from(tag: FaceTag) -> Self {
        Self {
            location: tag.location(),
            status: tag.status(),
            face_id: tag.face_id,
            media_id: tag.media_id,
            person_id: tag.person_id,
            uploader_consent_at: tag.uploader_consent_at,
            person_consent_at: tag.person_consent_at,
            recognition_consent_granted: tag.recognition_consent_granted,
            can_be_public: tag.can_be_public,
            updated_at: tag.updated_at,
        }
    }
}
