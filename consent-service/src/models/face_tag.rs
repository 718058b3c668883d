//! Face tag model - two-party consent for linking a detected face to a person.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Tag states. `detected -> pending_consent -> linked | rejected`, and any
/// state returns to `detected` on untag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaceTagStatus {
    Detected,
    PendingConsent,
    Linked,
    Rejected,
}

impl FaceTagStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FaceTagStatus::Detected => "detected",
            FaceTagStatus::PendingConsent => "pending_consent",
            FaceTagStatus::Linked => "linked",
            FaceTagStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "pending_consent" => FaceTagStatus::PendingConsent,
            "linked" => FaceTagStatus::Linked,
            "rejected" => FaceTagStatus::Rejected,
            _ => FaceTagStatus::Detected,
        }
    }
}

/// Face rectangle within the media item, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaceLocation {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

#[derive(Debug, Clone, FromRow)]
pub struct FaceTag {
    pub face_id: Uuid,
    pub media_id: Uuid,
    pub face_x: i32,
    pub face_y: i32,
    pub face_width: i32,
    pub face_height: i32,
    pub person_id: Option<Uuid>,
    pub status_code: String,
    pub proposed_by: Option<Uuid>,
    pub uploader_consent_at: Option<DateTime<Utc>>,
    pub person_consent_at: Option<DateTime<Utc>>,
    pub recognition_consent_granted: bool,
    pub can_be_public: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FaceTag {
    /// A fresh, unlinked detection.
    pub fn detected(media_id: Uuid, location: FaceLocation, now: DateTime<Utc>) -> Self {
        Self {
            face_id: Uuid::new_v4(),
            media_id,
            face_x: location.x,
            face_y: location.y,
            face_width: location.width,
            face_height: location.height,
            person_id: None,
            status_code: FaceTagStatus::Detected.as_str().to_string(),
            proposed_by: None,
            uploader_consent_at: None,
            person_consent_at: None,
            recognition_consent_granted: false,
            can_be_public: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn status(&self) -> FaceTagStatus {
        FaceTagStatus::parse(&self.status_code)
    }

    pub fn location(&self) -> FaceLocation {
        FaceLocation {
            x: self.face_x,
            y: self.face_y,
            width: self.face_width,
            height: self.face_height,
        }
    }

    /// Uploader side of the handshake. Clears any earlier answer.
    pub fn propose(&mut self, person_id: Uuid, proposer: Uuid, now: DateTime<Utc>) {
        self.person_id = Some(person_id);
        self.proposed_by = Some(proposer);
        self.status_code = FaceTagStatus::PendingConsent.as_str().to_string();
        self.uploader_consent_at = Some(now);
        self.person_consent_at = None;
        self.recognition_consent_granted = false;
        self.can_be_public = false;
        self.updated_at = now;
    }

    /// Tagged person's answer. Only valid from `pending_consent`.
    pub fn respond(&mut self, consent: bool, can_be_public: Option<bool>, now: DateTime<Utc>) {
        if consent {
            self.status_code = FaceTagStatus::Linked.as_str().to_string();
            self.recognition_consent_granted = true;
            self.can_be_public = can_be_public.unwrap_or(false);
        } else {
            self.status_code = FaceTagStatus::Rejected.as_str().to_string();
            self.recognition_consent_granted = false;
            self.can_be_public = false;
        }
        self.person_consent_at = Some(now);
        self.updated_at = now;
    }

    /// Back to an anonymous detection, from any state.
    pub fn untag(&mut self, now: DateTime<Utc>) {
        self.status_code = FaceTagStatus::Detected.as_str().to_string();
        self.person_id = None;
        self.proposed_by = None;
        self.uploader_consent_at = None;
        self.person_consent_at = None;
        self.recognition_consent_granted = false;
        self.can_be_public = false;
        self.updated_at = now;
    }
}
