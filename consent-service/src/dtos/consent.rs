use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::{GrantChanges, Visibility};
use crate::services::registry::GrantRequest;

#[derive(Debug, Deserialize, Validate)]
pub struct GrantConsentRequest {
    pub story_id: Uuid,
    pub site_id: Uuid,
    pub visibility: Visibility,
    /// Omitted means indefinite.
    pub duration_days: Option<i64>,
    #[serde(default)]
    pub featured: bool,
    #[serde(default)]
    #[validate(length(max = 32, message = "At most 32 project tags"))]
    pub project_tags: Vec<String>,
}

impl From<GrantConsentRequest> for GrantRequest {
    fn from(req: GrantConsentRequest) -> Self {
        Self {
            story_id: req.story_id,
            site_id: req.site_id,
            visibility: req.visibility,
            duration_days: req.duration_days,
            featured: req.featured,
            project_tags: req.project_tags,
        }
    }
}

/// Fields left out keep their current value.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateConsentRequest {
    pub story_id: Uuid,
    pub site_id: Uuid,
    pub visibility: Option<Visibility>,
    pub featured: Option<bool>,
    #[validate(length(max = 32, message = "At most 32 project tags"))]
    pub project_tags: Option<Vec<String>>,
}

impl UpdateConsentRequest {
    pub fn changes(&self) -> GrantChanges {
        GrantChanges {
            visibility: self.visibility,
            featured: self.featured,
            project_tags: self.project_tags.clone(),
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct RevokeConsentRequest {
    pub story_id: Uuid,
    pub site_id: Uuid,
    #[validate(length(max = 500, message = "Reason is too long"))]
    pub reason: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RevokeResponse {
    pub revoked: bool,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RevokeAllConsentRequest {
    pub story_id: Uuid,
    #[validate(length(max = 500, message = "Reason is too long"))]
    pub reason: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RevokeAllResponse {
    pub revoked_count: usize,
    pub visibility_ids: Vec<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    pub story_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct RecordViewRequest {
    pub story_id: Uuid,
    pub site_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct RecordViewResponse {
    pub counted: bool,
}
