use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::services::share::IssueShareRequest;

#[derive(Debug, Deserialize)]
pub struct IssueShareTokenRequest {
    pub story_id: Uuid,
    pub expires_at: Option<DateTime<Utc>>,
    pub max_views: Option<i32>,
}

impl From<IssueShareTokenRequest> for IssueShareRequest {
    fn from(req: IssueShareTokenRequest) -> Self {
        Self {
            story_id: req.story_id,
            expires_at: req.expires_at,
            max_views: req.max_views,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ListShareTokensQuery {
    pub story_id: Uuid,
}
