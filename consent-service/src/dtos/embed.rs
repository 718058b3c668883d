use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::models::{EmbedDisplay, EmbedLayout, EmbedTheme, SyndicationStatus};
use crate::services::syndication::IssueEmbedRequest;

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct SetSyndicationRequest {
    pub status: SyndicationStatus,
    #[serde(default)]
    pub allow_full_resolution: bool,
    #[serde(default)]
    pub allow_download: bool,
    #[serde(default = "default_true")]
    pub allow_embedding: bool,
}

#[derive(Debug, Deserialize, Validate)]
pub struct IssueEmbedTokenRequest {
    pub gallery_id: Uuid,
    pub site_id: Uuid,
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    #[validate(length(max = 50, message = "At most 50 allowed domains"))]
    pub allowed_domains: Vec<String>,
    pub max_photos: Option<i32>,
    #[serde(default)]
    pub layout: EmbedLayout,
    #[serde(default)]
    pub theme: EmbedTheme,
    #[serde(default = "default_true")]
    pub show_attribution: bool,
    #[serde(default = "default_true")]
    pub show_captions: bool,
    #[serde(default)]
    pub full_resolution: bool,
}

impl From<IssueEmbedTokenRequest> for IssueEmbedRequest {
    fn from(req: IssueEmbedTokenRequest) -> Self {
        Self {
            gallery_id: req.gallery_id,
            site_id: req.site_id,
            expires_at: req.expires_at,
            allowed_domains: req.allowed_domains,
            max_photos: req.max_photos,
            display: EmbedDisplay {
                layout: req.layout,
                theme: req.theme,
                show_attribution: req.show_attribution,
                show_captions: req.show_captions,
            },
            full_resolution: req.full_resolution,
        }
    }
}

/// Query string of the public embed endpoint.
#[derive(Debug, Deserialize)]
pub struct EmbedQuery {
    pub token: String,
}
