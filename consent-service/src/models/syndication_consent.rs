//! Syndication consent - permission envelope for a gallery on a site.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyndicationStatus {
    Pending,
    Approved,
    Denied,
    Revoked,
}

impl SyndicationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyndicationStatus::Pending => "pending",
            SyndicationStatus::Approved => "approved",
            SyndicationStatus::Denied => "denied",
            SyndicationStatus::Revoked => "revoked",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "approved" => SyndicationStatus::Approved,
            "denied" => SyndicationStatus::Denied,
            "revoked" => SyndicationStatus::Revoked,
            _ => SyndicationStatus::Pending,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct SyndicationConsent {
    pub consent_id: Uuid,
    pub gallery_id: Uuid,
    pub site_id: Uuid,
    pub status_code: String,
    pub allow_full_resolution: bool,
    pub allow_download: bool,
    pub allow_embedding: bool,
    pub decided_by: Uuid,
    pub updated_at: DateTime<Utc>,
}

impl SyndicationConsent {
    pub fn status(&self) -> SyndicationStatus {
        SyndicationStatus::parse(&self.status_code)
    }

    pub fn is_approved(&self) -> bool {
        self.status() == SyndicationStatus::Approved
    }
}
