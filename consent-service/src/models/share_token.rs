//! Share token model - bearer link to a single story, independent of site.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::directory::Story;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShareTokenStatus {
    Active,
    Revoked,
    Expired,
}

impl ShareTokenStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShareTokenStatus::Active => "active",
            ShareTokenStatus::Revoked => "revoked",
            ShareTokenStatus::Expired => "expired",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "active" => ShareTokenStatus::Active,
            "expired" => ShareTokenStatus::Expired,
            _ => ShareTokenStatus::Revoked,
        }
    }
}

/// Why a share token was refused, in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShareRejection {
    NotFound,
    Revoked,
    Expired,
    MaxViewsReached,
    StoryWithdrawn,
}

impl ShareRejection {
    /// Reason shown to the person following the link.
    pub fn reason(&self) -> &'static str {
        match self {
            ShareRejection::NotFound => "Token not found",
            ShareRejection::Revoked => "Token has been revoked",
            ShareRejection::Expired => "Token has expired",
            ShareRejection::MaxViewsReached => "Maximum views reached",
            ShareRejection::StoryWithdrawn => "Story has been withdrawn",
        }
    }

    /// Metric label.
    pub fn as_str(&self) -> &'static str {
        match self {
            ShareRejection::NotFound => "not_found",
            ShareRejection::Revoked => "revoked",
            ShareRejection::Expired => "expired",
            ShareRejection::MaxViewsReached => "max_views",
            ShareRejection::StoryWithdrawn => "withdrawn",
        }
    }
}

/// Share token entity. Only the SHA-256 digest of the bearer value is kept.
#[derive(Debug, Clone, FromRow)]
pub struct ShareToken {
    pub token_id: Uuid,
    pub token_hash: String,
    pub story_id: Uuid,
    pub status_code: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub max_views: Option<i32>,
    pub view_count: i32,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
}

impl ShareToken {
    pub fn new(
        token_hash: String,
        story_id: Uuid,
        created_by: Uuid,
        expires_at: Option<DateTime<Utc>>,
        max_views: Option<i32>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            token_id: Uuid::new_v4(),
            token_hash,
            story_id,
            status_code: ShareTokenStatus::Active.as_str().to_string(),
            expires_at,
            max_views,
            view_count: 0,
            created_by,
            created_at: now,
            revoked_at: None,
        }
    }

    pub fn status(&self) -> ShareTokenStatus {
        ShareTokenStatus::parse(&self.status_code)
    }

    /// Stored status with expiry applied.
    pub fn effective_status(&self, now: DateTime<Utc>) -> ShareTokenStatus {
        match self.status() {
            ShareTokenStatus::Active if self.is_expired_at(now) => ShareTokenStatus::Expired,
            status => status,
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|end| end <= now)
    }

    pub fn views_exhausted(&self) -> bool {
        self.max_views.is_some_and(|max| self.view_count >= max)
    }

    /// Decide whether one more view may be admitted.
    ///
    /// `story` is read from the story store at the moment of validation; a
    /// story that no longer exists is treated as withdrawn. Callers must hold
    /// the token row for the duration of evaluate-then-increment.
    pub fn evaluate(&self, story: Option<&Story>, now: DateTime<Utc>) -> Result<(), ShareRejection> {
        match self.status() {
            ShareTokenStatus::Revoked => return Err(ShareRejection::Revoked),
            ShareTokenStatus::Expired => return Err(ShareRejection::Expired),
            ShareTokenStatus::Active => {}
        }
        if self.is_expired_at(now) {
            return Err(ShareRejection::Expired);
        }
        if self.views_exhausted() {
            return Err(ShareRejection::MaxViewsReached);
        }
        match story {
            Some(story) if !story.is_withdrawn() => Ok(()),
            _ => Err(ShareRejection::StoryWithdrawn),
        }
    }
}
