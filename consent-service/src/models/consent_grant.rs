//! Consent grant model - per (story, site) visibility permission.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// How a story is shown on the consuming site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    Unlisted,
    Restricted,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Unlisted => "unlisted",
            Visibility::Restricted => "restricted",
        }
    }

    /// Unknown codes fall back to the narrowest visibility.
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "public" => Visibility::Public,
            "unlisted" => Visibility::Unlisted,
            _ => Visibility::Restricted,
        }
    }
}

/// Consent grant entity.
///
/// At most one non-revoked row exists per `(story_id, site_id)`. Whether the
/// grant is active is derived on every read from `revoked_at` and
/// `expires_at`; it is never stored.
#[derive(Debug, Clone, FromRow)]
pub struct ConsentGrant {
    pub visibility_id: Uuid,
    pub story_id: Uuid,
    pub site_id: Uuid,
    pub visibility_code: String,
    pub featured: bool,
    pub project_tags: Vec<String>,
    pub granted_by: Uuid,
    pub granted_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub revoke_reason: Option<String>,
    pub view_count: i64,
}

impl ConsentGrant {
    /// Create a new grant starting at `now`.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        story_id: Uuid,
        site_id: Uuid,
        granted_by: Uuid,
        visibility: Visibility,
        featured: bool,
        project_tags: Vec<String>,
        now: DateTime<Utc>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            visibility_id: Uuid::new_v4(),
            story_id,
            site_id,
            visibility_code: visibility.as_str().to_string(),
            featured,
            project_tags: normalize_tags(project_tags),
            granted_by,
            granted_at: now,
            expires_at,
            revoked_at: None,
            revoke_reason: None,
            view_count: 0,
        }
    }

    /// Active iff not revoked and not past its expiry.
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.granted_at <= now
            && self.revoked_at.is_none()
            && self.expires_at.is_none_or(|end| end > now)
    }

    /// Not revoked, but the expiry has passed.
    pub fn is_lapsed_at(&self, now: DateTime<Utc>) -> bool {
        self.revoked_at.is_none() && self.expires_at.is_some_and(|end| end <= now)
    }

    pub fn visibility(&self) -> Visibility {
        Visibility::parse(&self.visibility_code)
    }

    /// Apply the settings in `changes`; fields left `None` are kept.
    pub fn apply(&mut self, changes: &GrantChanges) {
        if let Some(visibility) = changes.visibility {
            self.visibility_code = visibility.as_str().to_string();
        }
        if let Some(featured) = changes.featured {
            self.featured = featured;
        }
        if let Some(tags) = &changes.project_tags {
            self.project_tags = normalize_tags(tags.clone());
        }
    }
}

/// Settings an owner may change on an active grant without revoking it.
#[derive(Debug, Clone, Default)]
pub struct GrantChanges {
    pub visibility: Option<Visibility>,
    pub featured: Option<bool>,
    pub project_tags: Option<Vec<String>>,
}

impl GrantChanges {
    pub fn is_empty(&self) -> bool {
        self.visibility.is_none() && self.featured.is_none() && self.project_tags.is_none()
    }
}

/// Trim, drop empties and de-duplicate while keeping first-seen order.
pub fn normalize_tags(tags: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = tag.trim();
        if !tag.is_empty() && !out.iter().any(|t| t == tag) {
            out.push(tag.to_string());
        }
    }
    out
}
