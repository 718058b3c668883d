//! Consent registry: per-(story, site) visibility grants.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use service_core::error::AppError;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

use super::access::{existing_site, owned_story};
use super::clock::Clock;
use super::metrics;
use super::notifier::RevocationNotifier;
use super::store::{audit, ConsentStore};
use crate::models::{
    AuditEvent, AuditEventType, ConsentGrant, GrantChanges, Requester, Visibility,
};

#[derive(Debug, Clone)]
pub struct GrantRequest {
    pub story_id: Uuid,
    pub site_id: Uuid,
    pub visibility: Visibility,
    pub duration_days: Option<i64>,
    pub featured: bool,
    pub project_tags: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GrantOutcome {
    pub visibility_id: Uuid,
    pub expires_at: Option<DateTime<Utc>>,
}

/// One grant as shown to the story owner, with activity derived at read time.
#[derive(Debug, Clone, Serialize)]
pub struct GrantSummary {
    pub visibility_id: Uuid,
    pub site_id: Uuid,
    pub visibility: Visibility,
    pub featured: bool,
    pub project_tags: Vec<String>,
    pub granted_by: Uuid,
    pub granted_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub revoke_reason: Option<String>,
    pub view_count: i64,
    pub active: bool,
}

impl GrantSummary {
    fn at(g: ConsentGrant, now: DateTime<Utc>) -> Self {
        Self {
            active: g.is_active_at(now),
            visibility: g.visibility(),
            visibility_id: g.visibility_id,
            site_id: g.site_id,
            featured: g.featured,
            project_tags: g.project_tags,
            granted_by: g.granted_by,
            granted_at: g.granted_at,
            expires_at: g.expires_at,
            revoked_at: g.revoked_at,
            revoke_reason: g.revoke_reason,
            view_count: g.view_count,
        }
    }
}

/// A story a consuming site may currently display.
#[derive(Debug, Clone, Serialize)]
pub struct SiteStory {
    pub story_id: Uuid,
    pub visibility_id: Uuid,
    pub visibility: Visibility,
    pub featured: bool,
    pub project_tags: Vec<String>,
    pub granted_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusSummary {
    pub story_id: Uuid,
    pub total_sites: usize,
    pub active_sites: usize,
    pub grants: Vec<GrantSummary>,
}

#[derive(Clone)]
pub struct ConsentRegistry {
    store: Arc<dyn ConsentStore>,
    clock: Arc<dyn Clock>,
    notifier: Arc<dyn RevocationNotifier>,
}

impl ConsentRegistry {
    pub fn new(
        store: Arc<dyn ConsentStore>,
        clock: Arc<dyn Clock>,
        notifier: Arc<dyn RevocationNotifier>,
    ) -> Self {
        Self {
            store,
            clock,
            notifier,
        }
    }

    /// Grant a story visibility on a site. At most one active grant per pair.
    #[instrument(skip(self, request), fields(story_id = %request.story_id, site_id = %request.site_id, requester = %requester.user_id))]
    pub async fn grant(
        &self,
        request: GrantRequest,
        requester: &Requester,
    ) -> Result<GrantOutcome, AppError> {
        if request.duration_days.is_some_and(|d| d < 0) {
            return Err(AppError::invalid("duration_days must not be negative"));
        }

        owned_story(self.store.as_ref(), request.story_id, requester).await?;
        existing_site(self.store.as_ref(), request.site_id).await?;

        let now = self.clock.now();
        let expires_at = match request.duration_days {
            Some(days) => Some(
                Duration::try_days(days)
                    .and_then(|d| now.checked_add_signed(d))
                    .ok_or_else(|| AppError::invalid("duration_days is out of range"))?,
            ),
            None => None,
        };

        let grant = ConsentGrant::new(
            request.story_id,
            request.site_id,
            requester.user_id,
            request.visibility,
            request.featured,
            request.project_tags,
            now,
            expires_at,
        );

        let superseded = self.store.insert_grant(&grant, now).await?;

        if let Some(previous) = superseded {
            tracing::info!(visibility_id = %previous, "Superseded lapsed consent grant");
            audit(
                self.store.as_ref(),
                AuditEvent::user_action(
                    requester.user_id,
                    AuditEventType::ConsentSuperseded,
                    "consent_grant",
                    previous,
                    Some(serde_json::json!({ "superseded_by": grant.visibility_id })),
                    now,
                ),
            )
            .await;
        }

        audit(
            self.store.as_ref(),
            AuditEvent::user_action(
                requester.user_id,
                AuditEventType::ConsentGranted,
                "consent_grant",
                grant.visibility_id,
                Some(serde_json::json!({
                    "story_id": grant.story_id,
                    "site_id": grant.site_id,
                    "visibility": grant.visibility_code,
                    "featured": grant.featured,
                    "expires_at": grant.expires_at,
                })),
                now,
            ),
        )
        .await;
        metrics::record_grant();

        tracing::info!(visibility_id = %grant.visibility_id, "Consent granted");

        Ok(GrantOutcome {
            visibility_id: grant.visibility_id,
            expires_at: grant.expires_at,
        })
    }

    /// Revoke the pair's active grant. `false` when there was nothing to revoke.
    #[instrument(skip(self, reason), fields(requester = %requester.user_id))]
    pub async fn revoke(
        &self,
        story_id: Uuid,
        site_id: Uuid,
        requester: &Requester,
        reason: Option<String>,
    ) -> Result<bool, AppError> {
        owned_story(self.store.as_ref(), story_id, requester).await?;

        let now = self.clock.now();
        let Some(grant) = self
            .store
            .revoke_active_grant(story_id, site_id, reason.as_deref(), now)
            .await?
        else {
            tracing::info!("No active consent to revoke");
            return Ok(false);
        };

        self.revoked(&grant, requester, now).await;
        Ok(true)
    }

    /// Revoke every active grant of the story, e.g. before it is deleted.
    /// Returns the ids of the grants that were revoked.
    #[instrument(skip(self, reason), fields(requester = %requester.user_id))]
    pub async fn revoke_all(
        &self,
        story_id: Uuid,
        requester: &Requester,
        reason: Option<String>,
    ) -> Result<Vec<Uuid>, AppError> {
        owned_story(self.store.as_ref(), story_id, requester).await?;

        let now = self.clock.now();
        let grants = self
            .store
            .revoke_all_active_grants(story_id, reason.as_deref(), now)
            .await?;

        for grant in &grants {
            self.revoked(grant, requester, now).await;
        }

        tracing::info!(revoked = grants.len(), "Revoked all consent for story");
        Ok(grants.iter().map(|g| g.visibility_id).collect())
    }

    /// Audit, count and notify one completed revocation.
    async fn revoked(&self, grant: &ConsentGrant, requester: &Requester, now: DateTime<Utc>) {
        audit(
            self.store.as_ref(),
            AuditEvent::user_action(
                requester.user_id,
                AuditEventType::ConsentRevoked,
                "consent_grant",
                grant.visibility_id,
                Some(serde_json::json!({
                    "site_id": grant.site_id,
                    "reason": grant.revoke_reason,
                })),
                now,
            ),
        )
        .await;
        metrics::record_revocation();

        if let Err(e) = self.notifier.consent_revoked(grant).await {
            tracing::warn!(
                error = %e,
                visibility_id = %grant.visibility_id,
                "Revocation notification failed"
            );
        }

        tracing::info!(visibility_id = %grant.visibility_id, "Consent revoked");
    }

    /// Change the settings of the pair's active grant in place.
    #[instrument(skip(self, changes), fields(requester = %requester.user_id))]
    pub async fn update(
        &self,
        story_id: Uuid,
        site_id: Uuid,
        changes: GrantChanges,
        requester: &Requester,
    ) -> Result<GrantSummary, AppError> {
        if changes.is_empty() {
            return Err(AppError::invalid("No consent settings to change"));
        }

        owned_story(self.store.as_ref(), story_id, requester).await?;
        existing_site(self.store.as_ref(), site_id).await?;

        let now = self.clock.now();
        let (before, after) = self
            .store
            .update_active_grant(story_id, site_id, &changes, now)
            .await?
            .ok_or_else(|| AppError::not_found("No active consent for this site"))?;

        audit(
            self.store.as_ref(),
            AuditEvent::user_action(
                requester.user_id,
                AuditEventType::ConsentUpdated,
                "consent_grant",
                after.visibility_id,
                Some(serde_json::json!({
                    "before": {
                        "visibility": before.visibility_code,
                        "featured": before.featured,
                        "project_tags": before.project_tags,
                    },
                    "after": {
                        "visibility": after.visibility_code,
                        "featured": after.featured,
                        "project_tags": after.project_tags,
                    },
                })),
                now,
            ),
        )
        .await;

        tracing::info!(visibility_id = %after.visibility_id, "Consent updated");
        Ok(GrantSummary::at(after, now))
    }

    /// Every grant for the story, newest first, with aggregate counts.
    #[instrument(skip(self), fields(requester = %requester.user_id))]
    pub async fn status(
        &self,
        story_id: Uuid,
        requester: &Requester,
    ) -> Result<StatusSummary, AppError> {
        owned_story(self.store.as_ref(), story_id, requester).await?;

        let now = self.clock.now();
        let grants: Vec<GrantSummary> = self
            .store
            .list_grants_for_story(story_id)
            .await?
            .into_iter()
            .map(|g| GrantSummary::at(g, now))
            .collect();

        let total_sites = grants.iter().map(|g| g.site_id).collect::<HashSet<_>>().len();
        let active_sites = grants
            .iter()
            .filter(|g| g.active)
            .map(|g| g.site_id)
            .collect::<HashSet<_>>()
            .len();

        Ok(StatusSummary {
            story_id,
            total_sites,
            active_sites,
            grants,
        })
    }

    /// Stories the site may display right now. Withdrawn stories are left
    /// out even while their grant is still open.
    #[instrument(skip(self), fields(requester = %requester.user_id))]
    pub async fn stories_for_site(
        &self,
        site_id: Uuid,
        requester: &Requester,
    ) -> Result<Vec<SiteStory>, AppError> {
        if !requester.acts_for_sites() {
            return Err(AppError::forbidden(
                "Only site integrations can list a site's stories",
            ));
        }
        existing_site(self.store.as_ref(), site_id).await?;

        let stories = self
            .store
            .list_active_grants_for_site(site_id, self.clock.now())
            .await?
            .into_iter()
            .map(|g| SiteStory {
                visibility: g.visibility(),
                story_id: g.story_id,
                visibility_id: g.visibility_id,
                featured: g.featured,
                project_tags: g.project_tags,
                granted_at: g.granted_at,
                expires_at: g.expires_at,
            })
            .collect();
        Ok(stories)
    }

    /// Count one display of the story on the site, if consent is active.
    #[instrument(skip(self), fields(requester = %requester.user_id))]
    pub async fn record_view(
        &self,
        story_id: Uuid,
        site_id: Uuid,
        requester: &Requester,
    ) -> Result<bool, AppError> {
        if !requester.acts_for_sites() {
            return Err(AppError::forbidden(
                "Only the rendering service can report views",
            ));
        }

        let counted = self
            .store
            .increment_grant_views(story_id, site_id, self.clock.now())
            .await?;
        if !counted {
            tracing::debug!("View not counted: no active consent");
        }
        Ok(counted)
    }
}
