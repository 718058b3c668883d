//! Persistence ports.
//!
//! `Directory` reads records owned by neighbouring services. `ConsentStore`
//! owns the consent tables and can read the directory too, so a share-token
//! consume can join story status inside its own transaction.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use service_core::error::AppError;
use uuid::Uuid;

use crate::models::{
    AuditEvent, ConsentGrant, EmbedToken, FaceTag, Gallery, GrantChanges, MediaAsset,
    ShareRejection, ShareToken, Site, Story, SyndicationConsent,
};

#[async_trait]
pub trait Directory: Send + Sync {
    async fn get_story(&self, story_id: Uuid) -> Result<Option<Story>, AppError>;
    async fn get_site(&self, site_id: Uuid) -> Result<Option<Site>, AppError>;
    async fn get_gallery(&self, gallery_id: Uuid) -> Result<Option<Gallery>, AppError>;
    /// Gallery items in display order, at most `limit` when given.
    async fn list_gallery_items(
        &self,
        gallery_id: Uuid,
        limit: Option<i64>,
    ) -> Result<Vec<MediaAsset>, AppError>;
    async fn get_media(&self, media_id: Uuid) -> Result<Option<MediaAsset>, AppError>;
}

/// Result of an atomic evaluate-then-increment on a share token.
pub type ShareConsumption = Result<ShareToken, ShareRejection>;

#[async_trait]
pub trait ConsentStore: Directory {
    async fn health_check(&self) -> Result<(), AppError>;

    // ==================== Consent Grants ====================

    /// Insert `grant` unless the pair already has an active grant
    /// (`Conflict`). A lapsed unrevoked grant is superseded in the same unit
    /// of work; its id is returned.
    async fn insert_grant(
        &self,
        grant: &ConsentGrant,
        now: DateTime<Utc>,
    ) -> Result<Option<Uuid>, AppError>;

    /// Revoke the pair's active grant, if any, returning it.
    async fn revoke_active_grant(
        &self,
        story_id: Uuid,
        site_id: Uuid,
        reason: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Option<ConsentGrant>, AppError>;

    /// Revoke every active grant of the story, returning the revoked grants.
    async fn revoke_all_active_grants(
        &self,
        story_id: Uuid,
        reason: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Vec<ConsentGrant>, AppError>;

    /// Apply `changes` to the pair's active grant. Returns the grant before
    /// and after the change, or `None` when no grant is active.
    async fn update_active_grant(
        &self,
        story_id: Uuid,
        site_id: Uuid,
        changes: &GrantChanges,
        now: DateTime<Utc>,
    ) -> Result<Option<(ConsentGrant, ConsentGrant)>, AppError>;

    /// Every grant for the story, newest first.
    async fn list_grants_for_story(&self, story_id: Uuid) -> Result<Vec<ConsentGrant>, AppError>;

    /// Active grants on the site whose story is not withdrawn, newest first.
    async fn list_active_grants_for_site(
        &self,
        site_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Vec<ConsentGrant>, AppError>;

    /// Bump `view_count` on the pair's active grant. `false` if none.
    async fn increment_grant_views(
        &self,
        story_id: Uuid,
        site_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<bool, AppError>;

    // ==================== Share Tokens ====================

    async fn insert_share_token(&self, token: &ShareToken) -> Result<(), AppError>;

    /// Evaluate and, on success, count one view as a single atomic unit.
    async fn consume_share_token(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<ShareConsumption, AppError>;

    async fn find_share_token(&self, token_id: Uuid) -> Result<Option<ShareToken>, AppError>;

    /// Newest first.
    async fn list_share_tokens(&self, story_id: Uuid) -> Result<Vec<ShareToken>, AppError>;

    /// `false` if the token was already revoked.
    async fn revoke_share_token(&self, token_id: Uuid, now: DateTime<Utc>) -> Result<bool, AppError>;

    // ==================== Embed Tokens ====================

    async fn insert_embed_token(&self, token: &EmbedToken) -> Result<(), AppError>;

    async fn find_embed_token(
        &self,
        gallery_id: Uuid,
        token_hash: &str,
    ) -> Result<Option<EmbedToken>, AppError>;

    async fn find_embed_token_by_id(&self, token_id: Uuid) -> Result<Option<EmbedToken>, AppError>;

    /// Move an active token to `expired`. `false` if it was not active.
    async fn mark_embed_token_expired(&self, token_id: Uuid) -> Result<bool, AppError>;

    async fn record_embed_usage(
        &self,
        token_id: Uuid,
        domain: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<(), AppError>;

    /// `false` if the token was already revoked.
    async fn revoke_embed_token(&self, token_id: Uuid, now: DateTime<Utc>) -> Result<bool, AppError>;

    // ==================== Syndication Consents ====================

    /// Insert or replace the decision for `(gallery_id, site_id)`.
    async fn upsert_syndication_consent(
        &self,
        consent: &SyndicationConsent,
    ) -> Result<SyndicationConsent, AppError>;

    async fn find_syndication_consent(
        &self,
        gallery_id: Uuid,
        site_id: Uuid,
    ) -> Result<Option<SyndicationConsent>, AppError>;

    // ==================== Face Tags ====================

    async fn find_face_tag(&self, face_id: Uuid) -> Result<Option<FaceTag>, AppError>;
    async fn insert_face_tag(&self, tag: &FaceTag) -> Result<(), AppError>;
    async fn update_face_tag(&self, tag: &FaceTag) -> Result<(), AppError>;

    // ==================== Audit Events ====================

    async fn insert_audit_event(&self, event: &AuditEvent) -> Result<(), AppError>;
}

/// Append an audit event. Failures are logged and swallowed.
pub async fn audit(store: &dyn ConsentStore, event: AuditEvent) {
    if let Err(e) = store.insert_audit_event(&event).await {
        tracing::warn!(
            error = %e,
            event_type = %event.event_type_code,
            target_id = %event.target_id,
            "Failed to write audit event"
        );
    }
}
