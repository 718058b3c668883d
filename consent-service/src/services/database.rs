//! PostgreSQL adapter for the consent tables and the read-only directory.
//!
//! Runtime-checked `sqlx` queries. Operations that must be atomic take a row
//! lock with `SELECT ... FOR UPDATE` inside a transaction.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use service_core::error::AppError;
use sqlx::postgres::PgPool;
use std::time::Instant;
use tracing::instrument;
use uuid::Uuid;

use super::metrics::record_db_query;
use super::store::{ConsentStore, Directory, ShareConsumption};
use crate::models::{
    AuditEvent, ConsentGrant, EmbedToken, FaceTag, Gallery, GrantChanges, MediaAsset,
    ShareRejection, ShareToken, Site, Story, StoryStatus, SyndicationConsent,
};

/// PostgreSQL database wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn db_error(e: sqlx::Error) -> AppError {
    AppError::DatabaseError(anyhow::anyhow!(e))
}

#[async_trait]
impl Directory for Database {
    async fn get_story(&self, story_id: Uuid) -> Result<Option<Story>, AppError> {
        sqlx::query_as::<_, Story>(
            "SELECT story_id, owner_id, status_code FROM stories WHERE story_id = $1",
        )
        .bind(story_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)
    }

    async fn get_site(&self, site_id: Uuid) -> Result<Option<Site>, AppError> {
        sqlx::query_as::<_, Site>(
            "SELECT site_id, site_name, primary_domain FROM syndication_sites WHERE site_id = $1",
        )
        .bind(site_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)
    }

    async fn get_gallery(&self, gallery_id: Uuid) -> Result<Option<Gallery>, AppError> {
        sqlx::query_as::<_, Gallery>(
            "SELECT gallery_id, owner_id, title FROM galleries WHERE gallery_id = $1",
        )
        .bind(gallery_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)
    }

    async fn list_gallery_items(
        &self,
        gallery_id: Uuid,
        limit: Option<i64>,
    ) -> Result<Vec<MediaAsset>, AppError> {
        sqlx::query_as::<_, MediaAsset>(
            r#"
            SELECT media_id, uploader_id, gallery_id, sort_order, full_url, thumbnail_url,
                   caption, creator_name
            FROM media_assets
            WHERE gallery_id = $1
            ORDER BY sort_order, media_id
            LIMIT $2
            "#,
        )
        .bind(gallery_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)
    }

    async fn get_media(&self, media_id: Uuid) -> Result<Option<MediaAsset>, AppError> {
        sqlx::query_as::<_, MediaAsset>(
            r#"
            SELECT media_id, uploader_id, gallery_id, sort_order, full_url, thumbnail_url,
                   caption, creator_name
            FROM media_assets
            WHERE media_id = $1
            "#,
        )
        .bind(media_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)
    }
}

#[async_trait]
impl ConsentStore for Database {
    async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Database health check failed: {}", e);
                AppError::DatabaseError(anyhow::anyhow!("Database health check failed: {}", e))
            })?;
        Ok(())
    }

    // ==================== Consent Grants ====================

    #[instrument(skip(self, grant), fields(story_id = %grant.story_id, site_id = %grant.site_id))]
    async fn insert_grant(
        &self,
        grant: &ConsentGrant,
        now: DateTime<Utc>,
    ) -> Result<Option<Uuid>, AppError> {
        let started = Instant::now();
        let mut tx = self.pool.begin().await.map_err(db_error)?;

        let current = sqlx::query_as::<_, ConsentGrant>(
            r#"
            SELECT * FROM consent_grants
            WHERE story_id = $1 AND site_id = $2 AND revoked_at IS NULL
            FOR UPDATE
            "#,
        )
        .bind(grant.story_id)
        .bind(grant.site_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_error)?;

        let mut superseded = None;
        if let Some(current) = current {
            if !current.is_lapsed_at(now) {
                return Err(AppError::conflict(
                    "Story already has active consent for this site",
                ));
            }
            sqlx::query(
                r#"
                UPDATE consent_grants
                SET revoked_at = $2, revoke_reason = 'superseded'
                WHERE visibility_id = $1
                "#,
            )
            .bind(current.visibility_id)
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;
            superseded = Some(current.visibility_id);
        }

        // The partial unique index turns a concurrent insert for the same
        // pair into a unique violation, reported as Conflict.
        sqlx::query(
            r#"
            INSERT INTO consent_grants (
                visibility_id, story_id, site_id, visibility_code, featured, project_tags,
                granted_by, granted_at, expires_at, revoked_at, revoke_reason, view_count
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, NULL, NULL, 0)
            "#,
        )
        .bind(grant.visibility_id)
        .bind(grant.story_id)
        .bind(grant.site_id)
        .bind(&grant.visibility_code)
        .bind(grant.featured)
        .bind(&grant.project_tags)
        .bind(grant.granted_by)
        .bind(grant.granted_at)
        .bind(grant.expires_at)
        .execute(&mut *tx)
        .await
        .map_err(AppError::from)?;

        tx.commit().await.map_err(db_error)?;
        record_db_query("insert_grant", started);
        Ok(superseded)
    }

    #[instrument(skip(self, reason))]
    async fn revoke_active_grant(
        &self,
        story_id: Uuid,
        site_id: Uuid,
        reason: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Option<ConsentGrant>, AppError> {
        sqlx::query_as::<_, ConsentGrant>(
            r#"
            UPDATE consent_grants
            SET revoked_at = $3, revoke_reason = $4
            WHERE story_id = $1 AND site_id = $2 AND revoked_at IS NULL
              AND (expires_at IS NULL OR expires_at > $3)
            RETURNING *
            "#,
        )
        .bind(story_id)
        .bind(site_id)
        .bind(now)
        .bind(reason)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)
    }

    #[instrument(skip(self, reason))]
    async fn revoke_all_active_grants(
        &self,
        story_id: Uuid,
        reason: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Vec<ConsentGrant>, AppError> {
        sqlx::query_as::<_, ConsentGrant>(
            r#"
            UPDATE consent_grants
            SET revoked_at = $2, revoke_reason = $3
            WHERE story_id = $1 AND revoked_at IS NULL
              AND (expires_at IS NULL OR expires_at > $2)
            RETURNING *
            "#,
        )
        .bind(story_id)
        .bind(now)
        .bind(reason)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)
    }

    #[instrument(skip(self, changes))]
    async fn update_active_grant(
        &self,
        story_id: Uuid,
        site_id: Uuid,
        changes: &GrantChanges,
        now: DateTime<Utc>,
    ) -> Result<Option<(ConsentGrant, ConsentGrant)>, AppError> {
        let started = Instant::now();
        let mut tx = self.pool.begin().await.map_err(db_error)?;

        let current = sqlx::query_as::<_, ConsentGrant>(
            r#"
            SELECT * FROM consent_grants
            WHERE story_id = $1 AND site_id = $2 AND revoked_at IS NULL
              AND (expires_at IS NULL OR expires_at > $3)
            FOR UPDATE
            "#,
        )
        .bind(story_id)
        .bind(site_id)
        .bind(now)
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_error)?;

        let Some(before) = current else {
            return Ok(None);
        };
        let mut after = before.clone();
        after.apply(changes);

        sqlx::query(
            r#"
            UPDATE consent_grants
            SET visibility_code = $2, featured = $3, project_tags = $4
            WHERE visibility_id = $1
            "#,
        )
        .bind(after.visibility_id)
        .bind(&after.visibility_code)
        .bind(after.featured)
        .bind(&after.project_tags)
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;

        tx.commit().await.map_err(db_error)?;
        record_db_query("update_active_grant", started);
        Ok(Some((before, after)))
    }

    async fn list_grants_for_story(&self, story_id: Uuid) -> Result<Vec<ConsentGrant>, AppError> {
        sqlx::query_as::<_, ConsentGrant>(
            "SELECT * FROM consent_grants WHERE story_id = $1 ORDER BY granted_at DESC",
        )
        .bind(story_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)
    }

    async fn list_active_grants_for_site(
        &self,
        site_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Vec<ConsentGrant>, AppError> {
        sqlx::query_as::<_, ConsentGrant>(
            r#"
            SELECT g.* FROM consent_grants g
            JOIN stories s ON s.story_id = g.story_id
            WHERE g.site_id = $1 AND g.revoked_at IS NULL
              AND (g.expires_at IS NULL OR g.expires_at > $2)
              AND s.status_code <> $3
            ORDER BY g.granted_at DESC
            "#,
        )
        .bind(site_id)
        .bind(now)
        .bind(StoryStatus::Withdrawn.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)
    }

    async fn increment_grant_views(
        &self,
        story_id: Uuid,
        site_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE consent_grants
            SET view_count = view_count + 1
            WHERE story_id = $1 AND site_id = $2 AND revoked_at IS NULL
              AND (expires_at IS NULL OR expires_at > $3)
            "#,
        )
        .bind(story_id)
        .bind(site_id)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(result.rows_affected() > 0)
    }

    // ==================== Share Tokens ====================

    async fn insert_share_token(&self, token: &ShareToken) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO share_tokens (
                token_id, token_hash, story_id, status_code, expires_at, max_views,
                view_count, created_by, created_at, revoked_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(token.token_id)
        .bind(&token.token_hash)
        .bind(token.story_id)
        .bind(&token.status_code)
        .bind(token.expires_at)
        .bind(token.max_views)
        .bind(token.view_count)
        .bind(token.created_by)
        .bind(token.created_at)
        .bind(token.revoked_at)
        .execute(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(())
    }

    #[instrument(skip_all)]
    async fn consume_share_token(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<ShareConsumption, AppError> {
        let started = Instant::now();
        let mut tx = self.pool.begin().await.map_err(db_error)?;

        // Row lock serialises concurrent consumers of the same token.
        let token = sqlx::query_as::<_, ShareToken>(
            "SELECT * FROM share_tokens WHERE token_hash = $1 FOR UPDATE",
        )
        .bind(token_hash)
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_error)?;

        let Some(token) = token else {
            return Ok(Err(ShareRejection::NotFound));
        };

        let story = sqlx::query_as::<_, Story>(
            "SELECT story_id, owner_id, status_code FROM stories WHERE story_id = $1",
        )
        .bind(token.story_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_error)?;

        if let Err(rejection) = token.evaluate(story.as_ref(), now) {
            tx.rollback().await.map_err(db_error)?;
            return Ok(Err(rejection));
        }

        let consumed = sqlx::query_as::<_, ShareToken>(
            r#"
            UPDATE share_tokens
            SET view_count = view_count + 1
            WHERE token_id = $1
            RETURNING *
            "#,
        )
        .bind(token.token_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_error)?;

        tx.commit().await.map_err(db_error)?;
        record_db_query("consume_share_token", started);
        Ok(Ok(consumed))
    }

    async fn find_share_token(&self, token_id: Uuid) -> Result<Option<ShareToken>, AppError> {
        sqlx::query_as::<_, ShareToken>("SELECT * FROM share_tokens WHERE token_id = $1")
            .bind(token_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)
    }

    async fn list_share_tokens(&self, story_id: Uuid) -> Result<Vec<ShareToken>, AppError> {
        sqlx::query_as::<_, ShareToken>(
            "SELECT * FROM share_tokens WHERE story_id = $1 ORDER BY created_at DESC",
        )
        .bind(story_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)
    }

    async fn revoke_share_token(&self, token_id: Uuid, now: DateTime<Utc>) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE share_tokens
            SET status_code = 'revoked', revoked_at = $2
            WHERE token_id = $1 AND status_code <> 'revoked'
            "#,
        )
        .bind(token_id)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(result.rows_affected() > 0)
    }

    // ==================== Embed Tokens ====================

    async fn insert_embed_token(&self, token: &EmbedToken) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO embed_tokens (
                token_id, token_hash, gallery_id, site_id, status_code, expires_at,
                allowed_domains, max_photos, usage_count, last_used_at, last_used_domain,
                layout_code, theme_code, show_attribution, show_captions, full_resolution,
                created_by, created_at, revoked_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19)
            "#,
        )
        .bind(token.token_id)
        .bind(&token.token_hash)
        .bind(token.gallery_id)
        .bind(token.site_id)
        .bind(&token.status_code)
        .bind(token.expires_at)
        .bind(&token.allowed_domains)
        .bind(token.max_photos)
        .bind(token.usage_count)
        .bind(token.last_used_at)
        .bind(&token.last_used_domain)
        .bind(&token.layout_code)
        .bind(&token.theme_code)
        .bind(token.show_attribution)
        .bind(token.show_captions)
        .bind(token.full_resolution)
        .bind(token.created_by)
        .bind(token.created_at)
        .bind(token.revoked_at)
        .execute(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(())
    }

    async fn find_embed_token(
        &self,
        gallery_id: Uuid,
        token_hash: &str,
    ) -> Result<Option<EmbedToken>, AppError> {
        sqlx::query_as::<_, EmbedToken>(
            "SELECT * FROM embed_tokens WHERE gallery_id = $1 AND token_hash = $2",
        )
        .bind(gallery_id)
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)
    }

    async fn find_embed_token_by_id(&self, token_id: Uuid) -> Result<Option<EmbedToken>, AppError> {
        sqlx::query_as::<_, EmbedToken>("SELECT * FROM embed_tokens WHERE token_id = $1")
            .bind(token_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)
    }

    async fn mark_embed_token_expired(&self, token_id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query(
            "UPDATE embed_tokens SET status_code = 'expired' WHERE token_id = $1 AND status_code = 'active'",
        )
        .bind(token_id)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(result.rows_affected() > 0)
    }

    async fn record_embed_usage(
        &self,
        token_id: Uuid,
        domain: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE embed_tokens
            SET usage_count = usage_count + 1, last_used_at = $2, last_used_domain = $3
            WHERE token_id = $1
            "#,
        )
        .bind(token_id)
        .bind(now)
        .bind(domain)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(())
    }

    async fn revoke_embed_token(&self, token_id: Uuid, now: DateTime<Utc>) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE embed_tokens
            SET status_code = 'revoked', revoked_at = $2
            WHERE token_id = $1 AND status_code <> 'revoked'
            "#,
        )
        .bind(token_id)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(result.rows_affected() > 0)
    }

    // ==================== Syndication Consents ====================

    async fn upsert_syndication_consent(
        &self,
        consent: &SyndicationConsent,
    ) -> Result<SyndicationConsent, AppError> {
        sqlx::query_as::<_, SyndicationConsent>(
            r#"
            INSERT INTO syndication_consents (
                consent_id, gallery_id, site_id, status_code, allow_full_resolution,
                allow_download, allow_embedding, decided_by, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (gallery_id, site_id) DO UPDATE SET
                status_code = EXCLUDED.status_code,
                allow_full_resolution = EXCLUDED.allow_full_resolution,
                allow_download = EXCLUDED.allow_download,
                allow_embedding = EXCLUDED.allow_embedding,
                decided_by = EXCLUDED.decided_by,
                updated_at = EXCLUDED.updated_at
            RETURNING *
            "#,
        )
        .bind(consent.consent_id)
        .bind(consent.gallery_id)
        .bind(consent.site_id)
        .bind(&consent.status_code)
        .bind(consent.allow_full_resolution)
        .bind(consent.allow_download)
        .bind(consent.allow_embedding)
        .bind(consent.decided_by)
        .bind(consent.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error)
    }

    async fn find_syndication_consent(
        &self,
        gallery_id: Uuid,
        site_id: Uuid,
    ) -> Result<Option<SyndicationConsent>, AppError> {
        sqlx::query_as::<_, SyndicationConsent>(
            "SELECT * FROM syndication_consents WHERE gallery_id = $1 AND site_id = $2",
        )
        .bind(gallery_id)
        .bind(site_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)
    }

    // ==================== Face Tags ====================

    async fn find_face_tag(&self, face_id: Uuid) -> Result<Option<FaceTag>, AppError> {
        sqlx::query_as::<_, FaceTag>("SELECT * FROM face_tags WHERE face_id = $1")
            .bind(face_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)
    }

    async fn insert_face_tag(&self, tag: &FaceTag) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO face_tags (
                face_id, media_id, face_x, face_y, face_width, face_height, person_id,
                status_code, proposed_by, uploader_consent_at, person_consent_at,
                recognition_consent_granted, can_be_public, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            "#,
        )
        .bind(tag.face_id)
        .bind(tag.media_id)
        .bind(tag.face_x)
        .bind(tag.face_y)
        .bind(tag.face_width)
        .bind(tag.face_height)
        .bind(tag.person_id)
        .bind(&tag.status_code)
        .bind(tag.proposed_by)
        .bind(tag.uploader_consent_at)
        .bind(tag.person_consent_at)
        .bind(tag.recognition_consent_granted)
        .bind(tag.can_be_public)
        .bind(tag.created_at)
        .bind(tag.updated_at)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(())
    }

    async fn update_face_tag(&self, tag: &FaceTag) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            UPDATE face_tags
            SET person_id = $2, status_code = $3, proposed_by = $4, uploader_consent_at = $5,
                person_consent_at = $6, recognition_consent_granted = $7, can_be_public = $8,
                updated_at = $9
            WHERE face_id = $1
            "#,
        )
        .bind(tag.face_id)
        .bind(tag.person_id)
        .bind(&tag.status_code)
        .bind(tag.proposed_by)
        .bind(tag.uploader_consent_at)
        .bind(tag.person_consent_at)
        .bind(tag.recognition_consent_granted)
        .bind(tag.can_be_public)
        .bind(tag.updated_at)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("Face not found"));
        }
        Ok(())
    }

    // ==================== Audit Events ====================

    async fn insert_audit_event(&self, event: &AuditEvent) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO audit_events (
                event_id, actor_id, event_type_code, target_type, target_id, event_data, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(event.event_id)
        .bind(event.actor_id)
        .bind(&event.event_type_code)
        .bind(&event.target_type)
        .bind(event.target_id)
        .bind(&event.event_data)
        .bind(event.created_at)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(())
    }
}
