//! In-process store used by tests and the `memory` backend.
//!
//! All tables sit behind one mutex, so every trait method is a single
//! critical section. No lock is held across an `.await`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use service_core::error::AppError;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

use super::store::{ConsentStore, Directory, ShareConsumption};
use crate::models::{
    AuditEvent, ConsentGrant, EmbedToken, EmbedTokenStatus, FaceTag, Gallery, GrantChanges,
    MediaAsset, ShareRejection, ShareToken, ShareTokenStatus, Site, Story, StoryStatus, SyndicationConsent,
};

#[derive(Default)]
struct Tables {
    stories: HashMap<Uuid, Story>,
    sites: HashMap<Uuid, Site>,
    galleries: HashMap<Uuid, Gallery>,
    media: HashMap<Uuid, MediaAsset>,
    grants: Vec<ConsentGrant>,
    share_tokens: Vec<ShareToken>,
    embed_tokens: Vec<EmbedToken>,
    syndication: HashMap<(Uuid, Uuid), SyndicationConsent>,
    face_tags: HashMap<Uuid, FaceTag>,
    audit_events: Vec<AuditEvent>,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(|e| e.into_inner())
    }

    // ==================== Directory seeding ====================

    pub fn add_story(&self, owner_id: Uuid) -> Story {
        let story = Story {
            story_id: Uuid::new_v4(),
            owner_id,
            status_code: StoryStatus::Published.as_str().to_string(),
        };
        self.lock().stories.insert(story.story_id, story.clone());
        story
    }

    pub fn set_story_status(&self, story_id: Uuid, status: StoryStatus) {
        if let Some(story) = self.lock().stories.get_mut(&story_id) {
            story.status_code = status.as_str().to_string();
        }
    }

    pub fn remove_story(&self, story_id: Uuid) {
        self.lock().stories.remove(&story_id);
    }

    pub fn add_site(&self, site_name: &str, primary_domain: Option<&str>) -> Site {
        let site = Site {
            site_id: Uuid::new_v4(),
            site_name: site_name.to_string(),
            primary_domain: primary_domain.map(str::to_string),
        };
        self.lock().sites.insert(site.site_id, site.clone());
        site
    }

    pub fn add_gallery(&self, owner_id: Uuid, title: &str) -> Gallery {
        let gallery = Gallery {
            gallery_id: Uuid::new_v4(),
            owner_id,
            title: title.to_string(),
        };
        self.lock().galleries.insert(gallery.gallery_id, gallery.clone());
        gallery
    }

    /// Add a media item, appended to `gallery_id` when given.
    pub fn add_media(&self, uploader_id: Uuid, gallery_id: Option<Uuid>) -> MediaAsset {
        let mut tables = self.lock();
        let sort_order = gallery_id
            .map(|g| tables.media.values().filter(|m| m.gallery_id == Some(g)).count() as i32)
            .unwrap_or(0);
        let media_id = Uuid::new_v4();
        let media = MediaAsset {
            media_id,
            uploader_id,
            gallery_id,
            sort_order,
            full_url: format!("https://media.local/full/{media_id}.jpg"),
            thumbnail_url: format!("https://media.local/thumb/{media_id}.jpg"),
            caption: Some(format!("Photo {}", sort_order + 1)),
            creator_name: Some("Community Photographer".to_string()),
        };
        tables.media.insert(media_id, media.clone());
        media
    }

    // ==================== Inspection ====================

    pub fn audit_events(&self) -> Vec<AuditEvent> {
        self.lock().audit_events.clone()
    }

    pub fn grants(&self) -> Vec<ConsentGrant> {
        self.lock().grants.clone()
    }
}

#[async_trait]
impl Directory for MemoryStore {
    async fn get_story(&self, story_id: Uuid) -> Result<Option<Story>, AppError> {
        Ok(self.lock().stories.get(&story_id).cloned())
    }

    async fn get_site(&self, site_id: Uuid) -> Result<Option<Site>, AppError> {
        Ok(self.lock().sites.get(&site_id).cloned())
    }

    async fn get_gallery(&self, gallery_id: Uuid) -> Result<Option<Gallery>, AppError> {
        Ok(self.lock().galleries.get(&gallery_id).cloned())
    }

    async fn list_gallery_items(
        &self,
        gallery_id: Uuid,
        limit: Option<i64>,
    ) -> Result<Vec<MediaAsset>, AppError> {
        let mut items: Vec<MediaAsset> = self
            .lock()
            .media
            .values()
            .filter(|m| m.gallery_id == Some(gallery_id))
            .cloned()
            .collect();
        items.sort_by_key(|m| m.sort_order);
        if let Some(limit) = limit {
            items.truncate(limit.max(0) as usize);
        }
        Ok(items)
    }

    async fn get_media(&self, media_id: Uuid) -> Result<Option<MediaAsset>, AppError> {
        Ok(self.lock().media.get(&media_id).cloned())
    }
}

#[async_trait]
impl ConsentStore for MemoryStore {
    async fn health_check(&self) -> Result<(), AppError> {
        Ok(())
    }

    async fn insert_grant(
        &self,
        grant: &ConsentGrant,
        now: DateTime<Utc>,
    ) -> Result<Option<Uuid>, AppError> {
        let mut tables = self.lock();
        let mut superseded = None;
        if let Some(current) = tables.grants.iter_mut().find(|g| {
            g.story_id == grant.story_id && g.site_id == grant.site_id && g.revoked_at.is_none()
        }) {
            if !current.is_lapsed_at(now) {
                return Err(AppError::conflict(
                    "Story already has active consent for this site",
                ));
            }
            current.revoked_at = Some(now);
            current.revoke_reason = Some("superseded".to_string());
            superseded = Some(current.visibility_id);
        }
        tables.grants.push(grant.clone());
        Ok(superseded)
    }

    async fn revoke_active_grant(
        &self,
        story_id: Uuid,
        site_id: Uuid,
        reason: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Option<ConsentGrant>, AppError> {
        let mut tables = self.lock();
        let grant = tables
            .grants
            .iter_mut()
            .find(|g| g.story_id == story_id && g.site_id == site_id && g.is_active_at(now));
        Ok(grant.map(|g| {
            g.revoked_at = Some(now);
            g.revoke_reason = reason.map(str::to_string);
            g.clone()
        }))
    }

    async fn revoke_all_active_grants(
        &self,
        story_id: Uuid,
        reason: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Vec<ConsentGrant>, AppError> {
        let mut tables = self.lock();
        Ok(tables
            .grants
            .iter_mut()
            .filter(|g| g.story_id == story_id && g.is_active_at(now))
            .map(|g| {
                g.revoked_at = Some(now);
                g.revoke_reason = reason.map(str::to_string);
                g.clone()
            })
            .collect())
    }

    async fn update_active_grant(
        &self,
        story_id: Uuid,
        site_id: Uuid,
        changes: &GrantChanges,
        now: DateTime<Utc>,
    ) -> Result<Option<(ConsentGrant, ConsentGrant)>, AppError> {
        let mut tables = self.lock();
        let grant = tables
            .grants
            .iter_mut()
            .find(|g| g.story_id == story_id && g.site_id == site_id && g.is_active_at(now));
        Ok(grant.map(|g| {
            let before = g.clone();
            g.apply(changes);
            (before, g.clone())
        }))
    }

    async fn list_grants_for_story(&self, story_id: Uuid) -> Result<Vec<ConsentGrant>, AppError> {
        let mut grants: Vec<ConsentGrant> = self
            .lock()
            .grants
            .iter()
            .rev()
            .filter(|g| g.story_id == story_id)
            .cloned()
            .collect();
        grants.sort_by(|a, b| b.granted_at.cmp(&a.granted_at));
        Ok(grants)
    }

    async fn list_active_grants_for_site(
        &self,
        site_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Vec<ConsentGrant>, AppError> {
        let tables = self.lock();
        let mut grants: Vec<ConsentGrant> = tables
            .grants
            .iter()
            .filter(|g| g.site_id == site_id && g.is_active_at(now))
            .filter(|g| {
                tables
                    .stories
                    .get(&g.story_id)
                    .is_some_and(|story| !story.is_withdrawn())
            })
            .cloned()
            .collect();
        grants.sort_by(|a, b| b.granted_at.cmp(&a.granted_at));
        Ok(grants)
    }

    async fn increment_grant_views(
        &self,
        story_id: Uuid,
        site_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let mut tables = self.lock();
        match tables
            .grants
            .iter_mut()
            .find(|g| g.story_id == story_id && g.site_id == site_id && g.is_active_at(now))
        {
            Some(grant) => {
                grant.view_count += 1;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn insert_share_token(&self, token: &ShareToken) -> Result<(), AppError> {
        self.lock().share_tokens.push(token.clone());
        Ok(())
    }

    async fn consume_share_token(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<ShareConsumption, AppError> {
        let mut guard = self.lock();
        let tables = &mut *guard;
        let Some(token) = tables
            .share_tokens
            .iter_mut()
            .find(|t| t.token_hash == token_hash)
        else {
            return Ok(Err(ShareRejection::NotFound));
        };

        let story = tables.stories.get(&token.story_id);
        if let Err(rejection) = token.evaluate(story, now) {
            return Ok(Err(rejection));
        }
        token.view_count += 1;
        Ok(Ok(token.clone()))
    }

    async fn find_share_token(&self, token_id: Uuid) -> Result<Option<ShareToken>, AppError> {
        Ok(self
            .lock()
            .share_tokens
            .iter()
            .find(|t| t.token_id == token_id)
            .cloned())
    }

    async fn list_share_tokens(&self, story_id: Uuid) -> Result<Vec<ShareToken>, AppError> {
        let mut tokens: Vec<ShareToken> = self
            .lock()
            .share_tokens
            .iter()
            .rev()
            .filter(|t| t.story_id == story_id)
            .cloned()
            .collect();
        tokens.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(tokens)
    }

    async fn revoke_share_token(&self, token_id: Uuid, now: DateTime<Utc>) -> Result<bool, AppError> {
        let mut tables = self.lock();
        match tables.share_tokens.iter_mut().find(|t| t.token_id == token_id) {
            Some(token) if token.status() != ShareTokenStatus::Revoked => {
                token.status_code = ShareTokenStatus::Revoked.as_str().to_string();
                token.revoked_at = Some(now);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn insert_embed_token(&self, token: &EmbedToken) -> Result<(), AppError> {
        self.lock().embed_tokens.push(token.clone());
        Ok(())
    }

    async fn find_embed_token(
        &self,
        gallery_id: Uuid,
        token_hash: &str,
    ) -> Result<Option<EmbedToken>, AppError> {
        Ok(self
            .lock()
            .embed_tokens
            .iter()
            .find(|t| t.gallery_id == gallery_id && t.token_hash == token_hash)
            .cloned())
    }

    async fn find_embed_token_by_id(&self, token_id: Uuid) -> Result<Option<EmbedToken>, AppError> {
        Ok(self
            .lock()
            .embed_tokens
            .iter()
            .find(|t| t.token_id == token_id)
            .cloned())
    }

    async fn mark_embed_token_expired(&self, token_id: Uuid) -> Result<bool, AppError> {
        let mut tables = self.lock();
        match tables.embed_tokens.iter_mut().find(|t| t.token_id == token_id) {
            Some(token) if token.status() == EmbedTokenStatus::Active => {
                token.status_code = EmbedTokenStatus::Expired.as_str().to_string();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn record_embed_usage(
        &self,
        token_id: Uuid,
        domain: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<(), AppError> {
        let mut tables = self.lock();
        if let Some(token) = tables.embed_tokens.iter_mut().find(|t| t.token_id == token_id) {
            token.usage_count += 1;
            token.last_used_at = Some(now);
            token.last_used_domain = domain.map(str::to_string);
        }
        Ok(())
    }

    async fn revoke_embed_token(&self, token_id: Uuid, now: DateTime<Utc>) -> Result<bool, AppError> {
        let mut tables = self.lock();
        match tables.embed_tokens.iter_mut().find(|t| t.token_id == token_id) {
            Some(token) if token.status() != EmbedTokenStatus::Revoked => {
                token.status_code = EmbedTokenStatus::Revoked.as_str().to_string();
                token.revoked_at = Some(now);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn upsert_syndication_consent(
        &self,
        consent: &SyndicationConsent,
    ) -> Result<SyndicationConsent, AppError> {
        let mut tables = self.lock();
        let key = (consent.gallery_id, consent.site_id);
        let stored = match tables.syndication.get(&key) {
            Some(existing) => SyndicationConsent {
                consent_id: existing.consent_id,
                ..consent.clone()
            },
            None => consent.clone(),
        };
        tables.syndication.insert(key, stored.clone());
        Ok(stored)
    }

    async fn find_syndication_consent(
        &self,
        gallery_id: Uuid,
        site_id: Uuid,
    ) -> Result<Option<SyndicationConsent>, AppError> {
        Ok(self.lock().syndication.get(&(gallery_id, site_id)).cloned())
    }

    async fn find_face_tag(&self, face_id: Uuid) -> Result<Option<FaceTag>, AppError> {
        Ok(self.lock().face_tags.get(&face_id).cloned())
    }

    async fn insert_face_tag(&self, tag: &FaceTag) -> Result<(), AppError> {
        self.lock().face_tags.insert(tag.face_id, tag.clone());
        Ok(())
    }

    async fn update_face_tag(&self, tag: &FaceTag) -> Result<(), AppError> {
        let mut tables = self.lock();
        match tables.face_tags.get_mut(&tag.face_id) {
            Some(existing) => {
                *existing = tag.clone();
                Ok(())
            }
            None => Err(AppError::not_found("Face not found")),
        }
    }

    async fn insert_audit_event(&self, event: &AuditEvent) -> Result<(), AppError> {
        self.lock().audit_events.push(event.clone());
        Ok(())
    }
}
