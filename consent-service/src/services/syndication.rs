//! Syndication gateway: embed tokens and the gallery consent envelope.
//!
//! An embed token decides who may ask for a gallery. The gallery's
//! syndication consent for the token's site decides what comes back, and
//! the token can only narrow that.

use chrono::{DateTime, Utc};
use serde::Serialize;
use service_core::error::AppError;
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

use super::access::{existing_site, owned_gallery};
use super::clock::Clock;
use super::metrics;
use super::origin::{domain_allowed, normalize_domain};
use super::store::{audit, ConsentStore};
use super::tokens::{generate_token, hash_token};
use crate::models::{
    AuditEvent, AuditEventType, EmbedDisplay, EmbedLayout, EmbedTheme, EmbedToken,
    EmbedTokenStatus, Requester, SyndicationConsent, SyndicationStatus,
};

#[derive(Debug, Clone)]
pub struct SyndicationDecision {
    pub gallery_id: Uuid,
    pub site_id: Uuid,
    pub status: SyndicationStatus,
    pub allow_full_resolution: bool,
    pub allow_download: bool,
    pub allow_embedding: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SyndicationConsentSummary {
    pub consent_id: Uuid,
    pub gallery_id: Uuid,
    pub site_id: Uuid,
    pub status: SyndicationStatus,
    pub allow_full_resolution: bool,
    pub allow_download: bool,
    pub allow_embedding: bool,
    pub updated_at: DateTime<Utc>,
}

impl From<SyndicationConsent> for SyndicationConsentSummary {
    fn from(c: SyndicationConsent) -> Self {
        Self {
            status: c.status(),
            consent_id: c.consent_id,
            gallery_id: c.gallery_id,
            site_id: c.site_id,
            allow_full_resolution: c.allow_full_resolution,
            allow_download: c.allow_download,
            allow_embedding: c.allow_embedding,
            updated_at: c.updated_at,
        }
    }
}

#[derive(Debug, Clone)]
pub struct IssueEmbedRequest {
    pub gallery_id: Uuid,
    pub site_id: Uuid,
    pub expires_at: Option<DateTime<Utc>>,
    pub allowed_domains: Vec<String>,
    pub max_photos: Option<i32>,
    pub display: EmbedDisplay,
    pub full_resolution: bool,
}

/// Returned once at issue time; the plaintext token is not stored.
#[derive(Debug, Clone, Serialize)]
pub struct IssuedEmbedToken {
    pub token_id: Uuid,
    pub token: String,
    pub gallery_id: Uuid,
    pub site_id: Uuid,
    pub expires_at: Option<DateTime<Utc>>,
    pub allowed_domains: Vec<String>,
    pub max_photos: Option<i32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EmbedItem {
    pub media_id: Uuid,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attribution: Option<String>,
}

/// What an embedder receives: never more than the consent allows.
#[derive(Debug, Clone, Serialize)]
pub struct EmbedPayload {
    pub gallery_id: Uuid,
    pub title: String,
    pub layout: EmbedLayout,
    pub theme: EmbedTheme,
    pub full_resolution: bool,
    pub allow_download: bool,
    pub allow_embedding: bool,
    pub items: Vec<EmbedItem>,
}

#[derive(Clone)]
pub struct SyndicationGateway {
    store: Arc<dyn ConsentStore>,
    clock: Arc<dyn Clock>,
}

impl SyndicationGateway {
    pub fn new(store: Arc<dyn ConsentStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Record the gallery owner's decision for one site.
    #[instrument(skip(self, decision), fields(gallery_id = %decision.gallery_id, site_id = %decision.site_id, requester = %requester.user_id))]
    pub async fn set_consent(
        &self,
        decision: SyndicationDecision,
        requester: &Requester,
    ) -> Result<SyndicationConsentSummary, AppError> {
        owned_gallery(self.store.as_ref(), decision.gallery_id, requester).await?;
        existing_site(self.store.as_ref(), decision.site_id).await?;

        let now = self.clock.now();
        let consent = SyndicationConsent {
            consent_id: Uuid::new_v4(),
            gallery_id: decision.gallery_id,
            site_id: decision.site_id,
            status_code: decision.status.as_str().to_string(),
            allow_full_resolution: decision.allow_full_resolution,
            allow_download: decision.allow_download,
            allow_embedding: decision.allow_embedding,
            decided_by: requester.user_id,
            updated_at: now,
        };
        let stored = self.store.upsert_syndication_consent(&consent).await?;

        audit(
            self.store.as_ref(),
            AuditEvent::user_action(
                requester.user_id,
                AuditEventType::SyndicationDecided,
                "syndication_consent",
                stored.consent_id,
                Some(serde_json::json!({
                    "status": stored.status_code,
                    "allow_full_resolution": stored.allow_full_resolution,
                    "allow_download": stored.allow_download,
                    "allow_embedding": stored.allow_embedding,
                })),
                now,
            ),
        )
        .await;

        tracing::info!(consent_id = %stored.consent_id, status = %stored.status_code, "Syndication consent recorded");
        Ok(stored.into())
    }

    #[instrument(skip(self, request), fields(gallery_id = %request.gallery_id, site_id = %request.site_id, requester = %requester.user_id))]
    pub async fn issue_token(
        &self,
        request: IssueEmbedRequest,
        requester: &Requester,
    ) -> Result<IssuedEmbedToken, AppError> {
        let now = self.clock.now();
        if request.max_photos.is_some_and(|m| m < 1) {
            return Err(AppError::invalid("max_photos must be at least 1"));
        }
        if request.expires_at.is_some_and(|e| e <= now) {
            return Err(AppError::invalid("expires_at must be in the future"));
        }
        let mut allowed_domains: Vec<String> = Vec::with_capacity(request.allowed_domains.len());
        for raw in &request.allowed_domains {
            let domain = normalize_domain(raw)
                .ok_or_else(|| AppError::invalid(format!("Invalid domain: {:?}", raw)))?;
            if !allowed_domains.contains(&domain) {
                allowed_domains.push(domain);
            }
        }

        owned_gallery(self.store.as_ref(), request.gallery_id, requester).await?;
        existing_site(self.store.as_ref(), request.site_id).await?;

        let token = generate_token();
        let record = EmbedToken::new(
            hash_token(&token),
            request.gallery_id,
            request.site_id,
            requester.user_id,
            request.expires_at,
            allowed_domains,
            request.max_photos,
            request.display,
            request.full_resolution,
            now,
        );
        self.store.insert_embed_token(&record).await?;

        audit(
            self.store.as_ref(),
            AuditEvent::user_action(
                requester.user_id,
                AuditEventType::EmbedTokenIssued,
                "embed_token",
                record.token_id,
                Some(serde_json::json!({
                    "gallery_id": record.gallery_id,
                    "site_id": record.site_id,
                    "allowed_domains": record.allowed_domains,
                })),
                now,
            ),
        )
        .await;

        tracing::info!(token_id = %record.token_id, "Embed token issued");

        Ok(IssuedEmbedToken {
            token_id: record.token_id,
            token,
            gallery_id: record.gallery_id,
            site_id: record.site_id,
            expires_at: record.expires_at,
            allowed_domains: record.allowed_domains,
            max_photos: record.max_photos,
        })
    }

    #[instrument(skip(self), fields(requester = %requester.user_id))]
    pub async fn revoke_token(&self, token_id: Uuid, requester: &Requester) -> Result<bool, AppError> {
        let token = self
            .store
            .find_embed_token_by_id(token_id)
            .await?
            .ok_or_else(|| AppError::not_found("Embed token not found"))?;
        owned_gallery(self.store.as_ref(), token.gallery_id, requester).await?;

        let now = self.clock.now();
        let revoked = self.store.revoke_embed_token(token_id, now).await?;
        if revoked {
            audit(
                self.store.as_ref(),
                AuditEvent::user_action(
                    requester.user_id,
                    AuditEventType::EmbedTokenRevoked,
                    "embed_token",
                    token_id,
                    None,
                    now,
                ),
            )
            .await;
            tracing::info!(token_id = %token_id, "Embed token revoked");
        }
        Ok(revoked)
    }

    /// Resolve a gallery for a third-party embedder.
    ///
    /// Steps short-circuit in order: token lookup, status, lazy expiry,
    /// origin check, usage recording, consent check, payload. Usage is only
    /// recorded once the token and origin have passed, and it is kept even
    /// when the consent check then fails.
    #[instrument(skip(self, token, origin))]
    pub async fn resolve(
        &self,
        gallery_id: Uuid,
        token: &str,
        origin: Option<&str>,
    ) -> Result<EmbedPayload, AppError> {
        let now = self.clock.now();

        let Some(embed) = self
            .store
            .find_embed_token(gallery_id, &hash_token(token))
            .await?
        else {
            metrics::record_embed_resolution("not_found");
            return Err(AppError::not_found("Embed token not found"));
        };

        if embed.status() != EmbedTokenStatus::Active {
            metrics::record_embed_resolution("inactive");
            tracing::info!(token_id = %embed.token_id, status = %embed.status_code, "Embed token not active");
            return Err(AppError::unauthorized(format!(
                "Embed token is {}",
                embed.status().as_str()
            )));
        }

        if embed.is_expired_at(now) {
            if self.store.mark_embed_token_expired(embed.token_id).await? {
                audit(
                    self.store.as_ref(),
                    AuditEvent::system_action(
                        AuditEventType::EmbedTokenExpired,
                        "embed_token",
                        embed.token_id,
                        None,
                        now,
                    ),
                )
                .await;
            }
            metrics::record_embed_resolution("expired");
            tracing::info!(token_id = %embed.token_id, "Embed token expired");
            return Err(AppError::unauthorized("Embed token has expired"));
        }

        if !domain_allowed(&embed.allowed_domains, origin) {
            metrics::record_embed_resolution("domain_denied");
            tracing::warn!(
                token_id = %embed.token_id,
                origin = origin.unwrap_or("<none>"),
                "Embed origin not allowed"
            );
            return Err(AppError::forbidden("Domain not allowed for this embed"));
        }

        let used_domain = origin.and_then(normalize_domain);
        self.store
            .record_embed_usage(embed.token_id, used_domain.as_deref(), now)
            .await?;

        let consent = match self
            .store
            .find_syndication_consent(gallery_id, embed.site_id)
            .await?
        {
            Some(consent) if consent.is_approved() => consent,
            other => {
                let consent_state = other
                    .as_ref()
                    .map(|c| c.status().as_str())
                    .unwrap_or("missing");
                metrics::record_embed_resolution("not_syndicated");
                tracing::info!(
                    token_id = %embed.token_id,
                    site_id = %embed.site_id,
                    consent_state,
                    "Gallery not syndicated to site"
                );
                return Err(AppError::forbidden("Gallery is not syndicated to this site"));
            }
        };

        let gallery = self
            .store
            .get_gallery(gallery_id)
            .await?
            .ok_or_else(|| AppError::not_found("Gallery not found"))?;
        let items = self
            .store
            .list_gallery_items(gallery_id, embed.max_photos.map(i64::from))
            .await?;

        let display = embed.display();
        let full_resolution = embed.full_resolution && consent.allow_full_resolution;
        let items = items
            .into_iter()
            .map(|media| EmbedItem {
                media_id: media.media_id,
                url: if full_resolution {
                    media.full_url
                } else {
                    media.thumbnail_url
                },
                caption: media.caption.filter(|_| display.show_captions),
                attribution: media.creator_name.filter(|_| display.show_attribution),
            })
            .collect();

        metrics::record_embed_resolution("served");
        Ok(EmbedPayload {
            gallery_id,
            title: gallery.title,
            layout: display.layout,
            theme: display.theme,
            full_resolution,
            allow_download: consent.allow_download,
            allow_embedding: consent.allow_embedding,
            items,
        })
    }
}
