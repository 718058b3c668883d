//! Share tokens: bearer links to one story, validated on every view.

use chrono::{DateTime, Utc};
use serde::Serialize;
use service_core::error::AppError;
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

use super::access::owned_story;
use super::clock::Clock;
use super::metrics;
use super::store::{audit, ConsentStore};
use super::tokens::{generate_token, hash_token};
use crate::models::{AuditEvent, AuditEventType, Requester, ShareToken, ShareTokenStatus};

#[derive(Debug, Clone)]
pub struct IssueShareRequest {
    pub story_id: Uuid,
    pub expires_at: Option<DateTime<Utc>>,
    pub max_views: Option<i32>,
}

/// Returned once at issue time; the plaintext token is not stored.
#[derive(Debug, Clone, Serialize)]
pub struct IssuedShareToken {
    pub token_id: Uuid,
    pub token: String,
    pub share_url: String,
    pub story_id: Uuid,
    pub expires_at: Option<DateTime<Utc>>,
    pub max_views: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShareValidation {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub story_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ShareTokenSummary {
    pub token_id: Uuid,
    pub story_id: Uuid,
    pub status: ShareTokenStatus,
    pub expires_at: Option<DateTime<Utc>>,
    pub max_views: Option<i32>,
    pub view_count: i32,
    pub created_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
}

impl ShareTokenSummary {
    fn from_token(token: ShareToken, now: DateTime<Utc>) -> Self {
        Self {
            status: token.effective_status(now),
            token_id: token.token_id,
            story_id: token.story_id,
            expires_at: token.expires_at,
            max_views: token.max_views,
            view_count: token.view_count,
            created_at: token.created_at,
            revoked_at: token.revoked_at,
        }
    }
}

#[derive(Clone)]
pub struct ShareTokens {
    store: Arc<dyn ConsentStore>,
    clock: Arc<dyn Clock>,
    share_base_url: String,
}

impl ShareTokens {
    pub fn new(store: Arc<dyn ConsentStore>, clock: Arc<dyn Clock>, share_base_url: &str) -> Self {
        Self {
            store,
            clock,
            share_base_url: share_base_url.trim_end_matches('/').to_string(),
        }
    }

    #[instrument(skip(self, request), fields(story_id = %request.story_id, requester = %requester.user_id))]
    pub async fn issue(
        &self,
        request: IssueShareRequest,
        requester: &Requester,
    ) -> Result<IssuedShareToken, AppError> {
        let now = self.clock.now();
        if request.max_views.is_some_and(|m| m < 1) {
            return Err(AppError::invalid("max_views must be at least 1"));
        }
        if request.expires_at.is_some_and(|e| e <= now) {
            return Err(AppError::invalid("expires_at must be in the future"));
        }

        let story = owned_story(self.store.as_ref(), request.story_id, requester).await?;
        if story.is_withdrawn() {
            return Err(AppError::invalid("Cannot share a withdrawn story"));
        }

        let token = generate_token();
        let record = ShareToken::new(
            hash_token(&token),
            request.story_id,
            requester.user_id,
            request.expires_at,
            request.max_views,
            now,
        );
        self.store.insert_share_token(&record).await?;

        audit(
            self.store.as_ref(),
            AuditEvent::user_action(
                requester.user_id,
                AuditEventType::ShareTokenIssued,
                "share_token",
                record.token_id,
                Some(serde_json::json!({
                    "story_id": record.story_id,
                    "expires_at": record.expires_at,
                    "max_views": record.max_views,
                })),
                now,
            ),
        )
        .await;

        tracing::info!(token_id = %record.token_id, "Share token issued");

        Ok(IssuedShareToken {
            token_id: record.token_id,
            share_url: format!("{}/{}", self.share_base_url, token),
            token,
            story_id: record.story_id,
            expires_at: record.expires_at,
            max_views: record.max_views,
        })
    }

    /// Check a presented token and count the view if it passes.
    ///
    /// Refusals are results, not errors: the viewer gets the specific reason.
    #[instrument(skip_all)]
    pub async fn validate_and_consume(&self, token: &str) -> Result<ShareValidation, AppError> {
        let outcome = self
            .store
            .consume_share_token(&hash_token(token), self.clock.now())
            .await?;

        match outcome {
            Ok(consumed) => {
                metrics::record_share_validation("valid");
                tracing::info!(
                    token_id = %consumed.token_id,
                    view_count = consumed.view_count,
                    "Share token consumed"
                );
                Ok(ShareValidation {
                    valid: true,
                    story_id: Some(consumed.story_id),
                    reason: None,
                })
            }
            Err(rejection) => {
                metrics::record_share_validation(rejection.as_str());
                tracing::info!(outcome = rejection.as_str(), "Share token rejected");
                Ok(ShareValidation {
                    valid: false,
                    story_id: None,
                    reason: Some(rejection.reason().to_string()),
                })
            }
        }
    }

    #[instrument(skip(self), fields(requester = %requester.user_id))]
    pub async fn revoke(&self, token_id: Uuid, requester: &Requester) -> Result<bool, AppError> {
        let token = self
            .store
            .find_share_token(token_id)
            .await?
            .ok_or_else(|| AppError::not_found("Share token not found"))?;
        owned_story(self.store.as_ref(), token.story_id, requester).await?;

        let now = self.clock.now();
        let revoked = self.store.revoke_share_token(token_id, now).await?;
        if revoked {
            audit(
                self.store.as_ref(),
                AuditEvent::user_action(
                    requester.user_id,
                    AuditEventType::ShareTokenRevoked,
                    "share_token",
                    token_id,
                    None,
                    now,
                ),
            )
            .await;
            tracing::info!(token_id = %token_id, "Share token revoked");
        }
        Ok(revoked)
    }

    #[instrument(skip(self), fields(requester = %requester.user_id))]
    pub async fn list(
        &self,
        story_id: Uuid,
        requester: &Requester,
    ) -> Result<Vec<ShareTokenSummary>, AppError> {
        owned_story(self.store.as_ref(), story_id, requester).await?;
        let now = self.clock.now();
        Ok(self
            .store
            .list_share_tokens(story_id)
            .await?
            .into_iter()
            .map(|t| ShareTokenSummary::from_token(t, now))
            .collect())
    }
}
