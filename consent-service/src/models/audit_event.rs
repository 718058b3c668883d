//! Audit event model - append-only trail of consent state changes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    ConsentGranted,
    ConsentRevoked,
    ConsentSuperseded,
    ConsentUpdated,
    ShareTokenIssued,
    ShareTokenRevoked,
    EmbedTokenIssued,
    EmbedTokenRevoked,
    EmbedTokenExpired,
    SyndicationDecided,
    TagProposed,
    TagResponded,
    TagRemoved,
}

impl AuditEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditEventType::ConsentGranted => "consent_granted",
            AuditEventType::ConsentRevoked => "consent_revoked",
            AuditEventType::ConsentSuperseded => "consent_superseded",
            AuditEventType::ConsentUpdated => "consent_updated",
            AuditEventType::ShareTokenIssued => "share_token_issued",
            AuditEventType::ShareTokenRevoked => "share_token_revoked",
            AuditEventType::EmbedTokenIssued => "embed_token_issued",
            AuditEventType::EmbedTokenRevoked => "embed_token_revoked",
            AuditEventType::EmbedTokenExpired => "embed_token_expired",
            AuditEventType::SyndicationDecided => "syndication_decided",
            AuditEventType::TagProposed => "tag_proposed",
            AuditEventType::TagResponded => "tag_responded",
            AuditEventType::TagRemoved => "tag_removed",
        }
    }
}

/// Audit event entity.
#[derive(Debug, Clone, FromRow)]
pub struct AuditEvent {
    pub event_id: Uuid,
    pub actor_id: Option<Uuid>,
    pub event_type_code: String,
    pub target_type: String,
    pub target_id: Uuid,
    pub event_data: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

impl AuditEvent {
    /// Event caused by a requester.
    pub fn user_action(
        actor_id: Uuid,
        event_type: AuditEventType,
        target_type: &str,
        target_id: Uuid,
        event_data: Option<serde_json::Value>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            actor_id: Some(actor_id),
            event_type_code: event_type.as_str().to_string(),
            target_type: target_type.to_string(),
            target_id,
            event_data,
            created_at: now,
        }
    }

    /// Lazy transition with no actor, e.g. an embed token found expired.
    pub fn system_action(
        event_type: AuditEventType,
        target_type: &str,
        target_id: Uuid,
        event_data: Option<serde_json::Value>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            actor_id: None,
            event_type_code: event_type.as_str().to_string(),
            target_type: target_type.to_string(),
            target_id,
            event_data,
            created_at: now,
        }
    }
}
