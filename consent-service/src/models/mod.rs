//! Domain models for consent-service.
//!
//! Enumerations are persisted as lowercase `*_code` text columns and parsed
//! back through `as_str` / `parse`.

pub mod audit_event;
pub mod consent_grant;
pub mod directory;
pub mod embed_token;
pub mod face_tag;
pub mod requester;
pub mod share_token;
pub mod syndication_consent;

pub use audit_event::{AuditEvent, AuditEventType};
pub use consent_grant::{ConsentGrant, GrantChanges, Visibility};
pub use directory::{Gallery, MediaAsset, Site, Story, StoryStatus};
pub use embed_token::{EmbedDisplay, EmbedLayout, EmbedTheme, EmbedToken, EmbedTokenStatus};
pub use face_tag::{FaceLocation, FaceTag, FaceTagStatus};
pub use requester::Requester;
pub use share_token::{ShareRejection, ShareToken, ShareTokenStatus};
pub use syndication_consent::{SyndicationConsent, SyndicationStatus};
