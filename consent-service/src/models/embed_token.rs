//! Embed token model - bearer credential for one gallery on one consuming site.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbedTokenStatus {
    Active,
    Expired,
    Revoked,
}

impl EmbedTokenStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmbedTokenStatus::Active => "active",
            EmbedTokenStatus::Expired => "expired",
            EmbedTokenStatus::Revoked => "revoked",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "active" => EmbedTokenStatus::Active,
            "expired" => EmbedTokenStatus::Expired,
            _ => EmbedTokenStatus::Revoked,
        }
    }
}

/// Gallery layout requested by the embedder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbedLayout {
    #[default]
    Grid,
    Carousel,
    Masonry,
    Single,
}

impl EmbedLayout {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmbedLayout::Grid => "grid",
            EmbedLayout::Carousel => "carousel",
            EmbedLayout::Masonry => "masonry",
            EmbedLayout::Single => "single",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "carousel" => EmbedLayout::Carousel,
            "masonry" => EmbedLayout::Masonry,
            "single" => EmbedLayout::Single,
            _ => EmbedLayout::Grid,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbedTheme {
    #[default]
    Light,
    Dark,
    Auto,
}

impl EmbedTheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmbedTheme::Light => "light",
            EmbedTheme::Dark => "dark",
            EmbedTheme::Auto => "auto",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "dark" => EmbedTheme::Dark,
            "auto" => EmbedTheme::Auto,
            _ => EmbedTheme::Light,
        }
    }
}

/// Display configuration carried by an embed token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbedDisplay {
    pub layout: EmbedLayout,
    pub theme: EmbedTheme,
    pub show_attribution: bool,
    pub show_captions: bool,
}

impl Default for EmbedDisplay {
    fn default() -> Self {
        Self {
            layout: EmbedLayout::Grid,
            theme: EmbedTheme::Light,
            show_attribution: true,
            show_captions: true,
        }
    }
}

/// Embed token entity.
///
/// The token decides who may ask; the gallery's syndication consent decides
/// what they get back.
#[derive(Debug, Clone, FromRow)]
pub struct EmbedToken {
    pub token_id: Uuid,
    pub token_hash: String,
    pub gallery_id: Uuid,
    pub site_id: Uuid,
    pub status_code: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub allowed_domains: Vec<String>,
    pub max_photos: Option<i32>,
    pub usage_count: i64,
    pub last_used_at: Option<DateTime<Utc>>,
    pub last_used_domain: Option<String>,
    pub layout_code: String,
    pub theme_code: String,
    pub show_attribution: bool,
    pub show_captions: bool,
    pub full_resolution: bool,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
}

impl EmbedToken {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        token_hash: String,
        gallery_id: Uuid,
        site_id: Uuid,
        created_by: Uuid,
        expires_at: Option<DateTime<Utc>>,
        allowed_domains: Vec<String>,
        max_photos: Option<i32>,
        display: EmbedDisplay,
        full_resolution: bool,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            token_id: Uuid::new_v4(),
            token_hash,
            gallery_id,
            site_id,
            status_code: EmbedTokenStatus::Active.as_str().to_string(),
            expires_at,
            allowed_domains,
            max_photos,
            usage_count: 0,
            last_used_at: None,
            last_used_domain: None,
            layout_code: display.layout.as_str().to_string(),
            theme_code: display.theme.as_str().to_string(),
            show_attribution: display.show_attribution,
            show_captions: display.show_captions,
            full_resolution,
            created_by,
            created_at: now,
            revoked_at: None,
        }
    }

    pub fn status(&self) -> EmbedTokenStatus {
        EmbedTokenStatus::parse(&self.status_code)
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|end| end <= now)
    }

    pub fn display(&self) -> EmbedDisplay {
        EmbedDisplay {
            layout: EmbedLayout::parse(&self.layout_code),
            theme: EmbedTheme::parse(&self.theme_code),
            show_attribution: self.show_attribution,
            show_captions: self.show_captions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn expiry_is_inclusive_of_the_deadline() {
        let now = Utc::now();
        let token = EmbedToken::new(
            "h".into(),
            Uuid::new_v4(),
            Uuid::new_v4(),
            Uuid::new_v4(),
            Some(now + Duration::hours(1)),
            vec![],
            None,
            EmbedDisplay::default(),
            false,
            now,
        );
        assert!(!token.is_expired_at(now));
        assert!(token.is_expired_at(now + Duration::hours(1)));
        assert_eq!(token.status(), EmbedTokenStatus::Active);
    }

    #[test]
    fn display_codes_survive_storage() {
        let display = EmbedDisplay {
            layout: EmbedLayout::Masonry,
            theme: EmbedTheme::Dark,
            show_attribution: false,
            show_captions: true,
        };
        let token = EmbedToken::new(
            "h".into(),
            Uuid::new_v4(),
            Uuid::new_v4(),
            Uuid::new_v4(),
            None,
            vec![],
            Some(4),
            display,
            true,
            Utc::now(),
        );
        assert_eq!(token.display(), display);
    }
}
