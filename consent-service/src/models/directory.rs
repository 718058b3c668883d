//! Read-only records owned by neighbouring services.

use sqlx::FromRow;
use uuid::Uuid;

/// Story lifecycle codes as published by the story store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoryStatus {
    Draft,
    Published,
    Withdrawn,
}

impl StoryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoryStatus::Draft => "draft",
            StoryStatus::Published => "published",
            StoryStatus::Withdrawn => "withdrawn",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "withdrawn" => StoryStatus::Withdrawn,
            "draft" => StoryStatus::Draft,
            _ => StoryStatus::Published,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct Story {
    pub story_id: Uuid,
    pub owner_id: Uuid,
    pub status_code: String,
}

impl Story {
    pub fn status(&self) -> StoryStatus {
        StoryStatus::parse(&self.status_code)
    }

    pub fn is_withdrawn(&self) -> bool {
        self.status() == StoryStatus::Withdrawn
    }
}

/// External site that consumes syndicated content.
#[derive(Debug, Clone, FromRow)]
pub struct Site {
    pub site_id: Uuid,
    pub site_name: String,
    pub primary_domain: Option<String>,
}

/// Gallery record from the media directory.
#[derive(Debug, Clone, FromRow)]
pub struct Gallery {
    pub gallery_id: Uuid,
    pub owner_id: Uuid,
    pub title: String,
}

/// Media asset, optionally placed in a gallery.
#[derive(Debug, Clone, FromRow)]
pub struct MediaAsset {
    pub media_id: Uuid,
    pub uploader_id: Uuid,
    pub gallery_id: Option<Uuid>,
    pub sort_order: i32,
    pub full_url: String,
    pub thumbnail_url: String,
    pub caption: Option<String>,
    pub creator_name: Option<String>,
}
