//! Test helpers for consent-service integration tests.
//!
//! Wires the domain services over the in-memory store with a manual clock
//! and a recording notifier, so tests can control time and observe
//! revocation callbacks.

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use chrono::{DateTime, TimeZone, Utc};
use consent_service::{
    build_router,
    models::{Gallery, MediaAsset, Requester, Site, Story},
    services::{ManualClock, MemoryStore, MockNotifier},
    AppState,
};
use service_core::middleware::rate_limit::create_ip_rate_limiter;
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

pub const SHARE_BASE_URL: &str = "https://stories.test/s";

pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
}

/// Test application over the in-memory store.
pub struct TestApp {
    pub store: MemoryStore,
    pub clock: Arc<ManualClock>,
    pub notifier: Arc<MockNotifier>,
    pub state: AppState,
    pub owner: Requester,
    pub story: Story,
    pub site: Site,
}

impl TestApp {
    pub fn spawn() -> Self {
        Self::with_notifier(MockNotifier::new())
    }

    pub fn with_notifier(notifier: MockNotifier) -> Self {
        let store = MemoryStore::new();
        let clock = Arc::new(ManualClock::new(start_time()));
        let notifier = Arc::new(notifier);

        let owner = Requester::user(Uuid::new_v4());
        let story = store.add_story(owner.user_id);
        let site = store.add_site("Community Archive", Some("archive.example.org"));

        let state = AppState::new(
            Arc::new(store.clone()),
            clock.clone(),
            notifier.clone(),
            SHARE_BASE_URL,
            create_ip_rate_limiter(1000, 60),
            vec!["http://localhost:3000".to_string()],
        );

        Self {
            store,
            clock,
            notifier,
            state,
            owner,
            story,
            site,
        }
    }

    pub fn router(&self) -> Router {
        build_router(self.state.clone())
    }

    /// A gallery owned by `owner` with `photos` media items.
    pub fn gallery(&self, photos: usize) -> (Gallery, Vec<MediaAsset>) {
        let gallery = self.store.add_gallery(self.owner.user_id, "Harvest Festival");
        let media = (0..photos)
            .map(|_| self.store.add_media(self.owner.user_id, Some(gallery.gallery_id)))
            .collect();
        (gallery, media)
    }

    pub fn stranger(&self) -> Requester {
        Requester::user(Uuid::new_v4())
    }

    /// Send one request through a fresh router.
    pub async fn send(&self, request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = self
            .router()
            .oneshot(request)
            .await
            .expect("Failed to execute request");
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("Failed to read body");
        let body = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("Failed to parse response")
        };
        (status, body)
    }
}

fn with_identity(
    builder: axum::http::request::Builder,
    requester: &Requester,
) -> axum::http::request::Builder {
    let builder = builder.header("x-user-id", requester.user_id.to_string());
    if requester.is_admin {
        builder.header("x-user-role", "admin")
    } else if requester.is_service {
        builder.header("x-user-role", "service")
    } else {
        builder
    }
}

/// JSON request carrying the gateway identity headers.
pub fn json_request(
    method: &str,
    uri: &str,
    requester: &Requester,
    body: serde_json::Value,
) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    with_identity(builder, requester)
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn get_request(uri: &str, requester: Option<&Requester>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(requester) = requester {
        builder = with_identity(builder, requester);
    }
    builder.body(Body::empty()).unwrap()
}
