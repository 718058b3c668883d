//! Syndication consent and embed token integration tests.

mod common;

use chrono::Duration;
use common::TestApp;
use consent_service::models::{
    AuditEventType, EmbedDisplay, EmbedTokenStatus, Gallery, SyndicationStatus,
};
use consent_service::services::syndication::{IssueEmbedRequest, IssuedEmbedToken, SyndicationDecision};
use consent_service::services::ConsentStore;
use service_core::error::AppError;

fn decision(app: &TestApp, gallery: &Gallery, status: SyndicationStatus) -> SyndicationDecision {
    SyndicationDecision {
        gallery_id: gallery.gallery_id,
        site_id: app.site.site_id,
        status,
        allow_full_resolution: false,
        allow_download: false,
        allow_embedding: true,
    }
}

fn embed_request(app: &TestApp, gallery: &Gallery, domains: &[&str]) -> IssueEmbedRequest {
    IssueEmbedRequest {
        gallery_id: gallery.gallery_id,
        site_id: app.site.site_id,
        expires_at: None,
        allowed_domains: domains.iter().map(|d| d.to_string()).collect(),
        max_photos: None,
        display: EmbedDisplay::default(),
        full_resolution: false,
    }
}

async fn approved_gallery(app: &TestApp, photos: usize) -> Gallery {
    let (gallery, _) = app.gallery(photos);
    app.state
        .syndication
        .set_consent(decision(app, &gallery, SyndicationStatus::Approved), &app.owner)
        .await
        .unwrap();
    gallery
}

async fn issue(app: &TestApp, request: IssueEmbedRequest) -> IssuedEmbedToken {
    app.state
        .syndication
        .issue_token(request, &app.owner)
        .await
        .unwrap()
}

#[tokio::test]
async fn approved_gallery_resolves_for_allowed_origin() {
    // Arrange
    let app = TestApp::spawn();
    let gallery = approved_gallery(&app, 3).await;
    let issued = issue(&app, embed_request(&app, &gallery, &["https://www.Partner.Example/"])).await;

    // Act
    let payload = app
        .state
        .syndication
        .resolve(
            gallery.gallery_id,
            &issued.token,
            Some("https://news.partner.example"),
        )
        .await
        .expect("resolve should succeed");

    // Assert
    assert_eq!(issued.allowed_domains, vec!["partner.example".to_string()]);
    assert_eq!(payload.title, "Harvest Festival");
    assert_eq!(payload.items.len(), 3);
    assert!(!payload.full_resolution);
    assert!(payload.items.iter().all(|i| i.url.contains("/thumb/")));
    assert_eq!(payload.items[0].caption.as_deref(), Some("Photo 1"));
    assert_eq!(
        payload.items[0].attribution.as_deref(),
        Some("Community Photographer")
    );
}

#[tokio::test]
async fn origin_outside_allow_list_is_forbidden() {
    let app = TestApp::spawn();
    let gallery = approved_gallery(&app, 1).await;
    let issued = issue(&app, embed_request(&app, &gallery, &["partner.example"])).await;

    let err = app
        .state
        .syndication
        .resolve(gallery.gallery_id, &issued.token, Some("https://notpartner.example"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    let err = app
        .state
        .syndication
        .resolve(gallery.gallery_id, &issued.token, None)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    // Local development hosts always pass.
    assert!(app
        .state
        .syndication
        .resolve(gallery.gallery_id, &issued.token, Some("http://localhost:8080"))
        .await
        .is_ok());
}

#[tokio::test]
async fn empty_allow_list_accepts_any_origin() {
    let app = TestApp::spawn();
    let gallery = approved_gallery(&app, 1).await;
    let issued = issue(&app, embed_request(&app, &gallery, &[])).await;

    let payload = app
        .state
        .syndication
        .resolve(gallery.gallery_id, &issued.token, None)
        .await;

    assert!(payload.is_ok());
}

#[tokio::test]
async fn usage_is_recorded_even_when_consent_is_missing() {
    let app = TestApp::spawn();
    let (gallery, _) = app.gallery(2);
    let issued = issue(&app, embed_request(&app, &gallery, &["partner.example"])).await;

    let err = app
        .state
        .syndication
        .resolve(gallery.gallery_id, &issued.token, Some("https://partner.example/page"))
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Forbidden(_)));
    let token = app
        .store
        .find_embed_token_by_id(issued.token_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(token.usage_count, 1);
    assert_eq!(token.last_used_domain.as_deref(), Some("partner.example"));
    assert_eq!(token.last_used_at, Some(common::start_time()));
}

#[tokio::test]
async fn denied_origin_does_not_record_usage() {
    let app = TestApp::spawn();
    let gallery = approved_gallery(&app, 1).await;
    let issued = issue(&app, embed_request(&app, &gallery, &["partner.example"])).await;

    let _ = app
        .state
        .syndication
        .resolve(gallery.gallery_id, &issued.token, Some("https://elsewhere.example"))
        .await;

    let token = app
        .store
        .find_embed_token_by_id(issued.token_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(token.usage_count, 0);
}

#[tokio::test]
async fn revoked_syndication_blocks_resolution() {
    let app = TestApp::spawn();
    let gallery = approved_gallery(&app, 1).await;
    let issued = issue(&app, embed_request(&app, &gallery, &[])).await;
    app.state
        .syndication
        .set_consent(decision(&app, &gallery, SyndicationStatus::Revoked), &app.owner)
        .await
        .unwrap();

    let err = app
        .state
        .syndication
        .resolve(gallery.gallery_id, &issued.token, None)
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Forbidden(_)));
}

#[tokio::test]
async fn full_resolution_requires_token_and_consent() {
    let app = TestApp::spawn();
    let (gallery, _) = app.gallery(2);
    let mut consent = decision(&app, &gallery, SyndicationStatus::Approved);
    consent.allow_full_resolution = true;
    app.state
        .syndication
        .set_consent(consent, &app.owner)
        .await
        .unwrap();

    let mut request = embed_request(&app, &gallery, &[]);
    request.full_resolution = true;
    let full = issue(&app, request).await;
    let thumbs = issue(&app, embed_request(&app, &gallery, &[])).await;

    let payload = app
        .state
        .syndication
        .resolve(gallery.gallery_id, &full.token, None)
        .await
        .unwrap();
    assert!(payload.full_resolution);
    assert!(payload.items.iter().all(|i| i.url.contains("/full/")));

    let payload = app
        .state
        .syndication
        .resolve(gallery.gallery_id, &thumbs.token, None)
        .await
        .unwrap();
    assert!(!payload.full_resolution);

    // Consent narrows what the token asked for.
    app.state
        .syndication
        .set_consent(decision(&app, &gallery, SyndicationStatus::Approved), &app.owner)
        .await
        .unwrap();
    let payload = app
        .state
        .syndication
        .resolve(gallery.gallery_id, &full.token, None)
        .await
        .unwrap();
    assert!(!payload.full_resolution);
    assert!(payload.items.iter().all(|i| i.url.contains("/thumb/")));
}

#[tokio::test]
async fn max_photos_and_display_flags_shape_payload() {
    let app = TestApp::spawn();
    let gallery = approved_gallery(&app, 5).await;
    let mut request = embed_request(&app, &gallery, &[]);
    request.max_photos = Some(2);
    request.display.show_captions = false;
    request.display.show_attribution = false;
    let issued = issue(&app, request).await;

    let payload = app
        .state
        .syndication
        .resolve(gallery.gallery_id, &issued.token, None)
        .await
        .unwrap();

    assert_eq!(payload.items.len(), 2);
    assert!(payload.items.iter().all(|i| i.caption.is_none() && i.attribution.is_none()));
}

#[tokio::test]
async fn expired_token_is_marked_once_and_refused() {
    let app = TestApp::spawn();
    let gallery = approved_gallery(&app, 1).await;
    let mut request = embed_request(&app, &gallery, &[]);
    request.expires_at = Some(common::start_time() + Duration::hours(2));
    let issued = issue(&app, request).await;

    app.clock.advance(Duration::hours(2));
    for _ in 0..2 {
        let err = app
            .state
            .syndication
            .resolve(gallery.gallery_id, &issued.token, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    let token = app
        .store
        .find_embed_token_by_id(issued.token_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(token.status(), EmbedTokenStatus::Expired);
    let expiries = app
        .store
        .audit_events()
        .iter()
        .filter(|e| e.event_type_code == AuditEventType::EmbedTokenExpired.as_str())
        .count();
    assert_eq!(expiries, 1);
}

#[tokio::test]
async fn token_is_bound_to_its_gallery() {
    let app = TestApp::spawn();
    let gallery = approved_gallery(&app, 1).await;
    let other = approved_gallery(&app, 1).await;
    let issued = issue(&app, embed_request(&app, &gallery, &[])).await;

    let err = app
        .state
        .syndication
        .resolve(other.gallery_id, &issued.token, None)
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn revoked_token_is_unauthorized() {
    let app = TestApp::spawn();
    let gallery = approved_gallery(&app, 1).await;
    let issued = issue(&app, embed_request(&app, &gallery, &[])).await;

    assert!(app
        .state
        .syndication
        .revoke_token(issued.token_id, &app.owner)
        .await
        .unwrap());

    let err = app
        .state
        .syndication
        .resolve(gallery.gallery_id, &issued.token, None)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Unauthorized(_)));
}

#[tokio::test]
async fn issue_validates_input_and_ownership() {
    let app = TestApp::spawn();
    let (gallery, _) = app.gallery(1);

    let err = app
        .state
        .syndication
        .issue_token(embed_request(&app, &gallery, &["bad host.example"]), &app.owner)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Invalid(_)));

    let mut request = embed_request(&app, &gallery, &[]);
    request.max_photos = Some(0);
    let err = app
        .state
        .syndication
        .issue_token(request, &app.owner)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Invalid(_)));

    let err = app
        .state
        .syndication
        .issue_token(embed_request(&app, &gallery, &[]), &app.stranger())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    let err = app
        .state
        .syndication
        .set_consent(decision(&app, &gallery, SyndicationStatus::Approved), &app.stranger())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));
}

#[tokio::test]
async fn syndication_decision_is_upserted_per_pair() {
    let app = TestApp::spawn();
    let (gallery, _) = app.gallery(1);

    let first = app
        .state
        .syndication
        .set_consent(decision(&app, &gallery, SyndicationStatus::Pending), &app.owner)
        .await
        .unwrap();
    let second = app
        .state
        .syndication
        .set_consent(decision(&app, &gallery, SyndicationStatus::Approved), &app.owner)
        .await
        .unwrap();

    assert_eq!(first.consent_id, second.consent_id);
    assert_eq!(second.status, SyndicationStatus::Approved);
}
