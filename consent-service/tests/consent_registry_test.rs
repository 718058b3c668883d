//! Consent registry integration tests.

mod common;

use chrono::Duration;
use common::TestApp;
use consent_service::models::{AuditEventType, GrantChanges, Requester, StoryStatus, Visibility};
use consent_service::services::registry::GrantRequest;
use consent_service::services::MockNotifier;
use service_core::error::AppError;
use uuid::Uuid;

fn grant_request(app: &TestApp, duration_days: Option<i64>) -> GrantRequest {
    GrantRequest {
        story_id: app.story.story_id,
        site_id: app.site.site_id,
        visibility: Visibility::Public,
        duration_days,
        featured: false,
        project_tags: vec!["oral-history".to_string()],
    }
}

#[tokio::test]
async fn grant_creates_active_consent() {
    // Arrange
    let app = TestApp::spawn();

    // Act
    let outcome = app
        .state
        .registry
        .grant(grant_request(&app, Some(30)), &app.owner)
        .await
        .expect("grant should succeed");

    // Assert
    assert_eq!(
        outcome.expires_at,
        Some(common::start_time() + Duration::days(30))
    );
    let status = app
        .state
        .registry
        .status(app.story.story_id, &app.owner)
        .await
        .unwrap();
    assert_eq!(status.total_sites, 1);
    assert_eq!(status.active_sites, 1);
    assert!(status.grants[0].active);
    assert_eq!(status.grants[0].visibility_id, outcome.visibility_id);

    let events = app.store.audit_events();
    assert!(events
        .iter()
        .any(|e| e.event_type_code == AuditEventType::ConsentGranted.as_str()
            && e.target_id == outcome.visibility_id));
}

#[tokio::test]
async fn second_active_grant_for_pair_conflicts() {
    let app = TestApp::spawn();
    app.state
        .registry
        .grant(grant_request(&app, None), &app.owner)
        .await
        .unwrap();

    let err = app
        .state
        .registry
        .grant(grant_request(&app, None), &app.owner)
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Conflict(_)));
    assert_eq!(app.store.grants().len(), 1);
}

#[tokio::test]
async fn lapsed_grant_is_superseded_by_new_grant() {
    let app = TestApp::spawn();
    let first = app
        .state
        .registry
        .grant(grant_request(&app, Some(1)), &app.owner)
        .await
        .unwrap();
    app.clock.advance(Duration::days(2));

    let second = app
        .state
        .registry
        .grant(grant_request(&app, None), &app.owner)
        .await
        .expect("a lapsed grant must not block a new one");

    let grants = app.store.grants();
    let old = grants
        .iter()
        .find(|g| g.visibility_id == first.visibility_id)
        .unwrap();
    assert!(old.revoked_at.is_some());
    let status = app
        .state
        .registry
        .status(app.story.story_id, &app.owner)
        .await
        .unwrap();
    assert_eq!(status.active_sites, 1);
    assert_eq!(status.total_sites, 1);
    assert!(status
        .grants
        .iter()
        .any(|g| g.visibility_id == second.visibility_id && g.active));
    assert!(app
        .store
        .audit_events()
        .iter()
        .any(|e| e.event_type_code == AuditEventType::ConsentSuperseded.as_str()));
}

#[tokio::test]
async fn negative_duration_is_invalid() {
    let app = TestApp::spawn();

    let err = app
        .state
        .registry
        .grant(grant_request(&app, Some(-1)), &app.owner)
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Invalid(_)));
}

#[tokio::test]
async fn zero_duration_grant_is_never_active() {
    let app = TestApp::spawn();
    app.state
        .registry
        .grant(grant_request(&app, Some(0)), &app.owner)
        .await
        .unwrap();

    let status = app
        .state
        .registry
        .status(app.story.story_id, &app.owner)
        .await
        .unwrap();

    assert_eq!(status.active_sites, 0);
    assert!(!status.grants[0].active);
}

#[tokio::test]
async fn non_owner_cannot_grant_or_read_status() {
    let app = TestApp::spawn();
    let stranger = app.stranger();

    let err = app
        .state
        .registry
        .grant(grant_request(&app, None), &stranger)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    let err = app
        .state
        .registry
        .status(app.story.story_id, &stranger)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));
}

#[tokio::test]
async fn admin_cannot_grant_for_owner() {
    let app = TestApp::spawn();
    let admin = Requester::admin(Uuid::new_v4());

    let err = app
        .state
        .registry
        .grant(grant_request(&app, None), &admin)
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Forbidden(_)));
    assert!(app.store.grants().is_empty());
}

#[tokio::test]
async fn unknown_story_or_site_is_not_found() {
    let app = TestApp::spawn();

    let mut request = grant_request(&app, None);
    request.story_id = Uuid::new_v4();
    let err = app
        .state
        .registry
        .grant(request, &app.owner)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    let mut request = grant_request(&app, None);
    request.site_id = Uuid::new_v4();
    let err = app
        .state
        .registry
        .grant(request, &app.owner)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn revoke_closes_grant_and_notifies() {
    let app = TestApp::spawn();
    let outcome = app
        .state
        .registry
        .grant(grant_request(&app, None), &app.owner)
        .await
        .unwrap();

    let revoked = app
        .state
        .registry
        .revoke(
            app.story.story_id,
            app.site.site_id,
            &app.owner,
            Some("Family request".to_string()),
        )
        .await
        .unwrap();

    assert!(revoked);
    assert_eq!(app.notifier.notified(), vec![outcome.visibility_id]);
    let grant = &app.store.grants()[0];
    assert_eq!(grant.revoke_reason.as_deref(), Some("Family request"));
    assert!(grant.revoked_at.is_some());

    // Nothing left to revoke.
    let again = app
        .state
        .registry
        .revoke(app.story.story_id, app.site.site_id, &app.owner, None)
        .await
        .unwrap();
    assert!(!again);
    assert_eq!(app.notifier.notified().len(), 1);

    // The pair is free for a fresh grant.
    assert!(app
        .state
        .registry
        .grant(grant_request(&app, None), &app.owner)
        .await
        .is_ok());
}

#[tokio::test]
async fn notifier_failure_does_not_fail_revocation() {
    let app = TestApp::with_notifier(MockNotifier::failing());
    app.state
        .registry
        .grant(grant_request(&app, None), &app.owner)
        .await
        .unwrap();

    let revoked = app
        .state
        .registry
        .revoke(app.story.story_id, app.site.site_id, &app.owner, None)
        .await;

    assert!(matches!(revoked, Ok(true)));
}

#[tokio::test]
async fn views_are_counted_only_while_consent_is_active() {
    let app = TestApp::spawn();
    let renderer = Requester::service(Uuid::new_v4());
    app.state
        .registry
        .grant(grant_request(&app, Some(1)), &app.owner)
        .await
        .unwrap();

    assert!(app
        .state
        .registry
        .record_view(app.story.story_id, app.site.site_id, &renderer)
        .await
        .unwrap());
    assert!(app
        .state
        .registry
        .record_view(app.story.story_id, app.site.site_id, &renderer)
        .await
        .unwrap());

    app.clock.advance(Duration::days(1));
    assert!(!app
        .state
        .registry
        .record_view(app.story.story_id, app.site.site_id, &renderer)
        .await
        .unwrap());

    assert_eq!(app.store.grants()[0].view_count, 2);
}

#[tokio::test]
async fn only_site_integrations_report_views() {
    let app = TestApp::spawn();
    app.state
        .registry
        .grant(grant_request(&app, None), &app.owner)
        .await
        .unwrap();

    for requester in [app.owner, app.stranger()] {
        let err = app
            .state
            .registry
            .record_view(app.story.story_id, app.site.site_id, &requester)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }
    assert_eq!(app.store.grants()[0].view_count, 0);

    let admin = Requester::admin(Uuid::new_v4());
    assert!(app
        .state
        .registry
        .record_view(app.story.story_id, app.site.site_id, &admin)
        .await
        .unwrap());
}

#[tokio::test]
async fn status_survives_story_withdrawal() {
    let app = TestApp::spawn();
    app.state
        .registry
        .grant(grant_request(&app, None), &app.owner)
        .await
        .unwrap();
    app.store
        .set_story_status(app.story.story_id, StoryStatus::Withdrawn);

    let status = app
        .state
        .registry
        .status(app.story.story_id, &app.owner)
        .await
        .unwrap();

    assert_eq!(status.grants.len(), 1);
}

#[tokio::test]
async fn grant_lapses_without_being_revoked() {
    let app = TestApp::spawn();
    app.state
        .registry
        .grant(grant_request(&app, Some(30)), &app.owner)
        .await
        .unwrap();

    app.clock.advance(Duration::days(31));
    let status = app
        .state
        .registry
        .status(app.story.story_id, &app.owner)
        .await
        .unwrap();

    assert_eq!(status.active_sites, 0);
    assert!(!status.grants[0].active);
    assert!(status.grants[0].revoked_at.is_none());
}

#[tokio::test]
async fn revoked_grant_shows_inactive_in_status() {
    let app = TestApp::spawn();
    app.state
        .registry
        .grant(grant_request(&app, None), &app.owner)
        .await
        .unwrap();
    app.state
        .registry
        .revoke(app.story.story_id, app.site.site_id, &app.owner, None)
        .await
        .unwrap();

    let status = app
        .state
        .registry
        .status(app.story.story_id, &app.owner)
        .await
        .unwrap();

    assert_eq!(status.total_sites, 1);
    assert_eq!(status.active_sites, 0);
    assert!(!status.grants[0].active);
}

#[tokio::test]
async fn update_changes_settings_without_revoking() {
    // Arrange
    let app = TestApp::spawn();
    let outcome = app
        .state
        .registry
        .grant(grant_request(&app, Some(30)), &app.owner)
        .await
        .unwrap();

    // Act
    let summary = app
        .state
        .registry
        .update(
            app.story.story_id,
            app.site.site_id,
            GrantChanges {
                visibility: Some(Visibility::Unlisted),
                featured: Some(true),
                ..Default::default()
            },
            &app.owner,
        )
        .await
        .unwrap();

    // Assert
    assert_eq!(summary.visibility_id, outcome.visibility_id);
    assert_eq!(summary.visibility, Visibility::Unlisted);
    assert!(summary.featured);
    assert_eq!(summary.project_tags, vec!["oral-history"]);
    assert_eq!(summary.expires_at, outcome.expires_at);
    assert!(summary.active);
    assert_eq!(app.store.grants().len(), 1);
    assert!(app.notifier.notified().is_empty());

    let event = app
        .store
        .audit_events()
        .into_iter()
        .find(|e| e.event_type_code == AuditEventType::ConsentUpdated.as_str())
        .expect("update should be audited");
    let data = event.event_data.unwrap();
    assert_eq!(data["before"]["visibility"], "public");
    assert_eq!(data["after"]["visibility"], "unlisted");
}

#[tokio::test]
async fn update_needs_an_active_grant_and_the_owner() {
    let app = TestApp::spawn();
    let changes = GrantChanges {
        featured: Some(true),
        ..Default::default()
    };

    let err = app
        .state
        .registry
        .update(app.story.story_id, app.site.site_id, changes.clone(), &app.owner)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    app.state
        .registry
        .grant(grant_request(&app, Some(1)), &app.owner)
        .await
        .unwrap();

    let err = app
        .state
        .registry
        .update(app.story.story_id, app.site.site_id, changes.clone(), &app.stranger())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    let err = app
        .state
        .registry
        .update(
            app.story.story_id,
            app.site.site_id,
            GrantChanges::default(),
            &app.owner,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Invalid(_)));

    // A lapsed grant is not brought back to life by an update.
    app.clock.advance(Duration::days(1));
    let err = app
        .state
        .registry
        .update(app.story.story_id, app.site.site_id, changes, &app.owner)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
    assert!(!app.store.grants()[0].featured);
}

#[tokio::test]
async fn revoke_all_closes_every_active_grant() {
    // Arrange
    let app = TestApp::spawn();
    let second_site = app.store.add_site("Regional Library", Some("library.example"));
    let third_site = app.store.add_site("Lapsed Partner", None);

    let first = app
        .state
        .registry
        .grant(grant_request(&app, None), &app.owner)
        .await
        .unwrap();
    let mut request = grant_request(&app, None);
    request.site_id = second_site.site_id;
    let second = app.state.registry.grant(request, &app.owner).await.unwrap();
    let mut request = grant_request(&app, Some(0));
    request.site_id = third_site.site_id;
    app.state.registry.grant(request, &app.owner).await.unwrap();

    // Act
    let revoked = app
        .state
        .registry
        .revoke_all(
            app.story.story_id,
            &app.owner,
            Some("Story deleted".to_string()),
        )
        .await
        .unwrap();

    // Assert
    assert_eq!(revoked.len(), 2);
    assert!(revoked.contains(&first.visibility_id));
    assert!(revoked.contains(&second.visibility_id));
    let mut notified = app.notifier.notified();
    notified.sort();
    let mut expected = revoked.clone();
    expected.sort();
    assert_eq!(notified, expected);

    let status = app
        .state
        .registry
        .status(app.story.story_id, &app.owner)
        .await
        .unwrap();
    assert_eq!(status.active_sites, 0);
    assert!(status
        .grants
        .iter()
        .filter(|g| g.revoked_at.is_some())
        .all(|g| g.revoke_reason.as_deref() == Some("Story deleted")));

    let again = app
        .state
        .registry
        .revoke_all(app.story.story_id, &app.owner, None)
        .await
        .unwrap();
    assert!(again.is_empty());
}

#[tokio::test]
async fn revoke_all_is_owner_only() {
    let app = TestApp::spawn();
    app.state
        .registry
        .grant(grant_request(&app, None), &app.owner)
        .await
        .unwrap();

    let err = app
        .state
        .registry
        .revoke_all(app.story.story_id, &app.stranger(), None)
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Forbidden(_)));
    assert!(app.store.grants()[0].revoked_at.is_none());
}

#[tokio::test]
async fn site_lists_only_stories_it_may_show() {
    // Arrange
    let app = TestApp::spawn();
    let renderer = Requester::service(Uuid::new_v4());
    let withdrawn = app.store.add_story(app.owner.user_id);
    let lapsed = app.store.add_story(app.owner.user_id);
    let revoked = app.store.add_story(app.owner.user_id);

    app.state
        .registry
        .grant(grant_request(&app, None), &app.owner)
        .await
        .unwrap();
    for (story, days) in [(&withdrawn, None), (&lapsed, Some(1)), (&revoked, None)] {
        let mut request = grant_request(&app, days);
        request.story_id = story.story_id;
        app.state.registry.grant(request, &app.owner).await.unwrap();
    }
    app.store
        .set_story_status(withdrawn.story_id, StoryStatus::Withdrawn);
    app.state
        .registry
        .revoke(revoked.story_id, app.site.site_id, &app.owner, None)
        .await
        .unwrap();
    app.clock.advance(Duration::days(1));

    // Act
    let stories = app
        .state
        .registry
        .stories_for_site(app.site.site_id, &renderer)
        .await
        .unwrap();

    // Assert
    assert_eq!(stories.len(), 1);
    assert_eq!(stories[0].story_id, app.story.story_id);
    assert_eq!(stories[0].visibility, Visibility::Public);
}

#[tokio::test]
async fn site_story_list_is_for_site_integrations() {
    let app = TestApp::spawn();

    let err = app
        .state
        .registry
        .stories_for_site(app.site.site_id, &app.owner)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    let err = app
        .state
        .registry
        .stories_for_site(Uuid::new_v4(), &Requester::service(Uuid::new_v4()))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}
