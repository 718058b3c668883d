//! Share token integration tests.

mod common;

use chrono::Duration;
use common::{TestApp, SHARE_BASE_URL};
use consent_service::models::{ShareTokenStatus, StoryStatus};
use consent_service::services::share::IssueShareRequest;
use service_core::error::AppError;
use uuid::Uuid;

fn share_request(app: &TestApp, expires_in: Option<Duration>, max_views: Option<i32>) -> IssueShareRequest {
    IssueShareRequest {
        story_id: app.story.story_id,
        expires_at: expires_in.map(|d| common::start_time() + d),
        max_views,
    }
}

#[tokio::test]
async fn issued_token_validates_and_counts_views() {
    // Arrange
    let app = TestApp::spawn();
    let issued = app
        .state
        .shares
        .issue(share_request(&app, None, None), &app.owner)
        .await
        .unwrap();

    // Act
    let first = app.state.shares.validate_and_consume(&issued.token).await.unwrap();
    let second = app.state.shares.validate_and_consume(&issued.token).await.unwrap();

    // Assert
    assert_eq!(issued.token.len(), 43);
    assert_eq!(issued.share_url, format!("{}/{}", SHARE_BASE_URL, issued.token));
    assert!(first.valid && second.valid);
    assert_eq!(first.story_id, Some(app.story.story_id));

    let tokens = app.state.shares.list(app.story.story_id, &app.owner).await.unwrap();
    assert_eq!(tokens.len(), 1);
    assert_eq!(tokens[0].view_count, 2);
}

#[tokio::test]
async fn unknown_token_is_not_found() {
    let app = TestApp::spawn();

    let result = app
        .state
        .shares
        .validate_and_consume("not-a-real-token")
        .await
        .unwrap();

    assert!(!result.valid);
    assert_eq!(result.reason.as_deref(), Some("Token not found"));
    assert_eq!(result.story_id, None);
}

#[tokio::test]
async fn max_views_admits_exactly_that_many() {
    let app = TestApp::spawn();
    let issued = app
        .state
        .shares
        .issue(share_request(&app, None, Some(3)), &app.owner)
        .await
        .unwrap();

    let mut outcomes = Vec::new();
    for _ in 0..4 {
        outcomes.push(app.state.shares.validate_and_consume(&issued.token).await.unwrap());
    }

    assert!(outcomes[..3].iter().all(|o| o.valid));
    assert!(!outcomes[3].valid);
    assert_eq!(outcomes[3].reason.as_deref(), Some("Maximum views reached"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_single_view_token_admits_one_viewer() {
    let app = TestApp::spawn();
    let issued = app
        .state
        .shares
        .issue(share_request(&app, None, Some(1)), &app.owner)
        .await
        .unwrap();

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let shares = app.state.shares.clone();
            let token = issued.token.clone();
            tokio::spawn(async move { shares.validate_and_consume(&token).await })
        })
        .collect();
    let results: Vec<_> = futures::future::join_all(handles)
        .await
        .into_iter()
        .map(|r| r.unwrap().unwrap())
        .collect();

    let (admitted, refused): (Vec<_>, Vec<_>) = results.into_iter().partition(|v| v.valid);
    assert_eq!(admitted.len(), 1);
    assert_eq!(refused.len(), 15);
    assert!(refused
        .iter()
        .all(|v| v.reason.as_deref() == Some("Maximum views reached")));

    let tokens = app.state.shares.list(app.story.story_id, &app.owner).await.unwrap();
    assert_eq!(tokens[0].view_count, 1);
}

#[tokio::test]
async fn expiry_is_inclusive_and_reported() {
    let app = TestApp::spawn();
    let issued = app
        .state
        .shares
        .issue(share_request(&app, Some(Duration::hours(1)), None), &app.owner)
        .await
        .unwrap();

    app.clock.advance(Duration::hours(1));
    let result = app.state.shares.validate_and_consume(&issued.token).await.unwrap();

    assert!(!result.valid);
    assert_eq!(result.reason.as_deref(), Some("Token has expired"));
    let tokens = app.state.shares.list(app.story.story_id, &app.owner).await.unwrap();
    assert_eq!(tokens[0].status, ShareTokenStatus::Expired);
    assert_eq!(tokens[0].view_count, 0);
}

#[tokio::test]
async fn withdrawn_story_refuses_views() {
    let app = TestApp::spawn();
    let issued = app
        .state
        .shares
        .issue(share_request(&app, None, None), &app.owner)
        .await
        .unwrap();

    app.store
        .set_story_status(app.story.story_id, StoryStatus::Withdrawn);
    let result = app.state.shares.validate_and_consume(&issued.token).await.unwrap();

    assert!(!result.valid);
    assert_eq!(result.reason.as_deref(), Some("Story has been withdrawn"));
    let tokens = app.state.shares.list(app.story.story_id, &app.owner).await.unwrap();
    assert_eq!(tokens[0].view_count, 0);
    assert_eq!(tokens[0].status, ShareTokenStatus::Active);
}

#[tokio::test]
async fn deleted_story_counts_as_withdrawn() {
    let app = TestApp::spawn();
    let issued = app
        .state
        .shares
        .issue(share_request(&app, None, None), &app.owner)
        .await
        .unwrap();

    app.store.remove_story(app.story.story_id);
    let result = app.state.shares.validate_and_consume(&issued.token).await.unwrap();

    assert_eq!(result.reason.as_deref(), Some("Story has been withdrawn"));
}

#[tokio::test]
async fn revoked_token_is_refused() {
    let app = TestApp::spawn();
    let issued = app
        .state
        .shares
        .issue(share_request(&app, None, None), &app.owner)
        .await
        .unwrap();

    assert!(app.state.shares.revoke(issued.token_id, &app.owner).await.unwrap());
    // Second revocation is a no-op.
    assert!(!app.state.shares.revoke(issued.token_id, &app.owner).await.unwrap());

    let result = app.state.shares.validate_and_consume(&issued.token).await.unwrap();
    assert!(!result.valid);
    assert_eq!(result.reason.as_deref(), Some("Token has been revoked"));
}

#[tokio::test]
async fn issue_rejects_bad_limits() {
    let app = TestApp::spawn();

    let err = app
        .state
        .shares
        .issue(share_request(&app, None, Some(0)), &app.owner)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Invalid(_)));

    let err = app
        .state
        .shares
        .issue(share_request(&app, Some(Duration::zero()), None), &app.owner)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Invalid(_)));
}

#[tokio::test]
async fn only_owner_manages_tokens() {
    let app = TestApp::spawn();
    let stranger = app.stranger();

    let err = app
        .state
        .shares
        .issue(share_request(&app, None, None), &stranger)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    let issued = app
        .state
        .shares
        .issue(share_request(&app, None, None), &app.owner)
        .await
        .unwrap();
    let err = app
        .state
        .shares
        .revoke(issued.token_id, &stranger)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    let err = app
        .state
        .shares
        .revoke(Uuid::new_v4(), &app.owner)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}
