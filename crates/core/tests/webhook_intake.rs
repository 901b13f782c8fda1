mod support;

use cadence_core::{WebhookDisposition, WebhookIntake, WebhookNotification};
use cadence_domain::{CadenceError, CalendarProvider, SyncStatus, WebhookSubscription};
use chrono::Duration;
use support::provider::{page, remote_event};
use support::*;

fn subscription() -> WebhookSubscription {
    WebhookSubscription {
        subscription_id: "channel-42".into(),
        resource_id: Some("resource-1".into()),
        channel_token: "s3cret".into(),
        callback_url: "https://cadence.example.com/webhooks/google".into(),
        expires_at: base_time() + Duration::days(7),
    }
}

fn notification(state: &str) -> WebhookNotification {
    WebhookNotification {
        provider: CalendarProvider::Google,
        subscription_id: "channel-42".into(),
        resource_id: Some("resource-1".into()),
        channel_token: Some("s3cret".into()),
        resource_state: Some(state.into()),
    }
}

fn setup() -> (Harness, WebhookIntake, uuid::Uuid) {
    let harness = Harness::new();
    let integration = integration(user());
    let mut calendar = google_calendar(user(), integration.id);
    calendar.webhook = Some(subscription());
    harness.store.put_integration(integration);
    harness.store.put_calendar(calendar.clone());
    let intake = WebhookIntake::new(harness.store.clone(), harness.orchestrator.clone());
    (harness, intake, calendar.id)
}

#[tokio::test]
async fn change_notification_triggers_incremental_sync() {
    let (harness, intake, calendar_id) = setup();
    harness.google.push_page(page(
        vec![remote_event("r1", "Planning", at(1, 9, 0), at(1, 10, 0), base_time())],
        "t1",
    ));

    let disposition = intake.handle(notification("exists")).await.unwrap();

    match disposition {
        WebhookDisposition::Synced { calendar_id: synced, counters } => {
            assert_eq!(synced, calendar_id);
            assert_eq!(counters.created, 1);
        }
        other => panic!("expected a sync, got {other:?}"),
    }
    assert_eq!(harness.store.calendar(calendar_id).sync_token.as_deref(), Some("t1"));
}

#[tokio::test]
async fn duplicate_notifications_do_not_duplicate_events() {
    let (harness, intake, calendar_id) = setup();
    let event = || remote_event("r1", "Planning", at(1, 9, 0), at(1, 10, 0), base_time());
    harness.google.push_page(page(vec![event()], "t1"));
    harness.google.push_page(page(vec![event()], "t2"));

    intake.handle(notification("exists")).await.unwrap();
    intake.handle(notification("exists")).await.unwrap();

    assert_eq!(harness.store.events(calendar_id).len(), 1);
}

#[tokio::test]
async fn handshake_is_acknowledged_without_sync() {
    let (harness, intake, _) = setup();

    let disposition = intake.handle(notification("sync")).await.unwrap();

    assert_eq!(disposition, WebhookDisposition::Handshake);
    assert!(harness.google.calls().is_empty());
}

#[tokio::test]
async fn wrong_channel_token_is_rejected() {
    let (harness, intake, _) = setup();
    let mut forged = notification("exists");
    forged.channel_token = Some("guess".into());

    let err = intake.handle(forged).await.unwrap_err();

    assert!(matches!(err, CadenceError::Auth(_)));
    assert!(harness.google.calls().is_empty());

    let mut missing = notification("exists");
    missing.channel_token = None;
    assert!(intake.handle(missing).await.is_err());
}

#[tokio::test]
async fn unknown_or_superseded_channels_are_ignored() {
    let (harness, intake, _) = setup();

    let mut unknown = notification("exists");
    unknown.subscription_id = "channel-1".into();
    assert_eq!(intake.handle(unknown).await.unwrap(), WebhookDisposition::Ignored);

    let mut other_provider = notification("exists");
    other_provider.provider = CalendarProvider::Microsoft;
    assert_eq!(intake.handle(other_provider).await.unwrap(), WebhookDisposition::Ignored);

    let mut superseded = notification("exists");
    superseded.resource_id = Some("resource-0".into());
    assert_eq!(intake.handle(superseded).await.unwrap(), WebhookDisposition::Ignored);

    assert!(harness.google.calls().is_empty());
}

#[tokio::test]
async fn notification_during_running_sync_is_absorbed() {
    let (harness, intake, calendar_id) = setup();
    let mut calendar = harness.store.calendar(calendar_id);
    calendar.sync_status = SyncStatus::InProgress;
    calendar.sync_started_at = Some(base_time());
    harness.store.put_calendar(calendar);

    let disposition = intake.handle(notification("exists")).await.unwrap();

    assert_eq!(disposition, WebhookDisposition::AlreadyRunning { calendar_id });
}
