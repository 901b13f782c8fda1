mod support;

use cadence_core::AvailabilityService;
use cadence_domain::{CadenceError, EventStatus, TimeBlock, TimeBlockKind, TimeRange};
use support::*;
use uuid::Uuid;

#[tokio::test]
async fn free_busy_clips_confirmed_events_to_the_window() {
    let store = std::sync::Arc::new(InMemoryEventStore::new());
    let work = internal_calendar(user());
    let empty = internal_calendar(user());
    store.put_calendar(work.clone());
    store.put_calendar(empty.clone());

    store.put_event(local_event(&work, "Early", at(1, 8, 0), at(1, 10, 0)));
    let mut tentative = local_event(&work, "Maybe", at(1, 11, 0), at(1, 12, 0));
    tentative.status = EventStatus::Tentative;
    store.put_event(tentative);
    let mut deleted = local_event(&work, "Gone", at(1, 13, 0), at(1, 14, 0));
    deleted.is_deleted = true;
    store.put_event(deleted);
    store.put_event(local_event(&work, "Late", at(1, 16, 30), at(1, 18, 0)));

    let service = AvailabilityService::new(store);
    let busy = service.free_busy(&[work.id, empty.id], at(1, 9, 0), at(1, 17, 0)).await.unwrap();

    assert_eq!(busy.len(), 2);
    assert_eq!(busy[0].calendar_id, work.id);
    assert_eq!(
        busy[0].busy,
        vec![
            TimeRange::new(at(1, 9, 0), at(1, 10, 0)).unwrap(),
            TimeRange::new(at(1, 16, 30), at(1, 17, 0)).unwrap(),
        ]
    );
    assert!(busy[1].busy.is_empty());
}

#[tokio::test]
async fn free_busy_rejects_inverted_window() {
    let service = AvailabilityService::new(std::sync::Arc::new(InMemoryEventStore::new()));
    let err = service.free_busy(&[], at(1, 17, 0), at(1, 9, 0)).await.unwrap_err();
    assert!(matches!(err, CadenceError::InvalidInput(_)));
}

#[tokio::test]
async fn meeting_times_avoid_every_attendee_and_time_blocks() {
    let store = std::sync::Arc::new(InMemoryEventStore::new());
    let colleague = Uuid::from_u128(0xB0B);
    let mine = internal_calendar(user());
    let theirs = internal_calendar(colleague);
    store.put_calendar(mine.clone());
    store.put_calendar(theirs.clone());

    store.put_event(local_event(&mine, "Planning", at(1, 9, 0), at(1, 10, 0)));
    store.put_event(local_event(&theirs, "Workshop", at(1, 10, 0), at(1, 12, 0)));
    let mut cancelled = local_event(&theirs, "Cancelled", at(1, 12, 0), at(1, 13, 0));
    cancelled.status = EventStatus::Cancelled;
    store.put_event(cancelled);
    store.put_time_block(TimeBlock {
        id: Uuid::now_v7(),
        user_id: user(),
        kind: TimeBlockKind::Focus,
        title: Some("Deep work".into()),
        start_time: at(1, 13, 0),
        end_time: at(1, 14, 0),
    });

    let service = AvailabilityService::new(store);
    let slots = service
        .find_meeting_times(&[user(), colleague], 60, at(1, 9, 0), at(1, 17, 0))
        .await
        .unwrap();

    let starts: Vec<_> = slots.iter().map(|slot| slot.start).collect();
    assert_eq!(starts, vec![at(1, 12, 0), at(1, 14, 0)]);
    assert_eq!(slots[0].end, at(1, 13, 0));
    assert!(slots.iter().all(|slot| slot.confidence == 0.8));
}

#[tokio::test]
async fn meeting_times_are_capped_at_ten() {
    let store = std::sync::Arc::new(InMemoryEventStore::new());
    let calendar = internal_calendar(user());
    store.put_calendar(calendar.clone());
    for hour in 0..12 {
        let start = at(1, 2 * hour, 30);
        store.put_event(local_event(&calendar, "Block", start, start + chrono::Duration::hours(1)));
    }

    let service = AvailabilityService::new(store);
    let slots = service.find_meeting_times(&[user()], 30, at(1, 0, 0), at(2, 0, 0)).await.unwrap();

    assert_eq!(slots.len(), 10);
    assert_eq!(slots[0].start, at(1, 0, 0));
    assert_eq!(slots[1].start, at(1, 1, 30));
}

#[tokio::test]
async fn meeting_duration_must_be_positive() {
    let service = AvailabilityService::new(std::sync::Arc::new(InMemoryEventStore::new()));
    let err = service.find_meeting_times(&[user()], 0, at(1, 9, 0), at(1, 17, 0)).await.unwrap_err();
    assert!(matches!(err, CadenceError::InvalidInput(_)));
}

#[tokio::test]
async fn meeting_duration_longer_than_window_is_rejected() {
    let service = AvailabilityService::new(std::sync::Arc::new(InMemoryEventStore::new()));

    let huge = service
        .find_meeting_times(&[user()], i64::MAX / 2, at(1, 9, 0), at(1, 17, 0))
        .await
        .unwrap_err();
    assert!(matches!(huge, CadenceError::InvalidInput(_)));

    let too_long =
        service.find_meeting_times(&[user()], 9 * 60, at(1, 9, 0), at(1, 17, 0)).await.unwrap_err();
    assert!(matches!(too_long, CadenceError::InvalidInput(_)));

    let exact = service.find_meeting_times(&[user()], 8 * 60, at(1, 9, 0), at(1, 17, 0)).await.unwrap();
    assert_eq!(exact.len(), 1);
    assert_eq!(exact[0].end, at(1, 17, 0));
}
