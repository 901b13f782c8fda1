//! Free/busy and meeting-slot search

use std::sync::Arc;

use cadence_domain::constants::{MAX_MEETING_SLOTS, MEETING_SLOT_CONFIDENCE};
use cadence_domain::{CadenceError, EventStatus, Result, TimeRange};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use uuid::Uuid;

use super::gaps::find_gaps;
use crate::sync::ports::EventStore;

/// Busy intervals of one calendar, clipped to the requested window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarBusy {
    pub calendar_id: Uuid,
    pub busy: Vec<TimeRange>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeetingSlot {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub confidence: f64,
}

pub struct AvailabilityService {
    store: Arc<dyn EventStore>,
}

impl AvailabilityService {
    pub fn new(store: Arc<dyn EventStore>) -> Self {
        Self { store }
    }

    /// Clip-and-collect confirmed events per calendar. Adjacent or
    /// overlapping intervals are returned as they are.
    #[instrument(skip(self))]
    pub async fn free_busy(
        &self,
        calendar_ids: &[Uuid],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<CalendarBusy>> {
        let window = TimeRange::new(start, end)?;
        let mut result = Vec::with_capacity(calendar_ids.len());

        for &calendar_id in calendar_ids {
            let events = self.store.get_calendar_events_in_window(calendar_id, start, end).await?;
            let busy = events
                .iter()
                .filter(|event| event.status == EventStatus::Confirmed && !event.is_deleted)
                .filter_map(|event| event.range().ok())
                .filter_map(|range| range.clip(&window))
                .collect();
            result.push(CalendarBusy { calendar_id, busy });
        }

        Ok(result)
    }

    /// Up to ten candidate slots where every attendee is free.
    ///
    /// Attendees are user ids; their active events and time blocks count as
    /// busy.
    #[instrument(skip(self))]
    pub async fn find_meeting_times(
        &self,
        attendees: &[Uuid],
        duration_minutes: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<MeetingSlot>> {
        if duration_minutes <= 0 {
            return Err(CadenceError::InvalidInput(format!(
                "duration_minutes must be positive, got {duration_minutes}"
            )));
        }
        let window = TimeRange::new(start, end)?;
        let duration = Duration::try_minutes(duration_minutes)
            .filter(|duration| *duration <= window.duration())
            .ok_or_else(|| {
                CadenceError::InvalidInput(format!(
                    "duration_minutes {duration_minutes} does not fit the search window"
                ))
            })?;

        let mut busy = Vec::new();
        for &user_id in attendees {
            let events = self.store.get_events_in_window(user_id, start, end).await?;
            busy.extend(events.iter().filter(|e| e.is_active()).filter_map(|e| e.range().ok()));
        }
        let blocks = self.store.get_time_blocks(attendees, start, end).await?;
        busy.extend(blocks.iter().filter_map(|block| block.range().ok()));

        let slots = find_gaps(&busy, start, end, duration, MAX_MEETING_SLOTS);
        debug!(busy = busy.len(), slots = slots.len(), "Meeting slot sweep finished");

        Ok(slots
            .into_iter()
            .map(|slot| MeetingSlot {
                start: slot.start(),
                end: slot.end(),
                confidence: MEETING_SLOT_CONFIDENCE,
            })
            .collect())
    }
}
