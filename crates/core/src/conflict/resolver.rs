//! Conflict detection, resolution and suggestions as a service over the
//! event store

use std::sync::Arc;

use cadence_common::time::Clock;
use cadence_domain::constants::MERGE_DESCRIPTION_SEPARATOR;
use cadence_domain::{
    CadenceError, CalendarConflict, CalendarEvent, ConflictConfig, EventStatus,
    ResolutionSuggestion, ResolutionType, Result, SyncStatus,
};
use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::detector::find_conflicts;
use super::suggestions::suggest;
use crate::scheduling::find_first_gap;
use crate::sync::ports::{EventStore, ResolutionCommit};

/// How a conflict is closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Close without touching either event.
    Ignore,
    /// Move the later-starting event to the first free gap.
    Reschedule,
    /// Cancel the named event, which must be one of the pair.
    Cancel { event_id: Uuid },
    /// Earlier event absorbs the later one, which is cancelled.
    Merge,
}

impl Resolution {
    pub fn resolution_type(&self) -> ResolutionType {
        match self {
            Self::Ignore => ResolutionType::Ignore,
            Self::Reschedule => ResolutionType::Reschedule,
            Self::Cancel { .. } => ResolutionType::Cancel,
            Self::Merge => ResolutionType::Merge,
        }
    }
}

pub struct ConflictService {
    store: Arc<dyn EventStore>,
    clock: Arc<dyn Clock>,
    config: ConflictConfig,
}

impl ConflictService {
    pub fn new(
        store: Arc<dyn EventStore>,
        clock: Arc<dyn Clock>,
        config: ConflictConfig,
    ) -> Self {
        Self { store, clock, config }
    }

    /// Detect conflicts among the user's events in `[now, now + horizon]` and
    /// persist them. With `calendar_id`, only pairs touching that calendar
    /// are kept.
    #[instrument(skip(self))]
    pub async fn detect_conflicts(
        &self,
        user_id: Uuid,
        calendar_id: Option<Uuid>,
    ) -> Result<Vec<CalendarConflict>> {
        let now = self.clock.now();
        let horizon = now + Duration::days(self.config.horizon_days);
        let events = self.store.get_events_in_window(user_id, now, horizon).await?;

        let detected = find_conflicts(&events, &self.config);
        let mut persisted = Vec::with_capacity(detected.len());
        for conflict in &detected {
            if let Some(calendar_id) = calendar_id {
                let touches = events.iter().any(|event| {
                    event.calendar_id == calendar_id && conflict.pair.contains(event.id)
                });
                if !touches {
                    continue;
                }
            }
            persisted.push(self.store.insert_or_update_conflict(user_id, conflict, now).await?);
        }

        debug!(
            user_id = %user_id,
            events = events.len(),
            conflicts = persisted.len(),
            "Conflict detection finished"
        );
        Ok(persisted)
    }

    /// Apply `resolution`. Returns `false` without changing anything when the
    /// conflict is missing or already resolved, an event is gone, a cancel
    /// target is outside the pair, or no reschedule slot exists.
    #[instrument(skip(self, notes))]
    pub async fn resolve_conflict(
        &self,
        conflict_id: Uuid,
        resolution: Resolution,
        notes: Option<String>,
        actor_id: Uuid,
    ) -> Result<bool> {
        let Some((conflict, first, second)) = self.load(conflict_id).await? else {
            return Ok(false);
        };
        if conflict.is_resolved {
            debug!(conflict_id = %conflict_id, "Conflict already resolved");
            return Ok(false);
        }

        let now = self.clock.now();
        let events = match resolution {
            Resolution::Ignore => Vec::new(),
            Resolution::Cancel { event_id } => {
                let Some(target) = [&first, &second].into_iter().find(|e| e.id == event_id) else {
                    warn!(
                        conflict_id = %conflict_id,
                        event_id = %event_id,
                        "Cancel target not in conflict"
                    );
                    return Ok(false);
                };
                vec![cancelled(target.clone(), now)]
            }
            Resolution::Merge => {
                let (earlier, later) = order(first, second);
                let (survivor, absorbed) = merge(earlier, later, now);
                vec![survivor, absorbed]
            }
            Resolution::Reschedule => {
                let (_, later) = order(first, second);
                match self.reschedule(later, actor_id, now).await? {
                    Some(moved) => vec![moved],
                    None => {
                        info!(conflict_id = %conflict_id, "No free slot found for reschedule");
                        return Ok(false);
                    }
                }
            }
        };

        let commit = ResolutionCommit {
            conflict_id,
            resolution_type: resolution.resolution_type(),
            notes,
            resolved_by: actor_id,
            resolved_at: now,
            events,
        };
        let applied = self.store.save_resolution(&commit).await?;
        if applied {
            info!(
                conflict_id = %conflict_id,
                resolution = %commit.resolution_type,
                touched = commit.events.len(),
                "Conflict resolved"
            );
        }
        Ok(applied)
    }

    #[instrument(skip(self))]
    pub async fn suggest_resolutions(
        &self,
        conflict_id: Uuid,
    ) -> Result<Vec<ResolutionSuggestion>> {
        let (conflict, first, second) = self
            .load(conflict_id)
            .await?
            .ok_or_else(|| CadenceError::NotFound(format!("Conflict {conflict_id}")))?;
        Ok(suggest(&conflict, &first, &second))
    }

    async fn load(
        &self,
        conflict_id: Uuid,
    ) -> Result<Option<(CalendarConflict, CalendarEvent, CalendarEvent)>> {
        let Some(conflict) = self.store.get_conflict(conflict_id).await? else {
            return Ok(None);
        };
        let first = self.store.get_event(conflict.event1_id).await?;
        let second = self.store.get_event(conflict.event2_id).await?;
        match (first, second) {
            (Some(a), Some(b)) if !a.is_deleted && !b.is_deleted => Ok(Some((conflict, a, b))),
            _ => {
                debug!(conflict_id = %conflict_id, "Conflict references a missing event");
                Ok(None)
            }
        }
    }

    async fn reschedule(
        &self,
        mut event: CalendarEvent,
        actor_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<CalendarEvent>> {
        let duration = event.duration();
        let from = event.end_time;
        let until = from + Duration::days(self.config.reschedule_horizon_days);

        let busy: Vec<_> = self
            .store
            .get_events_in_window(actor_id, from, until)
            .await?
            .iter()
            .filter(|other| other.id != event.id && other.is_active())
            .filter_map(|other| other.range().ok())
            .collect();

        let Some(slot) = find_first_gap(&busy, from, until, duration) else {
            return Ok(None);
        };
        event.start_time = slot.start();
        event.end_time = slot.end();
        event.sync_status = SyncStatus::Pending;
        event.updated_at = now;
        Ok(Some(event))
    }
}

/// Split into (earlier, later) by start time, ties broken by id.
fn order(a: CalendarEvent, b: CalendarEvent) -> (CalendarEvent, CalendarEvent) {
    if (a.start_time, a.id) <= (b.start_time, b.id) {
        (a, b)
    } else {
        (b, a)
    }
}

fn cancelled(mut event: CalendarEvent, now: DateTime<Utc>) -> CalendarEvent {
    event.status = EventStatus::Cancelled;
    event.sync_status = SyncStatus::Pending;
    event.updated_at = now;
    event
}

/// Earlier event grows to cover both and records where the extra content came
/// from; the later one is cancelled.
pub fn merge(
    mut earlier: CalendarEvent,
    later: CalendarEvent,
    now: DateTime<Utc>,
) -> (CalendarEvent, CalendarEvent) {
    earlier.end_time = earlier.end_time.max(later.end_time);

    let note = format!("Merged from \"{}\"", later.title);
    let absorbed = match later.description.as_deref().map(str::trim) {
        Some(text) if !text.is_empty() => format!("{note}:\n{text}"),
        _ => note,
    };
    earlier.description = Some(match earlier.description.as_deref() {
        Some(existing) if !existing.trim().is_empty() => {
            format!("{existing}{MERGE_DESCRIPTION_SEPARATOR}{absorbed}")
        }
        _ => absorbed,
    });
    earlier.sync_status = SyncStatus::Pending;
    earlier.updated_at = now;

    (earlier, cancelled(later, now))
}
