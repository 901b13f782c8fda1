//! Forward gap sweep over busy intervals
//!
//! Shared by meeting-slot search and conflict rescheduling. Busy intervals
//! may overlap and need not be merged first.

use cadence_domain::TimeRange;
use chrono::{DateTime, Duration, Utc};

/// Sweep `[from, until)` and yield the first `limit` slots of exactly
/// `duration` that fit between busy intervals, one slot per gap.
pub fn find_gaps(
    busy: &[TimeRange],
    from: DateTime<Utc>,
    until: DateTime<Utc>,
    duration: Duration,
    limit: usize,
) -> Vec<TimeRange> {
    let mut slots = Vec::new();
    if limit == 0 || duration <= Duration::zero() {
        return slots;
    }

    let mut sorted: Vec<&TimeRange> = busy.iter().collect();
    sorted.sort_by_key(|range| (range.start(), range.end()));

    let mut current = from;
    for range in sorted {
        if range.end() <= current {
            continue;
        }
        if let Some(slot) = fit(current, duration, range.start().min(until)) {
            slots.push(slot);
            if slots.len() == limit {
                return slots;
            }
        }
        current = current.max(range.end());
        if current >= until {
            return slots;
        }
    }

    slots.extend(fit(current, duration, until));
    slots
}

/// Slot of `duration` starting at `start` if it ends by `limit`.
/// Durations past the representable range never fit.
fn fit(start: DateTime<Utc>, duration: Duration, limit: DateTime<Utc>) -> Option<TimeRange> {
    let end = start.checked_add_signed(duration)?;
    if end > limit {
        return None;
    }
    TimeRange::new(start, end).ok()
}

/// First gap of at least `duration` after `from`, before `until`.
pub fn find_first_gap(
    busy: &[TimeRange],
    from: DateTime<Utc>,
    until: DateTime<Utc>,
    duration: Duration,
) -> Option<TimeRange> {
    find_gaps(busy, from, until, duration, 1).into_iter().next()
}
