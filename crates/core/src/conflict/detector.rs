//! Conflict detection over a user's events
//!
//! Three sweeps over events sorted by start time:
//! - overlap: any two events whose ranges intersect
//! - resource: overlapping events sharing a normalised location
//! - scheduling: back-to-back events in different places with less than the
//!   configured buffer between them
//!
//! A pair is reported once, with the strongest type that applies.

use std::collections::{BTreeMap, HashMap};

use cadence_domain::{
    CalendarEvent, ConflictConfig, ConflictSeverity, ConflictType, DetectedConflict, EventPair,
};
use chrono::Duration;

/// `overlap / min(duration_a, duration_b)` mapped onto the configured
/// thresholds.
pub fn severity(
    overlap: Duration,
    a: Duration,
    b: Duration,
    config: &ConflictConfig,
) -> ConflictSeverity {
    let shortest = a.min(b).num_seconds();
    if shortest <= 0 {
        return ConflictSeverity::Low;
    }
    let ratio = overlap.num_seconds() as f64 / shortest as f64;
    if ratio >= config.high_threshold {
        ConflictSeverity::High
    } else if ratio >= config.medium_threshold {
        ConflictSeverity::Medium
    } else {
        ConflictSeverity::Low
    }
}

/// Find conflicts among `events`. Cancelled and deleted events are ignored.
/// The result is sorted by pair for stable output.
pub fn find_conflicts(events: &[CalendarEvent], config: &ConflictConfig) -> Vec<DetectedConflict> {
    let mut sorted: Vec<&CalendarEvent> = events
        .iter()
        .filter(|event| event.is_active() && event.start_time < event.end_time)
        .collect();
    sorted.sort_by_key(|event| (event.start_time, event.end_time, event.id));

    let mut found: HashMap<EventPair, DetectedConflict> = HashMap::new();

    sweep_overlaps(&sorted, ConflictType::Overlap, config, &mut found);

    let mut by_location: BTreeMap<String, Vec<&CalendarEvent>> = BTreeMap::new();
    for event in &sorted {
        if let Some(location) = event.normalized_location() {
            by_location.entry(location).or_default().push(event);
        }
    }
    for group in by_location.values() {
        sweep_overlaps(group, ConflictType::ResourceConflict, config, &mut found);
    }

    sweep_buffers(&sorted, config, &mut found);

    let mut conflicts: Vec<DetectedConflict> = found.into_values().collect();
    conflicts.sort_by_key(|conflict| conflict.pair);
    conflicts
}

/// Pairwise sweep over start-sorted events, stopping the inner scan as soon as
/// a later event starts after the current one ends.
fn sweep_overlaps(
    sorted: &[&CalendarEvent],
    conflict_type: ConflictType,
    config: &ConflictConfig,
    found: &mut HashMap<EventPair, DetectedConflict>,
) {
    for (i, a) in sorted.iter().enumerate() {
        for b in &sorted[i + 1..] {
            if b.start_time >= a.end_time {
                break;
            }
            let overlap = a.end_time.min(b.end_time) - a.start_time.max(b.start_time);
            if overlap <= Duration::zero() {
                continue;
            }
            record(
                found,
                DetectedConflict {
                    pair: EventPair::new(a.id, b.id),
                    conflict_type,
                    severity: severity(overlap, a.duration(), b.duration(), config),
                    overlap,
                },
            );
        }
    }
}

fn sweep_buffers(
    sorted: &[&CalendarEvent],
    config: &ConflictConfig,
    found: &mut HashMap<EventPair, DetectedConflict>,
) {
    let buffer = Duration::minutes(config.buffer_minutes);
    for window in sorted.windows(2) {
        let (current, next) = (window[0], window[1]);
        let gap = next.start_time - current.end_time;
        if gap < Duration::zero() || gap >= buffer {
            continue;
        }
        let (Some(here), Some(there)) = (current.normalized_location(), next.normalized_location())
        else {
            continue;
        };
        if here == there {
            continue;
        }
        record(
            found,
            DetectedConflict {
                pair: EventPair::new(current.id, next.id),
                conflict_type: ConflictType::SchedulingConflict,
                severity: severity(Duration::zero(), current.duration(), next.duration(), config),
                overlap: Duration::zero(),
            },
        );
    }
}

fn record(found: &mut HashMap<EventPair, DetectedConflict>, conflict: DetectedConflict) {
    match found.get(&conflict.pair) {
        Some(existing)
            if existing.conflict_type.priority() >= conflict.conflict_type.priority() => {}
        _ => {
            found.insert(conflict.pair, conflict);
        }
    }
}
