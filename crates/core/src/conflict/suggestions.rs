//! Ranked resolution hints
//!
//! Confidences are fixed per resolution type; they order the hints and carry
//! no further meaning.

use std::collections::HashSet;

use cadence_domain::constants::{
    MERGE_OVERLAP_FRACTION_THRESHOLD, MERGE_TITLE_SIMILARITY_THRESHOLD,
};
use cadence_domain::{
    CalendarConflict, CalendarEvent, ConflictType, ResolutionSuggestion, ResolutionType,
};

pub const RESCHEDULE_CONFIDENCE: f64 = 0.8;
pub const MERGE_CONFIDENCE: f64 = 0.7;
pub const CANCEL_CONFIDENCE: f64 = 0.5;
pub const IGNORE_CONFIDENCE: f64 = 0.3;

/// Jaccard similarity of lowercase whitespace-separated title tokens.
pub fn title_similarity(a: &str, b: &str) -> f64 {
    let tokens = |s: &str| -> HashSet<String> {
        s.split_whitespace().map(str::to_lowercase).collect()
    };
    let (left, right) = (tokens(a), tokens(b));
    let union = left.union(&right).count();
    if union == 0 {
        return 0.0;
    }
    left.intersection(&right).count() as f64 / union as f64
}

/// Overlap divided by the shorter duration.
pub fn overlap_fraction(a: &CalendarEvent, b: &CalendarEvent) -> f64 {
    let (Ok(left), Ok(right)) = (a.range(), b.range()) else {
        return 0.0;
    };
    let shortest = left.duration().min(right.duration()).num_seconds();
    if shortest <= 0 {
        return 0.0;
    }
    left.overlap_with(&right).num_seconds() as f64 / shortest as f64
}

/// Similar title or same place, and mostly overlapping.
pub fn is_mergeable(a: &CalendarEvent, b: &CalendarEvent) -> bool {
    let similar_title = title_similarity(&a.title, &b.title) > MERGE_TITLE_SIMILARITY_THRESHOLD;
    let same_place = matches!(
        (a.normalized_location(), b.normalized_location()),
        (Some(x), Some(y)) if x == y
    );
    (similar_title || same_place) && overlap_fraction(a, b) > MERGE_OVERLAP_FRACTION_THRESHOLD
}

/// Hints for one conflict, best first.
pub fn suggest(
    conflict: &CalendarConflict,
    first: &CalendarEvent,
    second: &CalendarEvent,
) -> Vec<ResolutionSuggestion> {
    let later = if (second.start_time, second.id) >= (first.start_time, first.id) {
        second
    } else {
        first
    };

    let reschedule = match conflict.conflict_type {
        ConflictType::SchedulingConflict => {
            format!("Move \"{}\" to leave a travel buffer after the previous event", later.title)
        }
        ConflictType::ResourceConflict => {
            format!("Move \"{}\" to a time when the location is free", later.title)
        }
        ConflictType::Overlap => format!("Move \"{}\" to the next free slot", later.title),
    };

    let mut suggestions = vec![ResolutionSuggestion {
        resolution_type: ResolutionType::Reschedule,
        description: reschedule,
        confidence: RESCHEDULE_CONFIDENCE,
    }];

    if is_mergeable(first, second) {
        suggestions.push(ResolutionSuggestion {
            resolution_type: ResolutionType::Merge,
            description: format!(
                "Merge \"{}\" and \"{}\" into one event",
                first.title, second.title
            ),
            confidence: MERGE_CONFIDENCE,
        });
    }

    suggestions.push(ResolutionSuggestion {
        resolution_type: ResolutionType::Cancel,
        description: "Cancel one of the two events".to_string(),
        confidence: CANCEL_CONFIDENCE,
    });
    suggestions.push(ResolutionSuggestion {
        resolution_type: ResolutionType::Ignore,
        description: "Keep both events as they are".to_string(),
        confidence: IGNORE_CONFIDENCE,
    });

    suggestions.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    suggestions
}
