//! Conflict records and resolution types

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::impl_domain_status_conversions;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictType {
    Overlap,
    ResourceConflict,
    SchedulingConflict,
}

impl_domain_status_conversions!(ConflictType {
    Overlap => "overlap",
    ResourceConflict => "resource_conflict",
    SchedulingConflict => "scheduling_conflict",
});

impl ConflictType {
    /// Signal strength used when one pair is flagged by several rules.
    pub fn priority(self) -> u8 {
        match self {
            Self::SchedulingConflict => 0,
            Self::Overlap => 1,
            Self::ResourceConflict => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictSeverity {
    Low,
    Medium,
    High,
}

impl_domain_status_conversions!(ConflictSeverity {
    Low => "low",
    Medium => "medium",
    High => "high",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionType {
    Ignore,
    Reschedule,
    Cancel,
    Merge,
}

impl_domain_status_conversions!(ResolutionType {
    Ignore => "ignore",
    Reschedule => "reschedule",
    Cancel => "cancel",
    Merge => "merge",
});

/// Unordered pair of event ids; `first <= second` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventPair {
    first: Uuid,
    second: Uuid,
}

impl EventPair {
    pub fn new(a: Uuid, b: Uuid) -> Self {
        if a <= b {
            Self { first: a, second: b }
        } else {
            Self { first: b, second: a }
        }
    }

    pub fn first(&self) -> Uuid {
        self.first
    }

    pub fn second(&self) -> Uuid {
        self.second
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.first == id || self.second == id
    }
}

/// A conflict found by the detector, before persistence.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectedConflict {
    pub pair: EventPair,
    pub conflict_type: ConflictType,
    pub severity: ConflictSeverity,
    pub overlap: Duration,
}

/// Persisted conflict record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarConflict {
    pub id: Uuid,
    pub user_id: Uuid,
    pub event1_id: Uuid,
    pub event2_id: Uuid,
    pub conflict_type: ConflictType,
    pub severity: ConflictSeverity,
    pub overlap_minutes: i64,
    pub is_resolved: bool,
    pub resolution_type: Option<ResolutionType>,
    pub resolution_notes: Option<String>,
    pub resolved_by: Option<Uuid>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub detected_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CalendarConflict {
    pub fn pair(&self) -> EventPair {
        EventPair::new(self.event1_id, self.event2_id)
    }
}

/// Ranked hint returned by `suggest_resolutions`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolutionSuggestion {
    pub resolution_type: ResolutionType,
    pub description: String,
    pub confidence: f64,
}
