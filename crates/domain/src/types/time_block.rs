//! Non-event scheduling blocks (work, break, focus, travel)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::event::TimeRange;
use crate::errors::Result;
use crate::impl_domain_status_conversions;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeBlockKind {
    Work,
    Break,
    Focus,
    Travel,
}

impl_domain_status_conversions!(TimeBlockKind {
    Work => "work",
    Break => "break",
    Focus => "focus",
    Travel => "travel",
});

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeBlock {
    pub id: Uuid,
    pub user_id: Uuid,
    pub kind: TimeBlockKind,
    pub title: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

impl TimeBlock {
    pub fn range(&self) -> Result<TimeRange> {
        TimeRange::new(self.start_time, self.end_time)
    }
}
