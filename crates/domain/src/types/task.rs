//! Tasks as seen by the task-binding pass

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Due date of a task, with or without a time of day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum TaskDue {
    Date(NaiveDate),
    DateTime(DateTime<Utc>),
}

/// Read-only projection of a task owned by the task subsystem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub due: Option<TaskDue>,
    pub estimated_hours: Option<f64>,
    pub is_completed: bool,
    pub updated_at: DateTime<Utc>,
}
