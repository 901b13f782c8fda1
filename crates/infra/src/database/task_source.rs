//! SQLite-backed `TaskSource` reading the task projection table.

use std::sync::Arc;

use async_trait::async_trait;
use cadence_core::sync::ports::TaskSource;
use cadence_domain::{CadenceError, Result as DomainResult, Task, TaskDue};
use rusqlite::params;
use tokio::task;
use uuid::Uuid;

use super::manager::DbManager;
use super::rows::{bool_to_int, map_task_row, ts, TASK_COLUMNS};
use crate::errors::InfraError;

pub struct SqliteTaskSource {
    db: Arc<DbManager>,
}

impl SqliteTaskSource {
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }

    /// Insert or replace a task row. The task subsystem owns these rows;
    /// this exists for provisioning and tests.
    pub async fn upsert_task(&self, task: &Task) -> DomainResult<()> {
        let db = Arc::clone(&self.db);
        let record = task.clone();

        task::spawn_blocking(move || -> DomainResult<()> {
            let conn = db.get_connection()?;
            let (due_date, due_at) = match record.due {
                Some(TaskDue::Date(date)) => (Some(date.format("%Y-%m-%d").to_string()), None),
                Some(TaskDue::DateTime(at)) => (None, Some(ts(at))),
                None => (None, None),
            };
            conn.execute(
                "INSERT OR REPLACE INTO tasks (
                    id, user_id, title, description, due_date, due_at, estimated_hours,
                    is_completed, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    record.id.to_string(),
                    record.user_id.to_string(),
                    record.title,
                    record.description,
                    due_date,
                    due_at,
                    record.estimated_hours,
                    bool_to_int(record.is_completed),
                    ts(record.updated_at),
                ],
            )
            .map_err(map_sql_error)?;
            Ok(())
        })
        .await
        .map_err(map_join_error)?
    }
}

#[async_trait]
impl TaskSource for SqliteTaskSource {
    async fn get_open_tasks_with_due(&self, user_id: Uuid) -> DomainResult<Vec<Task>> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> DomainResult<Vec<Task>> {
            let conn = db.get_connection()?;
            let sql = format!(
                "SELECT {TASK_COLUMNS} FROM tasks
                 WHERE user_id = ?1 AND is_completed = 0
                   AND (due_date IS NOT NULL OR due_at IS NOT NULL)
                 ORDER BY COALESCE(due_at, CAST(strftime('%s', due_date) AS INTEGER)), id"
            );
            let mut stmt = conn.prepare(&sql).map_err(map_sql_error)?;
            let tasks = stmt
                .query_map([user_id.to_string()], map_task_row)
                .map_err(map_sql_error)?
                .collect::<rusqlite::Result<Vec<_>>>()
                .map_err(map_sql_error)?;
            Ok(tasks)
        })
        .await
        .map_err(map_join_error)?
    }
}

fn map_sql_error(err: rusqlite::Error) -> CadenceError {
    InfraError::from(err).into()
}

fn map_join_error(err: task::JoinError) -> CadenceError {
    CadenceError::Internal(format!("Task join error: {err}"))
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, TimeZone, Utc};
    use tempfile::TempDir;

    use super::*;

    fn make_task(user_id: Uuid, title: &str, due: Option<TaskDue>, done: bool) -> Task {
        Task {
            id: Uuid::now_v7(),
            user_id,
            title: title.to_string(),
            description: None,
            due,
            estimated_hours: Some(1.5),
            is_completed: done,
            updated_at: Utc.with_ymd_and_hms(2025, 6, 1, 8, 0, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn returns_only_open_tasks_with_a_due_date() {
        let dir = TempDir::new().unwrap();
        let db = Arc::new(DbManager::new(dir.path().join("tasks.db"), 2).unwrap());
        db.run_migrations().unwrap();
        let source = SqliteTaskSource::new(db);

        let user = Uuid::now_v7();
        let date = NaiveDate::from_ymd_opt(2025, 6, 3).unwrap();
        let at = Utc.with_ymd_and_hms(2025, 6, 2, 14, 0, 0).unwrap();

        source.upsert_task(&make_task(user, "dated", Some(TaskDue::Date(date)), false)).await.unwrap();
        source.upsert_task(&make_task(user, "timed", Some(TaskDue::DateTime(at)), false)).await.unwrap();
        source.upsert_task(&make_task(user, "undated", None, false)).await.unwrap();
        source.upsert_task(&make_task(user, "done", Some(TaskDue::Date(date)), true)).await.unwrap();
        source
            .upsert_task(&make_task(Uuid::now_v7(), "other user", Some(TaskDue::Date(date)), false))
            .await
            .unwrap();

        let open = source.get_open_tasks_with_due(user).await.unwrap();
        let titles: Vec<_> = open.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["timed", "dated"]);
        assert_eq!(open[0].due, Some(TaskDue::DateTime(at)));
        assert_eq!(open[1].due, Some(TaskDue::Date(date)));
        assert_eq!(open[1].estimated_hours, Some(1.5));
    }
}
