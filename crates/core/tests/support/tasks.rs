//! Task source double

use std::sync::Mutex;

use async_trait::async_trait;
use cadence_core::TaskSource;
use cadence_domain::{Result, Task};
use uuid::Uuid;

#[derive(Default)]
pub struct InMemoryTaskSource {
    tasks: Mutex<Vec<Task>>,
}

impl InMemoryTaskSource {
    pub fn put(&self, task: Task) {
        let mut tasks = self.tasks.lock().unwrap();
        tasks.retain(|existing| existing.id != task.id);
        tasks.push(task);
    }
}

#[async_trait]
impl TaskSource for InMemoryTaskSource {
    async fn get_open_tasks_with_due(&self, user_id: Uuid) -> Result<Vec<Task>> {
        Ok(self
            .tasks
            .lock()
            .unwrap()
            .iter()
            .filter(|task| task.user_id == user_id && !task.is_completed && task.due.is_some())
            .cloned()
            .collect())
    }
}
