//! In-process task registry.
//!
//! Holds every task ever submitted, keyed by id, behind one lock. Status
//! moves `started -> working -> completed | failed` and never back. Tasks
//! are not deleted.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};

use chrono::Utc;
use serde_json::Value as JsonValue;
use tokio::sync::Notify;
use tracing::{debug, warn};

use feedlens_core::{Error, JobKind, Result, Task, TaskId, TaskLookup, TaskStatus, TaskView};

/// Shared registry of submitted tasks.
#[derive(Debug, Default)]
pub struct TaskRegistry {
    next_id: AtomicU64,
    tasks: RwLock<BTreeMap<TaskId, Task>>,
    terminal: Notify,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate an id and insert a `started` task.
    pub fn create(&self, kind: JobKind) -> TaskId {
        let id = TaskId(self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        self.tasks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, Task::new(id, kind));
        debug!(task_id = %id, job_kind = kind.as_str(), "Task registered");
        id
    }

    /// `started -> working`.
    pub fn mark_working(&self, id: TaskId) -> Result<()> {
        self.transition(id, TaskStatus::Working, |task| {
            task.started_at = Some(Utc::now());
        })
    }

    /// `working -> completed`, storing the job result.
    pub fn complete(&self, id: TaskId, result: Option<JsonValue>) -> Result<()> {
        self.transition(id, TaskStatus::Completed, |task| {
            task.result = result;
            task.finished_at = Some(Utc::now());
        })
    }

    /// `working -> failed`, storing the error message.
    pub fn fail(&self, id: TaskId, error: impl Into<String>) -> Result<()> {
        let error = error.into();
        self.transition(id, TaskStatus::Failed, |task| {
            task.error = Some(error);
            task.finished_at = Some(Utc::now());
        })
    }

    fn transition(&self, id: TaskId, next: TaskStatus, apply: impl FnOnce(&mut Task)) -> Result<()> {
        {
            let mut tasks = self.tasks.write().unwrap_or_else(PoisonError::into_inner);
            let task = tasks
                .get_mut(&id)
                .ok_or_else(|| Error::NotFound(format!("task {id}")))?;

            if !task.status.can_transition_to(next) {
                warn!(
                    task_id = %id,
                    from = task.status.as_str(),
                    to = next.as_str(),
                    "Rejected task transition"
                );
                return Err(Error::InvalidTransition(format!(
                    "task {id}: {} -> {}",
                    task.status.as_str(),
                    next.as_str()
                )));
            }

            task.status = next;
            apply(task);
        }

        if next.is_terminal() {
            self.terminal.notify_waiters();
        }
        Ok(())
    }

    /// Current view of a task, or the not-found payload.
    pub fn status(&self, id: TaskId) -> TaskLookup {
        self.tasks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .map(|t| TaskLookup::Found(t.view()))
            .unwrap_or(TaskLookup::NotFound)
    }

    /// Full task record.
    pub fn get(&self, id: TaskId) -> Option<Task> {
        self.tasks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned()
    }

    /// Every task in id order.
    pub fn list(&self) -> BTreeMap<TaskId, TaskView> {
        self.tasks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(id, t)| (*id, t.view()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.tasks.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Resolve once the task is completed or failed.
    pub async fn wait(&self, id: TaskId) -> Result<TaskView> {
        loop {
            // Register before checking so a transition in between is not missed.
            let notified = self.terminal.notified();

            match self.get(id) {
                None => return Err(Error::NotFound(format!("task {id}"))),
                Some(task) if task.status.is_terminal() => return Ok(task.view()),
                Some(_) => {}
            }

            notified.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_ids_are_sequential_strings() {
        let reg = TaskRegistry::new();
        let a = reg.create(JobKind::Ngram);
        let b = reg.create(JobKind::Ngram);
        assert_eq!(a.to_string(), "1");
        assert_eq!(b.to_string(), "2");
    }

    #[test]
    fn test_new_task_is_started() {
        let reg = TaskRegistry::new();
        let id = reg.create(JobKind::CommentAnalysis);
        match reg.status(id) {
            TaskLookup::Found(view) => {
                assert_eq!(view.status, TaskStatus::Started);
                assert_eq!(view.description, "Comment analysis");
                assert!(view.result.is_none());
                assert!(view.error.is_none());
            }
            TaskLookup::NotFound => panic!("task missing"),
        }
    }

    #[test]
    fn test_unknown_id_not_found() {
        let reg = TaskRegistry::new();
        assert_eq!(reg.status(TaskId(99)), TaskLookup::NotFound);
    }

    #[test]
    fn test_happy_path_completed() {
        let reg = TaskRegistry::new();
        let id = reg.create(JobKind::Sentiment);
        reg.mark_working(id).unwrap();
        reg.complete(id, Some(serde_json::json!({"processed": 3}))).unwrap();

        let task = reg.get(id).unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(task.result.unwrap()["processed"], 3);
        assert!(task.started_at.is_some());
        assert!(task.finished_at.is_some());
    }

    #[test]
    fn test_terminal_is_final() {
        let reg = TaskRegistry::new();
        let id = reg.create(JobKind::Crawl);
        reg.mark_working(id).unwrap();
        reg.fail(id, "boom").unwrap();

        assert!(matches!(
            reg.complete(id, None),
            Err(Error::InvalidTransition(_))
        ));
        assert!(matches!(reg.mark_working(id), Err(Error::InvalidTransition(_))));

        let task = reg.get(id).unwrap();
        assert_eq!(task.status, TaskStatus::Failed);
        assert_eq!(task.error.as_deref(), Some("boom"));
        assert!(task.result.is_none());
    }

    #[test]
    fn test_cannot_skip_working() {
        let reg = TaskRegistry::new();
        let id = reg.create(JobKind::Crawl);
        assert!(matches!(reg.complete(id, None), Err(Error::InvalidTransition(_))));
        assert_eq!(reg.get(id).unwrap().status, TaskStatus::Started);
    }

    #[test]
    fn test_list_in_id_order() {
        let reg = TaskRegistry::new();
        for _ in 0..3 {
            reg.create(JobKind::DuplicateDetection);
        }
        let ids: Vec<_> = reg.list().keys().map(|id| id.0).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_wait_resolves_on_terminal() {
        let reg = Arc::new(TaskRegistry::new());
        let id = reg.create(JobKind::Ngram);

        let waiter = {
            let reg = reg.clone();
            tokio::spawn(async move { reg.wait(id).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        reg.mark_working(id).unwrap();
        reg.complete(id, None).unwrap();

        let view = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(view.status, TaskStatus::Completed);
    }

    #[tokio::test]
    async fn test_wait_unknown_task() {
        let reg = TaskRegistry::new();
        assert!(matches!(reg.wait(TaskId(5)).await, Err(Error::NotFound(_))));
    }

    #[test]
    fn test_concurrent_creates_unique() {
        let reg = Arc::new(TaskRegistry::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let reg = reg.clone();
                std::thread::spawn(move || (0..50).map(|_| reg.create(JobKind::Ngram)).collect::<Vec<_>>())
            })
            .collect();
        let mut all: Vec<_> = handles.into_iter().flat_map(|h| h.join().unwrap()).collect();
        all.sort();
        all.dedup();
        assert_eq!(all.len(), 400);
        assert_eq!(reg.len(), 400);
    }
}
