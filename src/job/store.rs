use std::{collections::HashMap, sync::Mutex};

use crate::model::{RenderProgress, RenderResult};

/// Poll-visible lifecycle of one task:
/// `PENDING -> STARTED -> PROGRESS* -> {SUCCESS | FAILURE | REVOKED}`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskState {
    Pending,
    Started,
    Progress,
    Success,
    Failure,
    Revoked,
}

impl TaskState {
    pub fn is_finished(self) -> bool {
        matches!(self, Self::Success | Self::Failure | Self::Revoked)
    }
}

/// Last-write-wins view of a task. This is a monitoring channel: stale reads
/// are acceptable and pollers must not treat it as a correctness channel.
#[derive(Clone, Debug, serde::Serialize)]
pub struct TaskSnapshot {
    pub state: TaskState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<RenderProgress>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<RenderResult>,
}

impl TaskSnapshot {
    fn new(state: TaskState) -> Self {
        Self {
            state,
            progress: None,
            result: None,
        }
    }
}

/// Narrow interface the engine side uses to republish progress snapshots.
pub trait ProgressSink: Send + Sync {
    fn publish_progress(&self, task_id: &str, progress: &RenderProgress);
}

/// Narrow interface the wrapper uses to publish the final result.
pub trait ResultSink: Send + Sync {
    fn publish_result(&self, task_id: &str, result: &RenderResult);
}

/// Full store contract the worker needs on top of the two sinks. The backing
/// technology (broker result backend, database, memory) is the host's choice.
pub trait ResultStore: ProgressSink + ResultSink {
    fn mark_pending(&self, task_id: &str);
    fn mark_started(&self, task_id: &str);
    fn mark_revoked(&self, task_id: &str);
    fn snapshot(&self, task_id: &str) -> Option<TaskSnapshot>;
}

/// Reference in-process store keyed by task id.
#[derive(Default)]
pub struct InMemoryResultStore {
    inner: Mutex<HashMap<String, TaskSnapshot>>,
}

impl InMemoryResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn update(&self, task_id: &str, f: impl FnOnce(&mut TaskSnapshot)) {
        let mut inner = self.inner.lock().expect("result store poisoned");
        let snapshot = inner
            .entry(task_id.to_string())
            .or_insert_with(|| TaskSnapshot::new(TaskState::Pending));
        f(snapshot);
    }
}

impl ProgressSink for InMemoryResultStore {
    fn publish_progress(&self, task_id: &str, progress: &RenderProgress) {
        self.update(task_id, |snap| {
            snap.state = TaskState::Progress;
            snap.progress = Some(progress.clone());
        });
    }
}

impl ResultSink for InMemoryResultStore {
    fn publish_result(&self, task_id: &str, result: &RenderResult) {
        self.update(task_id, |snap| {
            snap.state = if result.success {
                TaskState::Success
            } else {
                TaskState::Failure
            };
            snap.result = Some(result.clone());
        });
    }
}

impl ResultStore for InMemoryResultStore {
    fn mark_pending(&self, task_id: &str) {
        self.update(task_id, |snap| snap.state = TaskState::Pending);
    }

    fn mark_started(&self, task_id: &str) {
        self.update(task_id, |snap| snap.state = TaskState::Started);
    }

    fn mark_revoked(&self, task_id: &str) {
        self.update(task_id, |snap| snap.state = TaskState::Revoked);
    }

    fn snapshot(&self, task_id: &str) -> Option<TaskSnapshot> {
        self.inner
            .lock()
            .expect("result store poisoned")
            .get(task_id)
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RenderStage;

    #[test]
    fn state_machine_progression() {
        let store = InMemoryResultStore::new();
        assert!(store.snapshot("t1").is_none());

        store.mark_pending("t1");
        assert_eq!(store.snapshot("t1").unwrap().state, TaskState::Pending);

        store.mark_started("t1");
        assert_eq!(store.snapshot("t1").unwrap().state, TaskState::Started);

        let p = RenderProgress::new("j1", RenderStage::Exporting, 70.0, "encoding");
        store.publish_progress("t1", &p);
        let snap = store.snapshot("t1").unwrap();
        assert_eq!(snap.state, TaskState::Progress);
        assert_eq!(snap.progress.unwrap().progress, 70.0);

        let res = RenderResult::failure("j1", "boom");
        store.publish_result("t1", &res);
        let snap = store.snapshot("t1").unwrap();
        assert_eq!(snap.state, TaskState::Failure);
        assert!(snap.state.is_finished());
    }

    #[test]
    fn progress_is_last_write_wins() {
        let store = InMemoryResultStore::new();
        store.publish_progress(
            "t1",
            &RenderProgress::new("j1", RenderStage::BuildingScenes, 10.0, ""),
        );
        store.publish_progress(
            "t1",
            &RenderProgress::new("j1", RenderStage::Exporting, 70.0, ""),
        );
        let snap = store.snapshot("t1").unwrap();
        assert_eq!(snap.progress.unwrap().progress, 70.0);
    }

    #[test]
    fn success_result_finishes_task() {
        let store = InMemoryResultStore::new();
        let mut res = RenderResult::failure("j1", "");
        res.success = true;
        res.error = None;
        store.publish_result("t1", &res);
        assert_eq!(store.snapshot("t1").unwrap().state, TaskState::Success);
    }

    #[test]
    fn tasks_are_isolated_by_id() {
        let store = InMemoryResultStore::new();
        store.mark_started("a");
        store.mark_revoked("b");
        assert_eq!(store.snapshot("a").unwrap().state, TaskState::Started);
        assert_eq!(store.snapshot("b").unwrap().state, TaskState::Revoked);
    }
}
