use std::collections::VecDeque;
use std::path::Path;
use std::sync::Arc;
use super::errors::Status;
use super::task::UploadTask;
use super::traits::UploadObserver;
use super::types::{UploadId, UploadState};

/// A task record together with the observers waiting on it.
pub struct QueueEntry {
    pub task: UploadTask,
    observers: Vec<Arc<dyn UploadObserver>>,
}

impl QueueEntry {
    pub fn new(task: UploadTask, observer: Arc<dyn UploadObserver>) -> Self {
        Self {
            task,
            observers: vec![observer],
        }
    }

    pub fn notify_start(&self) {
        for observer in &self.observers {
            observer.on_start();
        }
    }

    /// Delivers the terminal status and drops the observers, so any later
    /// call is a no-op.
    pub fn notify_stop(&mut self, status: &Status) -> bool {
        let observers = std::mem::take(&mut self.observers);
        let notified = !observers.is_empty();

        for observer in observers {
            observer.on_stop(status.clone());
        }

        notified
    }

    pub fn is_notified(&self) -> bool {
        self.observers.is_empty()
    }
}

/// Result of [`UploadQueue::push`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enqueued {
    /// New entry at `position` (0 = head)
    Added { id: UploadId, position: usize },
    /// Same file as the active head; observer attached to it
    Joined { id: UploadId },
}

/// FIFO of uploads for one account. The head is the only task that may be
/// active; everything behind it is `Queued`.
#[derive(Default)]
pub struct UploadQueue {
    entries: VecDeque<QueueEntry>,
}

impl UploadQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, task: UploadTask, observer: Arc<dyn UploadObserver>) -> Enqueued {
        if let Some(head) = self.entries.front_mut() {
            let running = head.task.state != UploadState::Queued && !head.task.state.is_terminal();
            if running && !head.is_notified() && head.task.is_for(&task.file_path) {
                observer.on_start();
                head.observers.push(observer);
                return Enqueued::Joined { id: head.task.id };
            }
        }

        let id = task.id;
        self.entries.push_back(QueueEntry::new(task, observer));
        Enqueued::Added {
            id,
            position: self.entries.len() - 1,
        }
    }

    /// Whether the head has been promoted and is running.
    pub fn has_active(&self) -> bool {
        self.entries
            .front()
            .is_some_and(|head| head.task.state != UploadState::Queued)
    }

    pub fn head(&self) -> Option<&QueueEntry> {
        self.entries.front()
    }

    pub fn head_mut(&mut self) -> Option<&mut QueueEntry> {
        self.entries.front_mut()
    }

    pub fn active_id(&self) -> Option<UploadId> {
        if self.has_active() {
            self.entries.front().map(|head| head.task.id)
        } else {
            None
        }
    }

    pub fn pop_head(&mut self) -> Option<QueueEntry> {
        self.entries.pop_front()
    }

    /// Removes a waiting (non-active) entry for `path`.
    pub fn remove_queued(&mut self, path: &Path) -> Option<QueueEntry> {
        let skip = usize::from(self.has_active());
        let index = self
            .entries
            .iter()
            .skip(skip)
            .position(|entry| entry.task.is_for(path))?;

        self.entries.remove(index + skip)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn snapshot(&self) -> Vec<UploadTask> {
        self.entries.iter().map(|entry| entry.task.clone()).collect()
    }
}
