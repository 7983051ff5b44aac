use std::path::{Path, PathBuf};
use std::sync::Arc;
use chrono::Utc;
use tokio::sync::{broadcast, mpsc, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use crate::owncloud::{FileUploader, Session, UploadLimits};
use super::errors::{ProviderError, Result, Status};
use super::queue::{Enqueued, QueueEntry, UploadQueue};
use super::store::ShareUrlRegistry;
use super::traits::{FileSource, Transport, UploadObserver};
use super::types::{ManagerCommand, UploadEvent, UploadId, UploadState};
use super::task::UploadTask;

struct ActiveUpload {
    id: UploadId,
    cancellation_token: CancellationToken,
    join_handle: JoinHandle<()>,
}

/// Everything a worker needs to run uploads for one account.
pub(crate) struct WorkerContext {
    pub session: Session,
    pub transport: Arc<dyn Transport>,
    pub files: Arc<dyn FileSource>,
    pub registry: Arc<RwLock<ShareUrlRegistry>>,
    pub limits: UploadLimits,
}

/// Single actor owning the upload queue of one account. Every state change
/// happens on this task, driven by commands and by completion of the one
/// upload in flight.
pub(crate) struct AccountWorker {
    context: WorkerContext,
    queue: UploadQueue,
    active: Option<ActiveUpload>,

    event_tx: broadcast::Sender<UploadEvent>,
    completion_tx: mpsc::UnboundedSender<(UploadId, Result<String>)>,
    completion_rx: mpsc::UnboundedReceiver<(UploadId, Result<String>)>,
    state_tx: mpsc::UnboundedSender<(UploadId, UploadState)>,
    state_rx: mpsc::UnboundedReceiver<(UploadId, UploadState)>,
}

impl AccountWorker {
    fn new(context: WorkerContext, event_tx: broadcast::Sender<UploadEvent>) -> Self {
        let (completion_tx, completion_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = mpsc::unbounded_channel();

        Self {
            context,
            queue: UploadQueue::new(),
            active: None,
            event_tx,
            completion_tx,
            completion_rx,
            state_tx,
            state_rx,
        }
    }

    pub(crate) async fn run(
        context: WorkerContext,
        mut command_rx: mpsc::Receiver<ManagerCommand>,
        event_tx: broadcast::Sender<UploadEvent>,
    ) {
        let mut worker = Self::new(context, event_tx);
        let mut commands_open = true;

        // 主事件循环
        loop {
            // state updates are sent before the completion of the same upload
            tokio::select! {
                biased;
                Some((upload_id, state)) = worker.state_rx.recv() => {
                    worker.handle_state(upload_id, state);
                }
                Some((upload_id, result)) = worker.completion_rx.recv() => {
                    worker.handle_completion(upload_id, result).await;
                }
                command = command_rx.recv(), if commands_open => {
                    match command {
                        Some(command) => worker.handle_command(command).await,
                        None => commands_open = false,
                    }
                }
            }

            worker.process_queue().await;

            if !commands_open && worker.queue.is_empty() {
                debug!("account worker stopped");
                break;
            }
        }
    }

    async fn handle_command(&mut self, command: ManagerCommand) {
        match command {
            ManagerCommand::AddUpload { file_path, observer, reply } => {
                let result = self.add_upload(file_path, observer);
                let _ = reply.send(result);
            }
            ManagerCommand::CancelUpload { file_path, reply } => {
                let result = self.cancel_upload(file_path);
                let _ = reply.send(result);
            }
            ManagerCommand::GetAllTasks { reply } => {
                let _ = reply.send(self.queue.snapshot());
            }
        }
    }

    fn add_upload(&mut self, file_path: PathBuf, observer: Arc<dyn UploadObserver>) -> Result<UploadId> {
        info!("uploading {}", file_path.display());

        match self.queue.push(UploadTask::new(file_path), observer) {
            Enqueued::Added { id, position } => {
                if position > 0 {
                    debug!("upload {} queued at position {}", id, position);
                }
                Ok(id)
            }
            Enqueued::Joined { id } => {
                debug!("upload {} already active, joined", id);
                Ok(id)
            }
        }
    }

    fn cancel_upload(&mut self, file_path: PathBuf) -> Result<()> {
        let active = self.active.as_ref().map(|active| (active.id, active.cancellation_token.clone()));

        if let (Some((active_id, token)), Some(head)) = (active, self.queue.head_mut()) {
            if head.task.id == active_id && head.task.is_for(&file_path) {
                info!("canceling upload of {}", file_path.display());
                let old_state = head.task.state;

                // observers are dropped before the abort, a late completion
                // of the aborted request finds nobody to notify
                head.notify_stop(&Err(ProviderError::UploadCanceled));
                if !old_state.is_terminal() {
                    head.task.set_state(UploadState::Cancelled);
                    token.cancel();
                    self.emit_state_change(active_id, old_state, UploadState::Cancelled);
                }

                return Ok(());
            }
        }

        match self.queue.remove_queued(&file_path) {
            Some(entry) => {
                info!("removed queued upload of {}", file_path.display());
                self.finish(entry, Err(ProviderError::UploadCanceled));
                Ok(())
            }
            None => Err(ProviderError::failure(format!(
                "no upload in progress for {}",
                file_path.display()
            ))),
        }
    }

    fn handle_state(&mut self, upload_id: UploadId, new_state: UploadState) {
        let Some(head) = self.queue.head_mut() else { return };
        if head.task.id != upload_id || head.task.state.is_terminal() {
            return;
        }

        let old_state = head.task.state;
        head.task.set_state(new_state);
        self.emit_state_change(upload_id, old_state, new_state);
    }

    fn take_finished(&mut self, upload_id: UploadId) -> Option<QueueEntry> {
        if self.active.as_ref().is_some_and(|active| active.id == upload_id) {
            self.active = None;
        }

        match self.queue.head() {
            Some(head) if head.task.id == upload_id => self.queue.pop_head(),
            _ => None,
        }
    }

    async fn handle_completion(&mut self, upload_id: UploadId, result: Result<String>) {
        let Some(entry) = self.take_finished(upload_id) else {
            warn!("completion for unknown upload {}", upload_id);
            return;
        };

        // a cancel already reported to the observers wins over a success
        // that was still in the channel
        let result = if entry.task.state == UploadState::Cancelled {
            Err(ProviderError::UploadCanceled)
        } else {
            result
        };

        let status = match result {
            Ok(share_url) => {
                let url = self.register(&entry.task.file_path, &share_url).await;
                let _ = self.event_tx.send(UploadEvent::Completed {
                    upload_id,
                    file: entry.task.file_path.clone(),
                    url,
                });
                Ok(())
            }
            Err(err) => Err(err),
        };

        self.finish(entry, status);

        if !self.queue.is_empty() {
            info!("chaining upload, {} remaining", self.queue.len());
        }
    }

    async fn register(&self, path: &Path, share_url: &str) -> String {
        let mut registry = self.context.registry.write().await;
        registry.insert(path.to_path_buf(), share_url);
        registry.get(path).unwrap_or(share_url).to_string()
    }

    /// Starts queued heads until one is running. A head that fails to start
    /// is reported to its own observers and dropped; the rest of the queue
    /// is untouched.
    async fn process_queue(&mut self) {
        while self.active.is_none() && !self.queue.is_empty() {
            if let Err(err) = self.start_upload().await {
                if let Some(entry) = self.queue.pop_head() {
                    warn!("could not start upload of {}: {}", entry.task.file_path.display(), err);
                    self.finish(entry, Err(err));
                }
            }
        }
    }

    async fn start_upload(&mut self) -> Result<()> {
        let files = self.context.files.clone();
        let Some(head) = self.queue.head_mut() else { return Ok(()) };

        let file_size = files
            .size(&head.task.file_path)
            .await
            .map_err(|err| ProviderError::failure(format!("cannot stat {}: {}", head.task.file_path.display(), err)))?;

        head.task.file_size = Some(file_size);
        head.task.upload_timestamp = Some(Utc::now().timestamp_millis());
        head.task.set_state(UploadState::Idle);
        head.notify_start();

        let task = head.task.clone();
        let upload_id = task.id;
        let cancellation_token = CancellationToken::new();

        let uploader = FileUploader {
            session: self.context.session.clone(),
            transport: self.context.transport.clone(),
            files,
            limits: self.context.limits.clone(),
            cancellation_token: cancellation_token.clone(),
            state_tx: self.state_tx.clone(),
        };

        let completion_tx = self.completion_tx.clone();
        let join_handle = tokio::spawn(async move {
            let result = uploader.run(task).await;

            // 通知完成
            let _ = completion_tx.send((upload_id, result));
        });

        self.active = Some(ActiveUpload {
            id: upload_id,
            cancellation_token,
            join_handle,
        });
        self.emit_state_change(upload_id, UploadState::Queued, UploadState::Idle);

        Ok(())
    }

    /// Terminal bookkeeping for an entry that has left the queue.
    fn finish(&self, mut entry: QueueEntry, status: Status) {
        let upload_id = entry.task.id;
        let old_state = entry.task.state;
        let new_state = match &status {
            Ok(()) => UploadState::Completed,
            Err(ProviderError::UploadCanceled) => UploadState::Cancelled,
            Err(_) => UploadState::Failed,
        };

        if let Err(err) = &status {
            entry.task.error = Some(err.to_string());
            let _ = self.event_tx.send(UploadEvent::Failed {
                upload_id,
                file: entry.task.file_path.clone(),
                error: err.clone(),
            });
        }

        entry.notify_stop(&status);

        if old_state != new_state {
            entry.task.set_state(new_state);
            self.emit_state_change(upload_id, old_state, new_state);
        }
    }

    fn emit_state_change(&self, upload_id: UploadId, old_state: UploadState, new_state: UploadState) {
        let _ = self.event_tx.send(UploadEvent::StateChanged {
            upload_id,
            old_state,
            new_state,
        });
    }
}

impl Drop for AccountWorker {
    fn drop(&mut self) {
        if let Some(active) = self.active.take() {
            active.cancellation_token.cancel();
            active.join_handle.abort();
        }
    }
}
