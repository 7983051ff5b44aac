use std::path::PathBuf;
use std::sync::Arc;
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use uuid::Uuid;
use super::errors::{ProviderError, Result};
use super::task::UploadTask;
use super::traits::UploadObserver;

/// Upload size limit used when the account does not configure one.
pub const DEFAULT_MAX_FILE_SIZE: u64 = 157_286_400;

/// 上传任务唯一标识
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct UploadId(Uuid);

impl UploadId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for UploadId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for UploadId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle of one upload.
///
/// `Queued` tasks wait behind the active head of the queue. Once promoted a
/// task walks `Idle -> EnsuringAuth -> CheckingQuota -> Uploading ->
/// RequestingShareLink -> Completed`, and any non-terminal state may drop to
/// `Failed` or `Cancelled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum UploadState {
    Queued,
    Idle,
    EnsuringAuth,
    CheckingQuota,
    Uploading,
    RequestingShareLink,
    Completed,
    Failed,
    Cancelled,
}

/// Outcome of the step performed in the current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Succeeded,
    Failed,
    Cancelled,
}

impl UploadState {
    pub fn is_terminal(self) -> bool {
        matches!(self, UploadState::Completed | UploadState::Failed | UploadState::Cancelled)
    }

    /// Transition function of the upload state machine. Terminal states absorb.
    pub fn next(self, outcome: StepOutcome) -> UploadState {
        use UploadState::*;

        if self.is_terminal() {
            return self;
        }

        match outcome {
            StepOutcome::Failed => Failed,
            StepOutcome::Cancelled => Cancelled,
            StepOutcome::Succeeded => match self {
                Queued => Idle,
                Idle => EnsuringAuth,
                EnsuringAuth => CheckingQuota,
                CheckingQuota => Uploading,
                Uploading => RequestingShareLink,
                RequestingShareLink => Completed,
                Completed | Failed | Cancelled => self,
            },
        }
    }
}

#[derive(Debug, Clone)]
pub enum UploadEvent {
    /// 任务状态变更
    StateChanged {
        upload_id: UploadId,
        old_state: UploadState,
        new_state: UploadState,
    },

    /// 任务完成
    Completed {
        upload_id: UploadId,
        file: PathBuf,
        url: String,
    },

    /// 任务失败
    Failed {
        upload_id: UploadId,
        file: PathBuf,
        error: ProviderError,
    },
}

/// Commands handled by the account worker.
pub enum ManagerCommand {
    /// 添加上传任务
    AddUpload {
        file_path: PathBuf,
        observer: Arc<dyn UploadObserver>,
        reply: oneshot::Sender<Result<UploadId>>,
    },

    /// 取消
    CancelUpload {
        file_path: PathBuf,
        reply: oneshot::Sender<Result<()>>,
    },

    /// 获取所有任务
    GetAllTasks {
        reply: oneshot::Sender<Vec<UploadTask>>,
    },
}
