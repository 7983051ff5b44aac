use std::path::{Path, PathBuf};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use super::types::{UploadId, UploadState};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UploadTask {
    pub id: UploadId,
    pub file_path: PathBuf,
    pub file_size: Option<u64>,
    pub state: UploadState,
    /// Milliseconds timestamp prepended to the remote name, set on start
    pub upload_timestamp: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

impl UploadTask {
    pub fn new(file_path: PathBuf) -> Self {
        Self {
            id: UploadId::new(),
            file_path,
            file_size: None,
            state: UploadState::Queued,
            upload_timestamp: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            error: None,
        }
    }

    /// Final path component of the local file, used in the remote name.
    pub fn file_name(&self) -> Option<&str> {
        self.file_path.file_name().and_then(|name| name.to_str())
    }

    pub fn is_for(&self, path: &Path) -> bool {
        self.file_path == path
    }

    /// Remote name `<timestamp>_<file name>`, once the task has started.
    pub fn remote_name(&self) -> Option<String> {
        let timestamp = self.upload_timestamp?;
        let name = self.file_name()?;
        Some(format!("{}_{}", timestamp, name))
    }

    pub(crate) fn set_state(&mut self, state: UploadState) {
        self.state = state;

        match state {
            UploadState::Idle => {
                self.started_at = Some(Utc::now());
            }
            UploadState::Completed | UploadState::Failed | UploadState::Cancelled => {
                self.completed_at = Some(Utc::now());
            }
            _ => {}
        }
    }
}
