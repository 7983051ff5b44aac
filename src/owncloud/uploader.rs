use std::sync::Arc;
use reqwest::Method;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use crate::core::{
    FileSource,
    HttpRequest,
    ProviderError,
    RequestBody,
    Result,
    StepOutcome,
    Transport,
    UploadId,
    UploadState,
    UploadTask,
};
use super::ocs::{self, SHARE_TYPE_PUBLIC_LINK};
use super::session::Session;

/// State updates sent from a running uploader to the account worker.
pub type StateSender = mpsc::UnboundedSender<(UploadId, UploadState)>;

/// Per-account settings the uploader needs.
#[derive(Debug, Clone)]
pub struct UploadLimits {
    pub storage_folder: String,
    pub max_file_size: u64,
}

/// Runs the upload protocol for one task: guard, ensure auth, check quota,
/// PUT the file, create a public share link.
pub struct FileUploader {
    pub(crate) session: Session,
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) files: Arc<dyn FileSource>,
    pub(crate) limits: UploadLimits,
    pub(crate) cancellation_token: CancellationToken,
    pub(crate) state_tx: StateSender,
}

impl FileUploader {
    /// Returns the share URL reported by the server. Cancelling the token drops the
    /// in-flight request, which aborts it in the transport.
    pub async fn run(self, task: UploadTask) -> Result<String> {
        tokio::select! {
            biased;
            _ = self.cancellation_token.cancelled() => {
                info!("canceling upload of {}", task.file_path.display());
                Err(ProviderError::UploadCanceled)
            }
            result = self.drive(&task) => result,
        }
    }

    async fn drive(&self, task: &UploadTask) -> Result<String> {
        let mut state = UploadState::Idle;
        let mut share_url = None;

        while !state.is_terminal() {
            let step = match state {
                UploadState::Idle => self.check_file_limit(task),
                UploadState::EnsuringAuth => self.ensure_auth().await.map_err(|err| {
                    warn!("authentication failed before upload: {}", err);
                    match err {
                        ProviderError::Auth(_) => err,
                        other => ProviderError::auth(other.to_string()),
                    }
                }),
                UploadState::CheckingQuota => self.check_quota(task).await,
                UploadState::Uploading => self.put_file(task).await,
                UploadState::RequestingShareLink => {
                    self.request_share_link(task).await.map(|url| {
                        share_url = Some(url);
                    })
                }
                _ => Ok(()),
            };

            match step {
                Ok(()) => {
                    state = state.next(StepOutcome::Succeeded);
                    if !state.is_terminal() {
                        let _ = self.state_tx.send((task.id, state));
                    }
                }
                Err(err) => return Err(err),
            }
        }

        share_url.ok_or_else(|| ProviderError::upload("no share url"))
    }

    /// Logs in when needed and always refetches the quota for this attempt.
    async fn ensure_auth(&self) -> Result<()> {
        self.session.quota_tracker().invalidate().await;
        self.session.ensure_ready(true).await
    }

    fn file_size(&self, task: &UploadTask) -> Result<u64> {
        task.file_size
            .ok_or_else(|| ProviderError::failure(format!("unknown size for {}", task.file_path.display())))
    }

    fn check_file_limit(&self, task: &UploadTask) -> Result<()> {
        let size = self.file_size(task)?;
        if size > self.limits.max_file_size {
            return Err(ProviderError::FileLimit {
                size,
                limit: self.limits.max_file_size,
            });
        }

        Ok(())
    }

    async fn check_quota(&self, task: &UploadTask) -> Result<()> {
        let size = self.file_size(task)?;
        let quota = self.session.quota().await;

        if let Some(remaining) = quota.remaining() {
            if size > remaining {
                return Err(ProviderError::Quota { size, remaining });
            }
        }

        Ok(())
    }

    fn remote_name(&self, task: &UploadTask) -> Result<String> {
        task.remote_name()
            .ok_or_else(|| ProviderError::upload(format!("no remote name for {}", task.file_path.display())))
    }

    async fn put_file(&self, task: &UploadTask) -> Result<()> {
        let size = self.file_size(task)?;
        let remote_name = self.remote_name(task)?;
        let url = self
            .session
            .endpoints()
            .file_url(&self.limits.storage_folder, &remote_name)
            .map_err(|err| ProviderError::upload(err.to_string()))?;
        let auth = self.session.basic_auth(false).await?;

        info!("ready to upload file {} to folder {}", remote_name, self.limits.storage_folder);

        let stream = self
            .files
            .open(&task.file_path)
            .await
            .map_err(|err| ProviderError::upload(format!("cannot read {}: {}", task.file_path.display(), err)))?;

        let request = HttpRequest::new(Method::PUT, url)
            .basic_auth(&auth.username, &auth.password)
            .body(RequestBody::Stream { stream, length: size });

        let response = self.transport.send(request).await.map_err(|err| {
            warn!("Could not upload file: {}", err);
            ProviderError::upload(err.to_string())
        })?;

        if !response.is_success() {
            warn!("upload rejected with status {}", response.status);
            return Err(ProviderError::upload(format!("PUT returned status {}", response.status)));
        }

        Ok(())
    }

    async fn request_share_link(&self, task: &UploadTask) -> Result<String> {
        let remote_name = self.remote_name(task)?;
        let auth = self.session.basic_auth(false).await?;
        let form = vec![
            ("shareType".to_string(), SHARE_TYPE_PUBLIC_LINK.to_string()),
            ("path".to_string(), ocs::share_path(&self.limits.storage_folder, &remote_name)),
        ];

        let request = HttpRequest::new(Method::POST, self.session.endpoints().shares_url())
            .basic_auth(&auth.username, &auth.password)
            .body(RequestBody::Form(form));

        let response = self.transport.send(request).await.map_err(|err| {
            debug!("share request error: {}", err);
            ProviderError::upload(err.to_string())
        })?;

        debug!("Raw response: {}", response.body);
        if !response.is_success() {
            info!("Could not retrieve share URL");
            return Err(ProviderError::upload(format!("share request returned status {}", response.status)));
        }

        let share_url = ocs::parse_share_url(&response.body).map_err(|err| {
            error!("invalid share response: {}", err);
            ProviderError::upload(format!("invalid share response: {}", err))
        })?;

        info!("share url for {}: {}", task.file_path.display(), share_url);
        Ok(share_url)
    }
}
