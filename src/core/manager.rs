use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot, RwLock};
use tokio::task::JoinHandle;
use tracing::{info, warn};
use crate::config::{AccountConfig, Settings};
use crate::owncloud::{LastError, Session, UploadLimits};
use super::errors::{ConfigError, ProviderError, Result};
use super::store::ShareUrlRegistry;
use super::task::UploadTask;
use super::traits::{Connectivity, CredentialStore, FileSource, Transport, UploadObserver};
use super::types::{ManagerCommand, UploadEvent, UploadId};
use super::worker::{AccountWorker, WorkerContext};

/// External collaborators a provider is wired to.
#[derive(Clone)]
pub struct Environment {
    pub transport: Arc<dyn Transport>,
    pub credentials: Arc<dyn CredentialStore>,
    pub files: Arc<dyn FileSource>,
    pub connectivity: Arc<dyn Connectivity>,
}

/// Cloud attachment provider for one ownCloud account.
///
/// Uploads go through a single account worker, so at most one file is on
/// the wire at any time and the rest wait in request order.
#[derive(Clone)]
pub struct Provider {
    account_key: String,
    account: AccountConfig,
    session: Session,
    registry: Arc<RwLock<ShareUrlRegistry>>,
    connectivity: Arc<dyn Connectivity>,
    command_tx: mpsc::Sender<ManagerCommand>,
    event_tx: broadcast::Sender<UploadEvent>,
}

/// 提供者句柄 - 包含提供者和工作线程
pub struct ProviderHandle {
    pub provider: Provider,
    pub worker_handle: JoinHandle<()>,
}

impl ProviderHandle {
    /// Waits for queued uploads to drain once every provider clone is gone.
    pub async fn shutdown(self) -> Result<()> {
        drop(self.provider);
        self.worker_handle
            .await
            .map_err(|err| ProviderError::failure(format!("Worker panic: {}", err)))
    }
}

impl Provider {
    /// Looks up `account_key` in the settings and starts its worker.
    pub fn init(account_key: &str, settings: &Settings, env: Environment) -> Result<ProviderHandle, ConfigError> {
        let account = settings.account(account_key)?.clone();
        Ok(Self::new(account_key, account, env))
    }

    pub fn new(account_key: &str, account: AccountConfig, env: Environment) -> ProviderHandle {
        let (command_tx, command_rx) = mpsc::channel(100);
        // 最大缓存 256 个事件
        let (event_tx, _) = broadcast::channel(256);

        let session = Session::new(&account, env.transport.clone(), env.credentials.clone());
        let registry = Arc::new(RwLock::new(ShareUrlRegistry::new()));

        let context = WorkerContext {
            session: session.clone(),
            transport: env.transport,
            files: env.files,
            registry: registry.clone(),
            limits: UploadLimits {
                storage_folder: account.storage_folder.clone(),
                max_file_size: account.max_file_size,
            },
        };

        let worker_handle = tokio::spawn(AccountWorker::run(context, command_rx, event_tx.clone()));

        info!("initialized provider for account {}", account_key);

        let provider = Self {
            account_key: account_key.to_string(),
            account,
            session,
            registry,
            connectivity: env.connectivity,
            command_tx,
            event_tx,
        };

        ProviderHandle {
            provider,
            worker_handle,
        }
    }

    fn check_online(&self) -> Result<()> {
        if self.connectivity.is_offline() {
            warn!("network is offline");
            return Err(ProviderError::Offline);
        }

        Ok(())
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> ManagerCommand,
    ) -> Result<T> {
        let (reply_tx, reply_rx) = oneshot::channel();

        self.command_tx
            .send(command(reply_tx))
            .await
            .map_err(|_| ProviderError::ManagerShutdown)?;

        // 等待响应
        reply_rx.await.map_err(|_| ProviderError::ManagerShutdown)
    }

    /// Queues `file` for upload. The observer hears about the outcome; the
    /// returned id identifies the task in events and [`Provider::tasks`].
    pub async fn upload_file(&self, file: impl Into<PathBuf>, observer: Arc<dyn UploadObserver>) -> Result<UploadId> {
        self.check_online()?;

        let file_path = file.into();
        self.request(|reply| ManagerCommand::AddUpload {
            file_path,
            observer,
            reply,
        })
        .await?
    }

    /// Cancels the active or a queued upload of `file`.
    pub async fn cancel_file_upload(&self, file: impl Into<PathBuf>) -> Result<()> {
        let file_path = file.into();
        self.request(|reply| ManagerCommand::CancelUpload { file_path, reply })
            .await?
    }

    /// Refreshes quota information, logging in first when needed.
    pub async fn refresh_user_info(&self, with_ui: bool, observer: Arc<dyn UploadObserver>) -> Result<()> {
        self.check_online()?;

        observer.on_start();
        let status = if self.session.is_logged_in().await {
            self.session.get_user_info().await.map(|_| ())
        } else {
            self.session.logon_and_get_user_info(with_ui).await.map(|_| ())
        };
        observer.on_stop(status);

        Ok(())
    }

    /// Download URL of a file uploaded through this provider.
    pub async fn url_for_file(&self, file: &Path) -> Option<String> {
        self.registry.read().await.get(file).map(str::to_string)
    }

    /// Snapshot of the queue, active upload first.
    pub async fn tasks(&self) -> Result<Vec<UploadTask>> {
        self.request(|reply| ManagerCommand::GetAllTasks { reply }).await
    }

    /// 订阅事件
    ///
    /// 注意：
    /// - 如果接收速度跟不上发送速度，可能会丢失事件（lagged error）
    /// - 每个订阅者都会收到完整的事件副本
    pub fn subscribe_events(&self) -> broadcast::Receiver<UploadEvent> {
        self.event_tx.subscribe()
    }

    pub async fn delete_file(&self, _file: &Path, _observer: Arc<dyn UploadObserver>) -> Result<()> {
        Err(ProviderError::NotImplemented)
    }

    pub async fn create_new_account(&self, _observer: Arc<dyn UploadObserver>) -> Result<()> {
        Err(ProviderError::NotImplemented)
    }

    /// Attaches an account that already exists on the server. Only checks
    /// that the credentials log in.
    pub async fn create_existing_account(&self, observer: Arc<dyn UploadObserver>) -> Result<()> {
        self.check_online()?;

        observer.on_start();
        let status = self.session.logon(true).await;
        if let Err(err) = &status {
            warn!("could not log in to existing account: {}", err);
        }
        observer.on_stop(status);

        Ok(())
    }

    pub fn type_name(&self) -> &'static str {
        "Owncloud"
    }

    pub fn display_name(&self) -> &'static str {
        "ownCloud"
    }

    pub fn service_url(&self) -> &str {
        &self.account.server
    }

    pub fn account_key(&self) -> &str {
        &self.account_key
    }

    pub fn file_upload_size_limit(&self) -> u64 {
        self.account.max_file_size
    }

    pub async fn remaining_file_space(&self) -> Option<u64> {
        self.session.quota().await.remaining()
    }

    pub async fn file_space_used(&self) -> Option<u64> {
        self.session.quota().await.used
    }

    pub async fn is_logged_in(&self) -> bool {
        self.session.is_logged_in().await
    }

    pub async fn last_error(&self) -> Option<LastError> {
        self.session.last_error().await
    }

    pub fn create_new_account_url(&self) -> &'static str {
        ""
    }

    pub fn provider_url_for_error(&self, _error: &ProviderError) -> &'static str {
        ""
    }
}
