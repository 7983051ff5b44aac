pub mod config;
pub mod core;
pub mod owncloud;
pub mod transport;

// 重新导出核心类型
pub use config::{AccountConfig, Settings};
pub use self::core::{
    Environment,
    ErrorKind,
    Provider,
    ProviderError,
    ProviderHandle,
    Result,
    Status,
    UploadEvent,
    UploadId,
    UploadObserver,
    UploadState,
    UploadTask,
};
pub use owncloud::{LastError, QuotaInfo};
pub use transport::{local_environment, AlwaysOnline, LocalFileSource, ReqwestTransport, StaticCredentials};
