use thiserror::Error;

/// Errors surfaced to the caller of the provider, either as a direct return
/// value or through the observer of an upload.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("Network is offline")]
    Offline,

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("File exceeds the upload size limit: {size} > {limit}")]
    FileLimit { size: u64, limit: u64 },

    #[error("Upload would exceed quota: {size} > {remaining}")]
    Quota { size: u64, remaining: u64 },

    #[error("Upload error: {0}")]
    Upload(String),

    #[error("Upload was cancelled")]
    UploadCanceled,

    #[error("Not implemented")]
    NotImplemented,

    #[error("Failure: {0}")]
    Failure(String),

    #[error("Manager shutdown")]
    ManagerShutdown,
}

impl ProviderError {
    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth(message.into())
    }

    pub fn upload(message: impl Into<String>) -> Self {
        Self::Upload(message.into())
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self::Failure(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ProviderError::Offline => ErrorKind::Offline,
            ProviderError::Auth(_) => ErrorKind::Auth,
            ProviderError::FileLimit { .. } => ErrorKind::FileLimit,
            ProviderError::Quota { .. } => ErrorKind::Quota,
            ProviderError::Upload(_) => ErrorKind::Upload,
            ProviderError::UploadCanceled => ErrorKind::UploadCanceled,
            ProviderError::NotImplemented => ErrorKind::NotImplemented,
            ProviderError::Failure(_) | ProviderError::ManagerShutdown => ErrorKind::Failure,
        }
    }
}

/// Coarse classification of a [`ProviderError`], as seen by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Offline,
    Auth,
    FileLimit,
    Quota,
    Upload,
    UploadCanceled,
    NotImplemented,
    Failure,
}

/// Errors reported by a [`Transport`](super::traits::Transport).
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("IO error {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

/// Configuration loading errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid server url {url:?}: {source}")]
    InvalidUrl {
        url: String,
        source: url::ParseError,
    },

    #[error("Unknown account: {0}")]
    UnknownAccount(String),
}

pub type Result<T, E = ProviderError> = std::result::Result<T, E>;

/// Terminal status delivered to an upload observer.
pub type Status = std::result::Result<(), ProviderError>;
