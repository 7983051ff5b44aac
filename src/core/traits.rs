use async_trait::async_trait;
use std::io;
use std::path::Path;
use super::errors::{Status, TransportError};
use super::http::{ByteStream, HttpRequest, HttpResponse};

/// HTTP transport supplied by the environment.
///
/// Dropping the future returned by [`Transport::send`] aborts the request;
/// the uploader relies on this to cancel an in-flight PUT.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// Password lookup, optionally prompting the user.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn get_password(&self, username: &str, prompt_if_missing: bool) -> Option<String>;
}

/// Read access to local files.
#[async_trait]
pub trait FileSource: Send + Sync {
    async fn size(&self, path: &Path) -> io::Result<u64>;

    async fn open(&self, path: &Path) -> io::Result<ByteStream>;
}

/// Reports whether the host currently has network connectivity.
pub trait Connectivity: Send + Sync {
    fn is_offline(&self) -> bool;
}

/// Start/stop notifications for one upload or user-info refresh.
///
/// `on_stop` is delivered exactly once per request.
pub trait UploadObserver: Send + Sync {
    fn on_start(&self) {}

    fn on_stop(&self, status: Status);
}
