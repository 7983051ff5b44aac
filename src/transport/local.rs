use std::io;
use std::path::Path;
use async_trait::async_trait;
use tokio::fs::{self, File};
use tokio_util::io::ReaderStream;
use crate::config::AccountConfig;
use crate::core::{ByteStream, Connectivity, CredentialStore, FileSource};

/// Reads upload bodies from the local file system.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFileSource;

#[async_trait]
impl FileSource for LocalFileSource {
    async fn size(&self, path: &Path) -> io::Result<u64> {
        let metadata = fs::metadata(path).await?;
        if !metadata.is_file() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} is not a file", path.display()),
            ));
        }

        Ok(metadata.len())
    }

    async fn open(&self, path: &Path) -> io::Result<ByteStream> {
        let file = File::open(path).await?;
        Ok(Box::pin(ReaderStream::new(file)))
    }
}

/// Credential store holding at most one known password. Never prompts.
#[derive(Clone, Default)]
pub struct StaticCredentials {
    username: String,
    password: Option<String>,
}

impl StaticCredentials {
    pub fn new(username: &str, password: Option<&str>) -> Self {
        Self {
            username: username.to_string(),
            password: password.map(str::to_string),
        }
    }

    pub fn from_account(account: &AccountConfig) -> Self {
        Self::new(&account.username, account.password.as_deref())
    }
}

#[async_trait]
impl CredentialStore for StaticCredentials {
    async fn get_password(&self, username: &str, _prompt_if_missing: bool) -> Option<String> {
        if username == self.username {
            self.password.clone()
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysOnline;

impl Connectivity for AlwaysOnline {
    fn is_offline(&self) -> bool {
        false
    }
}
