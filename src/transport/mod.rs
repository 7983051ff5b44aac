mod client;
mod local;

pub use client::ReqwestTransport;
pub use local::{AlwaysOnline, LocalFileSource, StaticCredentials};

use std::sync::Arc;
use crate::config::AccountConfig;
use crate::core::{Environment, TransportError};

/// Environment backed by the network and the local file system.
pub fn local_environment(account: &AccountConfig) -> Result<Environment, TransportError> {
    Ok(Environment {
        transport: Arc::new(ReqwestTransport::new(account.timeout())?),
        credentials: Arc::new(StaticCredentials::from_account(account)),
        files: Arc::new(LocalFileSource),
        connectivity: Arc::new(AlwaysOnline),
    })
}
