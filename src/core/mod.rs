mod errors;
mod http;
mod manager;
mod queue;
mod store;
mod task;
mod traits;
mod types;
mod worker;

pub use errors::{ConfigError, ErrorKind, ProviderError, Result, Status, TransportError};
pub use http::{BasicAuth, ByteStream, HttpRequest, HttpResponse, RequestBody};
pub use manager::{Environment, Provider, ProviderHandle};
pub use queue::{Enqueued, QueueEntry, UploadQueue};
pub use store::ShareUrlRegistry;
pub use task::UploadTask;
pub use traits::{Connectivity, CredentialStore, FileSource, Transport, UploadObserver};
pub use types::{StepOutcome, UploadEvent, UploadId, UploadState, DEFAULT_MAX_FILE_SIZE};
pub(crate) use types::ManagerCommand;
