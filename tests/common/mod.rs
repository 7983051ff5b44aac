#![allow(dead_code)]

use std::collections::HashMap;
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use async_trait::async_trait;
use bytes::Bytes;
use owncloud_filelink::core::{
    ByteStream,
    Connectivity,
    FileSource,
    HttpRequest,
    HttpResponse,
    RequestBody,
    Transport,
    TransportError,
};
use owncloud_filelink::{
    AccountConfig,
    AlwaysOnline,
    Environment,
    Provider,
    ProviderHandle,
    StaticCredentials,
    Status,
    UploadObserver,
};
use tokio::sync::Semaphore;

pub const SERVER: &str = "http://host";
pub const FOLDER: &str = "Thunderbird";
pub const USERNAME: &str = "alice";
pub const PASSWORD: &str = "secret";

/// Request kinds the fake server tells apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Login,
    Quota,
    Put,
    Share,
}

/// Misbehaviour injected for one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// The request fails below HTTP
    TransportError,
    /// 200 with a body no client can parse
    Garbage,
}

/// What the fake ownCloud server answers.
#[derive(Debug, Clone)]
pub struct MockConfig {
    pub login_status: i64,
    pub login_message: Option<String>,
    /// `None` leaves the element out of the PROPFIND answer
    pub quota_available: Option<i64>,
    pub quota_used: Option<i64>,
    pub propfind_status: u16,
    pub put_status: u16,
    /// File names whose PUT answers 500
    pub failing_puts: Vec<String>,
    pub share_status: u16,
    pub share_url: String,
    pub faults: Vec<(Step, Fault)>,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            login_status: 100,
            login_message: None,
            quota_available: Some(10_000),
            quota_used: Some(0),
            propfind_status: 207,
            put_status: 201,
            failing_puts: Vec::new(),
            share_status: 200,
            share_url: "http://host/s/abc".to_string(),
            faults: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub method: String,
    pub url: String,
    pub form: Vec<(String, String)>,
    pub username: Option<String>,
    pub body_length: Option<u64>,
}

impl RecordedCall {
    fn from_request(request: &HttpRequest) -> Self {
        let (form, body_length) = match &request.body {
            RequestBody::Form(pairs) => (pairs.clone(), None),
            RequestBody::Stream { length, .. } => (Vec::new(), Some(*length)),
            _ => (Vec::new(), None),
        };

        Self {
            method: request.method.to_string(),
            url: request.url.clone(),
            form,
            username: request.basic_auth.as_ref().map(|auth| auth.username.clone()),
            body_length,
        }
    }

    pub fn step(&self) -> Option<Step> {
        match self.method.as_str() {
            "POST" if self.url.contains("person/check") => Some(Step::Login),
            "POST" if self.url.contains("files_sharing") => Some(Step::Share),
            "PROPFIND" => Some(Step::Quota),
            "PUT" => Some(Step::Put),
            _ => None,
        }
    }

    pub fn form_value(&self, key: &str) -> Option<&str> {
        self.form
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Counts a request as aborted when its future is dropped before answering.
struct AbortGuard {
    aborts: Arc<AtomicUsize>,
    finished: bool,
}

impl Drop for AbortGuard {
    fn drop(&mut self) {
        if !self.finished {
            self.aborts.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// In-memory ownCloud server.
#[derive(Default)]
pub struct MockTransport {
    config: Mutex<MockConfig>,
    calls: Mutex<Vec<RecordedCall>>,
    aborts: Arc<AtomicUsize>,
    put_gate: Option<Arc<Semaphore>>,
}

impl MockTransport {
    pub fn new(config: MockConfig) -> Self {
        Self {
            config: Mutex::new(config),
            ..Default::default()
        }
    }

    /// PUT requests block until a permit is added to the returned gate.
    pub fn gated(config: MockConfig) -> (Self, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        let transport = Self {
            config: Mutex::new(config),
            put_gate: Some(gate.clone()),
            ..Default::default()
        };
        (transport, gate)
    }

    pub fn configure(&self, update: impl FnOnce(&mut MockConfig)) {
        update(&mut self.config.lock().unwrap());
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn count(&self, method: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|call| call.method == method)
            .count()
    }

    pub fn logins(&self) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|call| call.url.contains("person/check"))
            .count()
    }

    pub fn puts(&self) -> Vec<RecordedCall> {
        self.calls()
            .into_iter()
            .filter(|call| call.method == "PUT")
            .collect()
    }

    pub fn aborts(&self) -> usize {
        self.aborts.load(Ordering::SeqCst)
    }

    fn fault(&self, call: &RecordedCall) -> Option<Fault> {
        let step = call.step()?;
        self.config
            .lock()
            .unwrap()
            .faults
            .iter()
            .find(|(faulty, _)| *faulty == step)
            .map(|(_, fault)| *fault)
    }

    fn respond(&self, call: &RecordedCall) -> HttpResponse {
        let config = self.config.lock().unwrap().clone();

        match call.method.as_str() {
            "POST" if call.url.contains("person/check") => {
                let status = if config.login_status == 100 { "ok" } else { "failure" };
                let body = serde_json::json!({
                    "ocs": {
                        "meta": {
                            "status": status,
                            "statuscode": config.login_status,
                            "message": config.login_message,
                        }
                    }
                });
                HttpResponse::new(200, body.to_string())
            }
            "PROPFIND" => HttpResponse::new(config.propfind_status, quota_xml(&config)),
            "PUT" => {
                if config.failing_puts.iter().any(|name| call.url.ends_with(name.as_str())) {
                    HttpResponse::new(500, "")
                } else {
                    HttpResponse::new(config.put_status, "")
                }
            }
            "POST" if call.url.contains("files_sharing") => {
                let body = serde_json::json!({
                    "ocs": {
                        "meta": { "status": "ok", "statuscode": 100, "message": null },
                        "data": { "id": 7, "token": "abc", "url": config.share_url }
                    }
                });
                HttpResponse::new(config.share_status, body.to_string())
            }
            _ => HttpResponse::new(404, ""),
        }
    }
}

fn quota_xml(config: &MockConfig) -> String {
    let mut props = String::new();
    if let Some(available) = config.quota_available {
        props.push_str(&format!("<d:quota-available-bytes>{}</d:quota-available-bytes>", available));
    }
    if let Some(used) = config.quota_used {
        props.push_str(&format!("<d:quota-used-bytes>{}</d:quota-used-bytes>", used));
    }

    format!(
        concat!(
            r#"<?xml version="1.0"?>"#,
            r#"<d:multistatus xmlns:d="DAV:" xmlns:oc="http://owncloud.org/ns">"#,
            "<d:response><d:href>/remote.php/webdav/</d:href>",
            "<d:propstat><d:prop>{}</d:prop><d:status>HTTP/1.1 200 OK</d:status></d:propstat>",
            "</d:response></d:multistatus>",
        ),
        props
    )
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let call = RecordedCall::from_request(&request);
        self.calls.lock().unwrap().push(call.clone());

        let mut guard = AbortGuard {
            aborts: self.aborts.clone(),
            finished: false,
        };

        if call.method == "PUT" {
            if let Some(gate) = &self.put_gate {
                let permit = gate
                    .acquire()
                    .await
                    .map_err(|err| TransportError::InvalidRequest(err.to_string()))?;
                permit.forget();
            }
        }

        guard.finished = true;
        match self.fault(&call) {
            Some(Fault::TransportError) => Err(TransportError::InvalidRequest("connection reset".to_string())),
            Some(Fault::Garbage) => Ok(HttpResponse::new(200, "<html>oops")),
            None => Ok(self.respond(&call)),
        }
    }
}

/// Files held in memory, keyed by path.
#[derive(Default)]
pub struct MemoryFiles {
    files: Mutex<HashMap<PathBuf, Vec<u8>>>,
}

impl MemoryFiles {
    pub fn with(files: &[(&str, usize)]) -> Self {
        let source = Self::default();
        for (path, size) in files {
            source.add(path, *size);
        }
        source
    }

    pub fn add(&self, path: &str, size: usize) {
        self.files
            .lock()
            .unwrap()
            .insert(PathBuf::from(path), vec![b'x'; size]);
    }
}

#[async_trait]
impl FileSource for MemoryFiles {
    async fn size(&self, path: &Path) -> io::Result<u64> {
        self.files
            .lock()
            .unwrap()
            .get(path)
            .map(|data| data.len() as u64)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, path.display().to_string()))
    }

    async fn open(&self, path: &Path) -> io::Result<ByteStream> {
        let data = self
            .files
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, path.display().to_string()))?;

        Ok(Box::pin(futures::stream::iter(vec![Ok(Bytes::from(data))])))
    }
}

pub struct Offline;

impl Connectivity for Offline {
    fn is_offline(&self) -> bool {
        true
    }
}

/// Observer remembering every notification.
#[derive(Default)]
pub struct RecordingObserver {
    starts: AtomicUsize,
    stops: Mutex<Vec<Status>>,
}

impl RecordingObserver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> Vec<Status> {
        self.stops.lock().unwrap().clone()
    }

    pub fn stop_count(&self) -> usize {
        self.stops.lock().unwrap().len()
    }

    /// Waits for the first stop notification.
    pub async fn stopped(&self) -> Status {
        wait_until(|| self.stop_count() > 0).await;
        self.stops()[0].clone()
    }
}

impl UploadObserver for RecordingObserver {
    fn on_start(&self) {
        self.starts.fetch_add(1, Ordering::SeqCst);
    }

    fn on_stop(&self, status: Status) {
        self.stops.lock().unwrap().push(status);
    }
}

pub fn account() -> AccountConfig {
    AccountConfig::new(SERVER, FOLDER, USERNAME)
        .with_password(PASSWORD)
        .with_max_file_size(1000)
}

pub fn environment(transport: Arc<MockTransport>, files: Arc<MemoryFiles>) -> Environment {
    Environment {
        transport,
        credentials: Arc::new(StaticCredentials::new(USERNAME, Some(PASSWORD))),
        files,
        connectivity: Arc::new(AlwaysOnline),
    }
}

/// Environment whose credential store knows no password.
pub fn passwordless_environment(transport: Arc<MockTransport>, files: Arc<MemoryFiles>) -> Environment {
    Environment {
        credentials: Arc::new(StaticCredentials::new(USERNAME, None)),
        ..environment(transport, files)
    }
}

pub fn start_passwordless_provider(transport: Arc<MockTransport>, files: Arc<MemoryFiles>) -> ProviderHandle {
    let account = AccountConfig::new(SERVER, FOLDER, USERNAME).with_max_file_size(1000);
    Provider::new("account1", account, passwordless_environment(transport, files))
}

pub fn start_provider(transport: Arc<MockTransport>, files: Arc<MemoryFiles>) -> ProviderHandle {
    Provider::new("account1", account(), environment(transport, files))
}

/// Polls `condition` until it holds, panicking after a few seconds.
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    let result = tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;

    assert!(result.is_ok(), "condition not reached in time");
}

/// Gives the worker a chance to process anything still in flight.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

pub async fn with_timeout<F: Future>(future: F) -> F::Output {
    tokio::time::timeout(Duration::from_secs(5), future)
        .await
        .expect("timed out")
}
