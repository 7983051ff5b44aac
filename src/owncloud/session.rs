use std::sync::Arc;
use reqwest::Method;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};
use crate::config::AccountConfig;
use crate::core::{
    BasicAuth,
    CredentialStore,
    HttpRequest,
    ProviderError,
    RequestBody,
    Result,
    Transport,
};
use super::ocs::{self, Endpoints, OCS_STATUS_OK};
use super::quota::{QuotaInfo, QuotaTracker};

/// Error code and message last reported by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastError {
    pub code: i64,
    pub message: String,
}

#[derive(Debug, Default)]
struct SessionState {
    logged_in: bool,
    password: Option<String>,
    last_error: Option<LastError>,
}

/// Login state and credentials of one account.
///
/// Cheap to clone; clones share state.
#[derive(Clone)]
pub struct Session {
    username: String,
    endpoints: Endpoints,
    transport: Arc<dyn Transport>,
    credentials: Arc<dyn CredentialStore>,
    quota: QuotaTracker,
    state: Arc<RwLock<SessionState>>,
}

impl Session {
    pub fn new(
        account: &AccountConfig,
        transport: Arc<dyn Transport>,
        credentials: Arc<dyn CredentialStore>,
    ) -> Self {
        let endpoints = Endpoints::new(&account.server);
        let quota = QuotaTracker::new(endpoints.clone(), transport.clone());
        let state = SessionState {
            password: account.password.clone(),
            ..Default::default()
        };

        Self {
            username: account.username.clone(),
            endpoints,
            transport,
            credentials,
            quota,
            state: Arc::new(RwLock::new(state)),
        }
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    pub fn quota_tracker(&self) -> &QuotaTracker {
        &self.quota
    }

    pub async fn is_logged_in(&self) -> bool {
        self.state.read().await.logged_in
    }

    pub async fn last_error(&self) -> Option<LastError> {
        self.state.read().await.last_error.clone()
    }

    pub async fn quota(&self) -> QuotaInfo {
        self.quota.info().await
    }

    /// Username and password for basic auth, asking the credential store
    /// when nothing is cached yet.
    pub async fn basic_auth(&self, with_ui: bool) -> Result<BasicAuth> {
        if let Some(password) = self.state.read().await.password.clone() {
            return Ok(BasicAuth {
                username: self.username.clone(),
                password,
            });
        }

        let password = self
            .credentials
            .get_password(&self.username, with_ui)
            .await
            .filter(|password| !password.is_empty())
            .ok_or_else(|| {
                ProviderError::auth(format!("no password available for {}", self.username))
            })?;

        self.state.write().await.password = Some(password.clone());

        Ok(BasicAuth {
            username: self.username.clone(),
            password,
        })
    }

    /// One login attempt against the OCS person check endpoint.
    pub async fn logon(&self, with_ui: bool) -> Result<()> {
        info!("Logging in, with_ui = {}", with_ui);
        let auth = self.basic_auth(with_ui).await?;

        let form = vec![
            ("login".to_string(), auth.username),
            ("password".to_string(), auth.password),
        ];
        let request = HttpRequest::new(Method::POST, self.endpoints.login_url())
            .body(RequestBody::Form(form));

        let response = match self.transport.send(request).await {
            Ok(response) => response,
            Err(err) => {
                warn!("logon failure: {}", err);
                self.set_logged_in(false).await;
                return Err(ProviderError::auth(format!("login request failed: {}", err)));
            }
        };

        if !response.is_success() {
            warn!("logon rejected with status {}", response.status);
            self.set_logged_in(false).await;
            return Err(ProviderError::auth(format!("login returned status {}", response.status)));
        }

        let meta = match ocs::parse_login_meta(&response.body) {
            Ok(meta) => meta,
            Err(err) => {
                error!("invalid login response: {}", err);
                self.set_logged_in(false).await;
                return Err(ProviderError::auth(format!("invalid login response: {}", err)));
            }
        };

        debug!("statuscode = {}", meta.statuscode);

        let mut state = self.state.write().await;
        if meta.statuscode == OCS_STATUS_OK {
            state.logged_in = true;
            state.last_error = None;
            Ok(())
        } else {
            let message = meta.message.unwrap_or_default();
            state.logged_in = false;
            state.last_error = Some(LastError {
                code: meta.statuscode,
                message: message.clone(),
            });
            Err(ProviderError::Auth(message))
        }
    }

    /// Refreshes the quota using the cached credentials.
    pub async fn get_user_info(&self) -> Result<QuotaInfo> {
        let auth = self.basic_auth(false).await?;
        self.quota.get_user_info(&auth).await
    }

    pub async fn logon_and_get_user_info(&self, with_ui: bool) -> Result<QuotaInfo> {
        self.logon(with_ui).await?;
        self.get_user_info().await
    }

    /// Logs in when needed and refetches the quota when it is stale.
    pub async fn ensure_ready(&self, with_ui: bool) -> Result<()> {
        if !self.is_logged_in().await {
            self.logon_and_get_user_info(with_ui).await?;
        } else if !self.quota.is_fresh().await {
            info!("getting user info");
            self.get_user_info().await?;
        }

        Ok(())
    }

    async fn set_logged_in(&self, logged_in: bool) {
        self.state.write().await.logged_in = logged_in;
    }
}
