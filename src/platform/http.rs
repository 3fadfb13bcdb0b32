//! HTTP-backed platform: device sign-in, account info, model runs and synced storage

use super::{
    ChangeNotifier, KeyValueStore, ModelClient, Platform, RunOutput, RunRequest,
    SubscriptionStatus, SyncStatus, Usage, User,
};
use crate::constants::{APP_VERSION, HTTP_TIMEOUT_SECS};
use crate::db::{Database, SessionRow};
use crate::error::{PlatformError, RunError};
use crate::settings::{ConfigError, Settings};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};
use tokio::runtime::Handle;
use tracing::{debug, error, info, warn};

const PROJECT_HEADER: &str = "X-Project-Token";

#[derive(Debug, Clone)]
struct Session {
    access_token: String,
    user: User,
}

#[derive(Debug, Deserialize)]
struct DeviceCode {
    device_code: String,
    verification_url: String,
    #[serde(default = "default_poll_interval")]
    interval_secs: u64,
    #[serde(default = "default_code_lifetime")]
    expires_in_secs: u64,
}

fn default_poll_interval() -> u64 {
    5
}

fn default_code_lifetime() -> u64 {
    600
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    user: User,
}

#[derive(Debug)]
enum TokenPoll {
    Granted(TokenResponse),
    Pending,
    Expired,
}

/// Error payload returned by the platform API
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(rename = "type")]
    kind: Option<String>,
    message: Option<String>,
    /// Milliseconds
    #[serde(rename = "retryAfter")]
    retry_after: Option<u64>,
}

/// Maps a failed `/v1/run` response onto the run error taxonomy.
fn classify_run_failure(status: u16, retry_after_header: Option<&str>, body: &str) -> RunError {
    let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
    let kind = parsed.kind.as_deref();

    if kind == Some("insufficient_credits") || status == 402 {
        return RunError::InsufficientCredits;
    }
    if kind == Some("rate_limit_exceeded") || status == 429 {
        let retry_after = parsed
            .retry_after
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
            .or_else(|| {
                retry_after_header
                    .and_then(|h| h.trim().parse::<u64>().ok())
                    .filter(|secs| *secs > 0)
                    .map(Duration::from_secs)
            });
        return RunError::RateLimitExceeded { retry_after };
    }
    if status == 401 {
        return RunError::NotSignedIn;
    }
    RunError::Api {
        status,
        message: parsed.message.unwrap_or_else(|| body.to_string()),
    }
}

fn token_poll_from(status: u16, body: &str) -> Result<TokenPoll, PlatformError> {
    match status {
        200 => Ok(TokenPoll::Granted(serde_json::from_str(body)?)),
        202 | 428 => Ok(TokenPoll::Pending),
        410 => Ok(TokenPoll::Expired),
        _ => Err(PlatformError::Api {
            status,
            message: body.to_string(),
        }),
    }
}

fn join_url(base: &str, path: &str) -> String {
    format!("{}{}", base.trim_end_matches('/'), path)
}

// ============================================================================
// REMOTE - raw API access shared by every platform part
// ============================================================================

struct Remote {
    http: reqwest::Client,
    base_url: String,
    project_token: Option<String>,
    session: RwLock<Option<Session>>,
    notifier: RwLock<Option<ChangeNotifier>>,
}

impl Remote {
    fn url(&self, path: &str) -> String {
        join_url(&self.base_url, path)
    }

    fn project_token(&self) -> Result<&str, PlatformError> {
        self.project_token
            .as_deref()
            .ok_or(PlatformError::Config(ConfigError::MissingProjectToken))
    }

    fn session(&self) -> Option<Session> {
        self.session.read().ok().and_then(|s| s.clone())
    }

    fn set_session(&self, session: Option<Session>) {
        if let Ok(mut slot) = self.session.write() {
            *slot = session;
        }
    }

    fn access_token(&self) -> Option<String> {
        self.session().map(|s| s.access_token)
    }

    fn notify(&self) {
        if let Some(notify) = self.notifier.read().ok().and_then(|n| n.clone()) {
            notify();
        }
    }

    fn authorized(
        &self,
        builder: reqwest::RequestBuilder,
    ) -> Result<reqwest::RequestBuilder, PlatformError> {
        let token = self.access_token().ok_or(PlatformError::NotSignedIn)?;
        Ok(builder
            .header(PROJECT_HEADER, self.project_token()?)
            .bearer_auth(token))
    }

    async fn request_device_code(&self) -> Result<DeviceCode, PlatformError> {
        let response = self
            .http
            .post(self.url("/v1/auth/device"))
            .header(PROJECT_HEADER, self.project_token()?)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(PlatformError::Api {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }
        Ok(response.json().await?)
    }

    async fn poll_token(&self, code: &DeviceCode) -> Result<TokenPoll, PlatformError> {
        let response = self
            .http
            .post(self.url("/v1/auth/token"))
            .header(PROJECT_HEADER, self.project_token()?)
            .json(&serde_json::json!({ "device_code": code.device_code }))
            .send()
            .await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        token_poll_from(status, &body)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
    ) -> Result<Option<T>, PlatformError> {
        let response = self.authorized(self.http.get(self.url(path)))?.send().await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            StatusCode::UNAUTHORIZED => Err(PlatformError::NotSignedIn),
            status if status.is_success() => Ok(Some(response.json().await?)),
            status => Err(PlatformError::Api {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            }),
        }
    }

    async fn put_storage(&self, key: &str, value: &serde_json::Value) -> Result<(), PlatformError> {
        let response = self
            .authorized(self.http.put(self.url(&format!("/v1/storage/{key}"))))?
            .json(&serde_json::json!({ "value": value }))
            .send()
            .await?;
        match response.status() {
            StatusCode::UNAUTHORIZED => Err(PlatformError::NotSignedIn),
            status if status.is_success() => Ok(()),
            status => Err(PlatformError::Api {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            }),
        }
    }

    async fn get_storage(&self, key: &str) -> Result<Option<serde_json::Value>, PlatformError> {
        #[derive(Deserialize)]
        struct StoredValue {
            value: serde_json::Value,
        }
        let stored: Option<StoredValue> = self.get_json(&format!("/v1/storage/{key}")).await?;
        Ok(stored.map(|s| s.value))
    }

    async fn run(&self, model_id: &str, request: &RunRequest) -> Result<RunOutput, RunError> {
        let token = self.access_token().ok_or(RunError::NotSignedIn)?;
        let project = self.project_token.as_deref().ok_or(RunError::NotSignedIn)?;

        debug!(model = model_id, width = request.input.width, height = request.input.height, "Running model");
        let response = self
            .http
            .post(self.url("/v1/run"))
            .header(PROJECT_HEADER, project)
            .bearer_auth(token)
            .json(&serde_json::json!({ "model": model_id, "input": &request.input }))
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }

        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.text().await.unwrap_or_default();
        Err(classify_run_failure(status.as_u16(), retry_after.as_deref(), &body))
    }
}

// ============================================================================
// ACCOUNT - cached usage and subscription
// ============================================================================

#[derive(Default)]
struct Account {
    usage: RwLock<Option<Usage>>,
    subscription: RwLock<Option<SubscriptionStatus>>,
}

impl Account {
    fn clear(&self) {
        if let Ok(mut usage) = self.usage.write() {
            *usage = None;
        }
        if let Ok(mut subscription) = self.subscription.write() {
            *subscription = None;
        }
    }
}

/// Drops the session locally when the platform rejects our token.
fn expire_session(remote: &Remote, account: &Account, db: &Database) {
    warn!("Platform rejected session, signing out");
    remote.set_session(None);
    account.clear();
    if let Err(e) = db.clear_session() {
        warn!(error = %e, "Failed to clear stored session");
    }
    remote.notify();
}

async fn refresh_account(remote: &Remote, account: &Account, db: &Database) {
    match remote.get_json::<Usage>("/v1/usage").await {
        Ok(usage) => {
            if let Ok(mut slot) = account.usage.write() {
                *slot = usage;
            }
        }
        Err(PlatformError::NotSignedIn) => return expire_session(remote, account, db),
        Err(e) => warn!(error = %e, "Failed to fetch usage"),
    }
    match remote.get_json::<SubscriptionStatus>("/v1/subscription").await {
        Ok(subscription) => {
            if let Ok(mut slot) = account.subscription.write() {
                *slot = subscription;
            }
        }
        Err(PlatformError::NotSignedIn) => return expire_session(remote, account, db),
        Err(e) => warn!(error = %e, "Failed to fetch subscription"),
    }
    remote.notify();
}

// ============================================================================
// SYNCED STORE - SQLite first, platform in the background
// ============================================================================

#[derive(Default)]
struct SyncState {
    status: Mutex<SyncStatus>,
    revision: AtomicU64,
    // Serializes pushes so the platform always ends with the latest local value
    push_lock: tokio::sync::Mutex<()>,
}

struct SyncedStore {
    db: Arc<Database>,
    remote: Arc<Remote>,
    runtime: Handle,
    state: Arc<SyncState>,
    keys: Mutex<HashSet<String>>,
}

fn set_status(state: &SyncState, remote: &Remote, status: SyncStatus) {
    if let Ok(mut slot) = state.status.lock() {
        *slot = status;
    }
    remote.notify();
}

async fn push_key(db: Arc<Database>, remote: Arc<Remote>, state: Arc<SyncState>, key: String) {
    let _guard = state.push_lock.lock().await;
    let raw = match db.get_value(&key) {
        Ok(Some(raw)) => raw,
        Ok(None) => return,
        Err(e) => {
            warn!(key = %key, error = %e, "Failed to read value for sync");
            return set_status(&state, &remote, SyncStatus::Error);
        }
    };
    let value: serde_json::Value = match serde_json::from_str(&raw) {
        Ok(value) => value,
        Err(e) => {
            warn!(key = %key, error = %e, "Local value is not valid JSON");
            return set_status(&state, &remote, SyncStatus::Error);
        }
    };

    set_status(&state, &remote, SyncStatus::Syncing);
    match remote.put_storage(&key, &value).await {
        Ok(()) => {
            if let Err(e) = db.mark_clean(&key) {
                warn!(key = %key, error = %e, "Failed to mark value clean");
            }
            debug!(key = %key, "Value synced");
            set_status(&state, &remote, SyncStatus::Synced);
        }
        Err(PlatformError::NotSignedIn) => set_status(&state, &remote, SyncStatus::Offline),
        Err(e) => {
            warn!(key = %key, error = %e, "Failed to sync value");
            set_status(&state, &remote, SyncStatus::Error);
        }
    }
}

impl SyncedStore {
    /// Drops every cached value. Handles see the default on their next refresh.
    fn clear_local(&self) {
        if let Err(e) = self.db.clear_storage() {
            warn!(error = %e, "Failed to clear cached storage");
        }
        self.state.revision.fetch_add(1, Ordering::SeqCst);
        set_status(&self.state, &self.remote, SyncStatus::Idle);
    }

    /// Ties the local cache to `email`, dropping values left by another account.
    fn adopt_owner(&self, email: &str) {
        match self.db.storage_owner() {
            Ok(Some(owner)) if owner == email => return,
            Ok(owner) => debug!(previous = ?owner, "Cached storage belongs to another account"),
            Err(e) => warn!(error = %e, "Failed to read storage owner"),
        }
        self.clear_local();
        if let Err(e) = self.db.set_storage_owner(email) {
            warn!(error = %e, "Failed to record storage owner");
        }
    }

    /// Pushes local edits and pulls remote values for every key in use.
    async fn pull(&self) {
        let dirty: HashSet<String> = match self.db.dirty_keys() {
            Ok(keys) => keys.into_iter().collect(),
            Err(e) => {
                warn!(error = %e, "Failed to list unsynced keys");
                HashSet::new()
            }
        };
        let known: Vec<String> = self
            .keys
            .lock()
            .map(|k| k.iter().cloned().collect())
            .unwrap_or_default();

        for key in &dirty {
            push_key(self.db.clone(), self.remote.clone(), self.state.clone(), key.clone()).await;
        }

        set_status(&self.state, &self.remote, SyncStatus::Syncing);
        let mut failed = false;
        for key in known.iter().filter(|k| !dirty.contains(*k)) {
            match self.remote.get_storage(key).await {
                Ok(Some(value)) => {
                    let text = value.to_string();
                    let changed = self.db.get_value(key).ok().flatten().as_deref() != Some(text.as_str());
                    if changed {
                        match self.db.set_value_if_clean(key, &text) {
                            Ok(true) => {
                                self.state.revision.fetch_add(1, Ordering::SeqCst);
                                debug!(key = %key, "Pulled newer value");
                            }
                            Ok(false) => debug!(key = %key, "Local edit pending, keeping it"),
                            Err(e) => {
                                warn!(key = %key, error = %e, "Failed to cache pulled value");
                                failed = true;
                            }
                        }
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(key = %key, error = %e, "Failed to pull value");
                    failed = true;
                }
            }
        }
        let status = if failed { SyncStatus::Error } else { SyncStatus::Synced };
        set_status(&self.state, &self.remote, status);
    }
}

impl KeyValueStore for SyncedStore {
    fn get(&self, key: &str) -> Option<serde_json::Value> {
        if let Ok(mut keys) = self.keys.lock() {
            keys.insert(key.to_string());
        }
        let raw = match self.db.get_value(key) {
            Ok(raw) => raw?,
            Err(e) => {
                warn!(key, error = %e, "Failed to read stored value");
                return None;
            }
        };
        serde_json::from_str(&raw)
            .map_err(|e| warn!(key, error = %e, "Stored value is not valid JSON"))
            .ok()
    }

    fn set(&self, key: &str, value: serde_json::Value) {
        if let Ok(mut keys) = self.keys.lock() {
            keys.insert(key.to_string());
        }
        if let Err(e) = self.db.set_value(key, &value.to_string(), true) {
            error!(key, error = %e, "Failed to write stored value");
            return set_status(&self.state, &self.remote, SyncStatus::Error);
        }
        if self.remote.access_token().is_none() {
            return set_status(&self.state, &self.remote, SyncStatus::Offline);
        }
        self.runtime.spawn(push_key(
            self.db.clone(),
            self.remote.clone(),
            self.state.clone(),
            key.to_string(),
        ));
    }

    fn sync_status(&self) -> SyncStatus {
        self.state.status.lock().map(|s| *s).unwrap_or(SyncStatus::Error)
    }

    fn revision(&self) -> u64 {
        self.state.revision.load(Ordering::SeqCst)
    }
}

// ============================================================================
// MODEL CLIENT
// ============================================================================

struct HttpModelClient {
    remote: Arc<Remote>,
    account: Arc<Account>,
    db: Arc<Database>,
}

#[async_trait]
impl ModelClient for HttpModelClient {
    async fn run(&self, model_id: &str, request: &RunRequest) -> Result<RunOutput, RunError> {
        let result = self.remote.run(model_id, request).await;

        // Credits change on every run, successful or not
        let (remote, account, db) = (self.remote.clone(), self.account.clone(), self.db.clone());
        tokio::spawn(async move { refresh_account(&remote, &account, &db).await });

        if matches!(result, Err(RunError::NotSignedIn)) {
            expire_session(&self.remote, &self.account, &self.db);
        }
        result
    }
}

// ============================================================================
// PLATFORM
// ============================================================================

pub struct HttpPlatform {
    remote: Arc<Remote>,
    account: Arc<Account>,
    store: Arc<SyncedStore>,
    model_client: Arc<HttpModelClient>,
    db: Arc<Database>,
    runtime: Handle,
    sign_in_pending: Arc<AtomicBool>,
}

async fn device_sign_in(remote: &Remote) -> Result<Session, PlatformError> {
    let code = remote.request_device_code().await?;
    info!(url = %code.verification_url, "Opening browser for sign-in");
    open::that(&code.verification_url)?;

    let deadline = Instant::now() + Duration::from_secs(code.expires_in_secs);
    let interval = Duration::from_secs(code.interval_secs.max(1));
    loop {
        tokio::time::sleep(interval).await;
        if Instant::now() >= deadline {
            return Err(PlatformError::SignInExpired);
        }
        match remote.poll_token(&code).await? {
            TokenPoll::Granted(token) => {
                return Ok(Session {
                    access_token: token.access_token,
                    user: token.user,
                })
            }
            TokenPoll::Pending => debug!("Sign-in still pending"),
            TokenPoll::Expired => return Err(PlatformError::SignInExpired),
        }
    }
}

impl HttpPlatform {
    pub fn new(settings: &Settings, db: Arc<Database>, runtime: Handle) -> Result<Self, PlatformError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .user_agent(format!("duck-generator/{APP_VERSION}"))
            .build()?;

        let project_token = match settings.project_token() {
            Ok(token) => Some(token.to_string()),
            Err(e) => {
                error!(error = %e, "Platform is not configured");
                None
            }
        };

        let session = db.load_session()?.map(|row| Session {
            access_token: row.access_token,
            user: User { email: row.email },
        });
        if let Some(session) = &session {
            info!(email = %session.user.email, "Restored session");
        }

        let remote = Arc::new(Remote {
            http,
            base_url: settings.api_base_url.clone(),
            project_token,
            session: RwLock::new(session),
            notifier: RwLock::new(None),
        });
        let account = Arc::new(Account::default());
        let store = Arc::new(SyncedStore {
            db: db.clone(),
            remote: remote.clone(),
            runtime: runtime.clone(),
            state: Arc::new(SyncState::default()),
            keys: Mutex::new(HashSet::new()),
        });
        let model_client = Arc::new(HttpModelClient {
            remote: remote.clone(),
            account: account.clone(),
            db: db.clone(),
        });

        let platform = Self {
            remote,
            account,
            store,
            model_client,
            db,
            runtime,
            sign_in_pending: Arc::new(AtomicBool::new(false)),
        };
        if platform.is_signed_in() {
            platform.spawn_session_refresh();
        }
        Ok(platform)
    }

    fn spawn_session_refresh(&self) {
        let (remote, account, db, store) = (
            self.remote.clone(),
            self.account.clone(),
            self.db.clone(),
            self.store.clone(),
        );
        self.runtime.spawn(async move {
            refresh_account(&remote, &account, &db).await;
            if remote.access_token().is_some() {
                store.pull().await;
            }
        });
    }
}

impl Platform for HttpPlatform {
    fn is_signed_in(&self) -> bool {
        self.remote.access_token().is_some()
    }

    fn sign_in(&self) {
        if self.sign_in_pending.swap(true, Ordering::SeqCst) {
            debug!("Sign-in already in progress");
            return;
        }
        self.remote.notify();

        let (remote, account, db, store, pending) = (
            self.remote.clone(),
            self.account.clone(),
            self.db.clone(),
            self.store.clone(),
            self.sign_in_pending.clone(),
        );
        self.runtime.spawn(async move {
            match device_sign_in(&remote).await {
                Ok(session) => {
                    info!(email = %session.user.email, "Signed in");
                    let row = SessionRow {
                        access_token: session.access_token.clone(),
                        email: session.user.email.clone(),
                    };
                    if let Err(e) = db.save_session(&row) {
                        warn!(error = %e, "Failed to persist session");
                    }
                    store.adopt_owner(&row.email);
                    remote.set_session(Some(session));
                    pending.store(false, Ordering::SeqCst);
                    remote.notify();
                    refresh_account(&remote, &account, &db).await;
                    store.pull().await;
                }
                Err(e) => {
                    error!(error = %e, "Sign-in failed");
                    pending.store(false, Ordering::SeqCst);
                    remote.notify();
                }
            }
        });
    }

    fn sign_out(&self) {
        info!("Signing out");
        self.remote.set_session(None);
        self.account.clear();
        if let Err(e) = self.db.clear_session() {
            warn!(error = %e, "Failed to clear stored session");
        }
        self.store.clear_local();
    }

    fn sign_in_pending(&self) -> bool {
        self.sign_in_pending.load(Ordering::SeqCst)
    }

    fn user(&self) -> Option<User> {
        self.remote.session().map(|s| s.user)
    }

    fn usage(&self) -> Option<Usage> {
        self.account.usage.read().ok().and_then(|u| u.clone())
    }

    fn subscription_status(&self) -> Option<SubscriptionStatus> {
        self.account.subscription.read().ok().and_then(|s| s.clone())
    }

    fn subscribe(&self) {
        let Ok(project) = self.remote.project_token() else {
            error!("Cannot open plan management without a project token");
            return;
        };
        let url = match reqwest::Url::parse_with_params(
            &self.remote.url("/subscribe"),
            &[("project", project)],
        ) {
            Ok(url) => url,
            Err(e) => {
                error!(error = %e, "Invalid plan management URL");
                return;
            }
        };
        info!(url = %url, "Opening plan management");
        if let Err(e) = open::that(url.as_str()) {
            error!(error = %e, "Failed to open browser");
        }
    }

    fn client(&self) -> Option<Arc<dyn ModelClient>> {
        if !self.is_signed_in() || self.remote.project_token.is_none() {
            return None;
        }
        Some(self.model_client.clone())
    }

    fn storage(&self) -> Arc<dyn KeyValueStore> {
        self.store.clone()
    }

    fn set_change_notifier(&self, notifier: ChangeNotifier) {
        if let Ok(mut slot) = self.remote.notifier.write() {
            *slot = Some(notifier);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credits_by_type_or_status() {
        let by_type = classify_run_failure(400, None, r#"{"type":"insufficient_credits"}"#);
        assert!(matches!(by_type, RunError::InsufficientCredits));

        let by_status = classify_run_failure(402, None, "payment required");
        assert!(matches!(by_status, RunError::InsufficientCredits));
    }

    #[test]
    fn rate_limit_prefers_body_millis() {
        let err = classify_run_failure(
            429,
            Some("30"),
            r#"{"type":"rate_limit_exceeded","retryAfter":1500}"#,
        );
        match err {
            RunError::RateLimitExceeded { retry_after } => {
                assert_eq!(retry_after, Some(Duration::from_millis(1500)))
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn rate_limit_falls_back_to_header_seconds() {
        let err = classify_run_failure(429, Some(" 30 "), "");
        match err {
            RunError::RateLimitExceeded { retry_after } => {
                assert_eq!(retry_after, Some(Duration::from_secs(30)))
            }
            other => panic!("unexpected {other:?}"),
        }

        let none = classify_run_failure(429, None, "{}");
        assert!(matches!(none, RunError::RateLimitExceeded { retry_after: None }));
    }

    #[test]
    fn zero_retry_hint_is_no_hint() {
        let err = classify_run_failure(
            429,
            None,
            r#"{"type":"rate_limit_exceeded","retryAfter":0}"#,
        );
        assert!(matches!(err, RunError::RateLimitExceeded { retry_after: None }));
        assert_eq!(
            crate::error::GenerationErrorKind::from(&err).message(),
            "Rate limit reached. Please try again in 60 seconds."
        );

        let header = classify_run_failure(429, Some("0"), "{}");
        assert!(matches!(header, RunError::RateLimitExceeded { retry_after: None }));
    }

    #[test]
    fn other_failures_keep_status_and_message() {
        let err = classify_run_failure(500, None, r#"{"message":"model crashed"}"#);
        match err {
            RunError::Api { status, message } => {
                assert_eq!(status, 500);
                assert_eq!(message, "model crashed");
            }
            other => panic!("unexpected {other:?}"),
        }

        let raw = classify_run_failure(503, None, "upstream down");
        assert_eq!(raw.to_string(), "API error: 503 - upstream down");
        assert!(matches!(classify_run_failure(401, None, ""), RunError::NotSignedIn));
    }

    #[test]
    fn token_poll_states() {
        let granted = token_poll_from(
            200,
            r#"{"access_token":"abc","user":{"email":"duck@example.com"}}"#,
        )
        .unwrap();
        match granted {
            TokenPoll::Granted(token) => {
                assert_eq!(token.access_token, "abc");
                assert_eq!(token.user.email, "duck@example.com");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(token_poll_from(202, "").unwrap(), TokenPoll::Pending));
        assert!(matches!(token_poll_from(428, "").unwrap(), TokenPoll::Pending));
        assert!(matches!(token_poll_from(410, "").unwrap(), TokenPoll::Expired));
        assert!(matches!(
            token_poll_from(500, "oops"),
            Err(PlatformError::Api { status: 500, .. })
        ));
    }

    #[test]
    fn device_code_defaults() {
        let code: DeviceCode = serde_json::from_str(
            r#"{"device_code":"d","verification_url":"https://example.com/verify"}"#,
        )
        .unwrap();
        assert_eq!(code.interval_secs, 5);
        assert_eq!(code.expires_in_secs, 600);
    }

    #[test]
    fn urls_join_without_double_slash() {
        assert_eq!(join_url("https://api.example.com/", "/v1/run"), "https://api.example.com/v1/run");
        assert_eq!(join_url("https://api.example.com", "/v1/run"), "https://api.example.com/v1/run");
    }

    #[tokio::test]
    async fn signed_out_platform_has_no_client() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let settings = Settings {
            project_token: Some("project".into()),
            ..Settings::default()
        };
        let platform = HttpPlatform::new(&settings, db, Handle::current()).unwrap();
        assert!(!platform.is_signed_in());
        assert!(platform.client().is_none());
        assert!(platform.user().is_none());
    }

    #[tokio::test]
    async fn signed_out_writes_stay_local() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let settings = Settings::default();
        let platform = HttpPlatform::new(&settings, db.clone(), Handle::current()).unwrap();

        let store = platform.storage();
        store.set("duck-history", serde_json::json!([{"theme": "pirate", "timestamp": 1}]));
        assert_eq!(store.sync_status(), SyncStatus::Offline);
        assert_eq!(
            store.get("duck-history"),
            Some(serde_json::json!([{"theme": "pirate", "timestamp": 1}]))
        );
        assert_eq!(db.dirty_keys().unwrap(), vec!["duck-history".to_string()]);
    }

    fn offline_platform(db: Arc<Database>) -> HttpPlatform {
        let settings = Settings {
            project_token: Some("project".into()),
            ..Settings::default()
        };
        HttpPlatform::new(&settings, db, Handle::current()).unwrap()
    }

    #[tokio::test]
    async fn sign_out_drops_cached_history() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        db.set_storage_owner("a@example.com").unwrap();
        db.set_value("duck-history", r#"[{"theme":"pirate","timestamp":1}]"#, true).unwrap();
        let platform = offline_platform(db.clone());

        let store = platform.storage();
        let mut history = crate::platform::use_storage(
            store.clone(),
            "duck-history",
            Vec::<crate::history::HistoryEntry>::new(),
        );
        assert_eq!(history.value().len(), 1);

        platform.sign_out();
        assert!(history.refresh());
        assert!(history.value().is_empty());
        assert_eq!(store.get("duck-history"), None);
        assert!(db.dirty_keys().unwrap().is_empty());
        assert_eq!(db.storage_owner().unwrap(), None);
    }

    #[tokio::test]
    async fn another_account_starts_with_empty_storage() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        db.set_storage_owner("a@example.com").unwrap();
        db.set_value("duck-history", r#"[{"theme":"pirate","timestamp":1}]"#, true).unwrap();
        let platform = offline_platform(db.clone());
        let revision = platform.store.revision();

        platform.store.adopt_owner("b@example.com");
        assert!(platform.store.revision() > revision);
        assert_eq!(db.get_value("duck-history").unwrap(), None);
        assert!(db.dirty_keys().unwrap().is_empty());
        assert_eq!(db.storage_owner().unwrap().as_deref(), Some("b@example.com"));
    }

    #[tokio::test]
    async fn same_account_keeps_unsynced_values() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        db.set_storage_owner("a@example.com").unwrap();
        db.set_value("duck-history", "[]", true).unwrap();
        let platform = offline_platform(db.clone());
        let revision = platform.store.revision();

        platform.store.adopt_owner("a@example.com");
        assert_eq!(platform.store.revision(), revision);
        assert_eq!(db.dirty_keys().unwrap(), vec!["duck-history".to_string()]);
    }
}
