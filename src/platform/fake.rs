//! Test doubles for the platform traits

use super::{
    KeyValueStore, ModelClient, Platform, RunOutput, RunRequest,
    SubscriptionStatus, SyncStatus, Usage, User,
};
use crate::error::RunError;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// In-process store. Always reports `Synced`.
#[derive(Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, serde_json::Value>>,
    revision: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces a value as if it arrived from another device.
    pub fn replace_external(&self, key: &str, value: serde_json::Value) {
        self.values.lock().unwrap().insert(key.to_string(), value);
        self.revision.fetch_add(1, Ordering::SeqCst);
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<serde_json::Value> {
        self.values.lock().unwrap().get(key).cloned()
    }

    fn set(&self, key: &str, value: serde_json::Value) {
        self.values.lock().unwrap().insert(key.to_string(), value);
    }

    fn sync_status(&self) -> SyncStatus {
        SyncStatus::Synced
    }

    fn revision(&self) -> u64 {
        self.revision.load(Ordering::SeqCst)
    }
}

/// Model client that replays scripted responses and records every call.
#[derive(Default)]
pub struct FakeModelClient {
    responses: Mutex<VecDeque<Result<RunOutput, RunError>>>,
    calls: Mutex<Vec<(String, RunRequest)>>,
}

impl FakeModelClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn succeeding(urls: &[&str]) -> Self {
        let client = Self::new();
        client.push_ok(urls);
        client
    }

    pub fn failing(err: RunError) -> Self {
        let client = Self::new();
        client.push_err(err);
        client
    }

    pub fn push_ok(&self, urls: &[&str]) {
        self.responses.lock().unwrap().push_back(Ok(RunOutput {
            output: urls.iter().map(|u| u.to_string()).collect(),
        }));
    }

    pub fn push_err(&self, err: RunError) {
        self.responses.lock().unwrap().push_back(Err(err));
    }

    pub fn calls(&self) -> Vec<(String, RunRequest)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ModelClient for FakeModelClient {
    async fn run(&self, model_id: &str, request: &RunRequest) -> Result<RunOutput, RunError> {
        self.calls
            .lock()
            .unwrap()
            .push((model_id.to_string(), request.clone()));
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(RunError::EmptyOutput))
    }
}

/// Platform whose session is toggled directly by tests.
pub struct FakePlatform {
    pub signed_in: AtomicBool,
    pub client: Option<Arc<FakeModelClient>>,
    pub store: Arc<MemoryStore>,
    pub sign_in_calls: AtomicUsize,
}

impl FakePlatform {
    pub fn new(signed_in: bool, client: Option<Arc<FakeModelClient>>) -> Self {
        Self {
            signed_in: AtomicBool::new(signed_in),
            client,
            store: Arc::new(MemoryStore::new()),
            sign_in_calls: AtomicUsize::new(0),
        }
    }
}

impl Platform for FakePlatform {
    fn is_signed_in(&self) -> bool {
        self.signed_in.load(Ordering::SeqCst)
    }

    fn sign_in(&self) {
        self.sign_in_calls.fetch_add(1, Ordering::SeqCst);
        self.signed_in.store(true, Ordering::SeqCst);
    }

    fn sign_out(&self) {
        self.signed_in.store(false, Ordering::SeqCst);
    }

    fn user(&self) -> Option<User> {
        self.is_signed_in().then(|| User {
            email: "duck@example.com".into(),
        })
    }

    fn usage(&self) -> Option<Usage> {
        None
    }

    fn subscription_status(&self) -> Option<SubscriptionStatus> {
        None
    }

    fn subscribe(&self) {}

    fn client(&self) -> Option<Arc<dyn ModelClient>> {
        if !self.is_signed_in() {
            return None;
        }
        self.client
            .clone()
            .map(|c| c as Arc<dyn ModelClient>)
    }

    fn storage(&self) -> Arc<dyn KeyValueStore> {
        self.store.clone()
    }
}
