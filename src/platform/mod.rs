//! Hosted platform interface: auth, billing, model execution and storage
//!
//! The UI only talks to the platform through [`Platform`], so a fake can be
//! dropped in for tests. [`HttpPlatform`] is the real implementation.

mod http;
mod storage;

#[cfg(test)]
pub mod fake;

pub use http::HttpPlatform;
pub use storage::{use_storage, KeyValueStore, Stored, SyncStatus};

use crate::error::RunError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    #[serde(rename = "remainingCredits")]
    pub remaining_credits: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionStatus {
    #[serde(default)]
    pub plan: Option<Plan>,
}

/// Model input parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunInput {
    pub prompt: String,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunRequest {
    pub input: RunInput,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RunOutput {
    pub output: Vec<String>,
}

/// Called by the platform whenever state changes outside a UI event.
pub type ChangeNotifier = Arc<dyn Fn() + Send + Sync>;

/// Generic model execution endpoint.
#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn run(&self, model_id: &str, request: &RunRequest) -> Result<RunOutput, RunError>;
}

pub trait Platform: Send + Sync {
    fn is_signed_in(&self) -> bool;

    /// Starts the sign-in flow. Returns immediately; completion is signalled
    /// through the change notifier.
    fn sign_in(&self);

    fn sign_out(&self);

    /// True while a sign-in flow started by `sign_in` is still running.
    fn sign_in_pending(&self) -> bool {
        false
    }

    fn user(&self) -> Option<User>;

    fn usage(&self) -> Option<Usage>;

    fn subscription_status(&self) -> Option<SubscriptionStatus>;

    /// Opens the upgrade / plan management flow.
    fn subscribe(&self);

    /// Model client handle, present only when the platform is ready to run models.
    fn client(&self) -> Option<Arc<dyn ModelClient>>;

    fn storage(&self) -> Arc<dyn KeyValueStore>;

    fn set_change_notifier(&self, _notifier: ChangeNotifier) {}
}
