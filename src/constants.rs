//! Application constants and configuration

pub const APP_NAME: &str = "Duck Generator";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const DEFAULT_API_BASE_URL: &str = "https://api.subscribe.dev";
pub const PROJECT_TOKEN_ENV: &str = "DUCK_PROJECT_TOKEN";

/// Model used for every generation
pub const MODEL_ID: &str = "black-forest-labs/flux-schnell";
pub const IMAGE_WIDTH: u32 = 1024;
pub const IMAGE_HEIGHT: u32 = 1024;

/// Storage key for the recent themes list
pub const HISTORY_KEY: &str = "duck-history";
pub const HISTORY_LIMIT: usize = 10;

/// Used when a rate limit response carries no retry hint
pub const DEFAULT_RETRY_AFTER_MS: u64 = 60_000;

pub const HTTP_TIMEOUT_SECS: u64 = 120;
