//! Error types for platform calls and the generation workflow

use crate::constants::DEFAULT_RETRY_AFTER_MS;
use std::time::Duration;

/// Errors returned by the model execution endpoint.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("insufficient credits")]
    InsufficientCredits,

    #[error("rate limited, retry after {retry_after:?}")]
    RateLimitExceeded { retry_after: Option<Duration> },

    #[error("not signed in")]
    NotSignedIn,

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("model returned no output")]
    EmptyOutput,
}

/// Errors from the non-model parts of the platform (auth, usage, storage sync).
#[derive(Debug, thiserror::Error)]
pub enum PlatformError {
    #[error("configuration error: {0}")]
    Config(#[from] crate::settings::ConfigError),

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("sign-in code expired")]
    SignInExpired,

    #[error("not signed in")]
    NotSignedIn,

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to open browser: {0}")]
    Browser(#[from] std::io::Error),
}

/// Classification of a failed generation, as shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationErrorKind {
    InsufficientCredits,
    RateLimited { retry_after_ms: Option<u64> },
    Other,
}

impl GenerationErrorKind {
    pub fn message(&self) -> String {
        match self {
            Self::InsufficientCredits => {
                "Not enough credits! Please upgrade your plan to continue generating ducks."
                    .to_string()
            }
            Self::RateLimited { retry_after_ms } => {
                // Zero counts as no hint
                let ms = retry_after_ms
                    .filter(|ms| *ms > 0)
                    .unwrap_or(DEFAULT_RETRY_AFTER_MS);
                format!(
                    "Rate limit reached. Please try again in {} seconds.",
                    ms.div_ceil(1000)
                )
            }
            Self::Other => "Failed to generate image. Please try again.".to_string(),
        }
    }

    /// Whether the error banner should offer an inline upgrade action.
    pub fn offers_upgrade(&self) -> bool {
        matches!(self, Self::InsufficientCredits)
    }
}

impl From<&RunError> for GenerationErrorKind {
    fn from(err: &RunError) -> Self {
        match err {
            RunError::InsufficientCredits => Self::InsufficientCredits,
            RunError::RateLimitExceeded { retry_after } => Self::RateLimited {
                retry_after_ms: retry_after.map(|d| d.as_millis() as u64),
            },
            RunError::NotSignedIn
            | RunError::Api { .. }
            | RunError::Network(_)
            | RunError::Json(_)
            | RunError::EmptyOutput => Self::Other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credits_message_mentions_upgrade() {
        let kind = GenerationErrorKind::from(&RunError::InsufficientCredits);
        assert_eq!(kind, GenerationErrorKind::InsufficientCredits);
        assert!(kind.message().contains("upgrade"));
        assert!(kind.offers_upgrade());
    }

    #[test]
    fn rate_limit_rounds_seconds_up() {
        let kind = GenerationErrorKind::from(&RunError::RateLimitExceeded {
            retry_after: Some(Duration::from_millis(1500)),
        });
        assert_eq!(
            kind.message(),
            "Rate limit reached. Please try again in 2 seconds."
        );

        let exact = GenerationErrorKind::RateLimited {
            retry_after_ms: Some(3000),
        };
        assert_eq!(
            exact.message(),
            "Rate limit reached. Please try again in 3 seconds."
        );

        let tiny = GenerationErrorKind::RateLimited {
            retry_after_ms: Some(1),
        };
        assert_eq!(
            tiny.message(),
            "Rate limit reached. Please try again in 1 seconds."
        );
    }

    #[test]
    fn rate_limit_without_hint_uses_sixty_seconds() {
        let kind = GenerationErrorKind::from(&RunError::RateLimitExceeded { retry_after: None });
        assert_eq!(
            kind.message(),
            "Rate limit reached. Please try again in 60 seconds."
        );
        assert!(!kind.offers_upgrade());
    }

    #[test]
    fn zero_retry_hint_uses_sixty_seconds() {
        let kind = GenerationErrorKind::from(&RunError::RateLimitExceeded {
            retry_after: Some(Duration::ZERO),
        });
        assert_eq!(
            kind.message(),
            "Rate limit reached. Please try again in 60 seconds."
        );
    }

    #[test]
    fn everything_else_is_generic() {
        let errors = [
            RunError::NotSignedIn,
            RunError::EmptyOutput,
            RunError::Api {
                status: 500,
                message: "boom".into(),
            },
        ];
        for err in &errors {
            let kind = GenerationErrorKind::from(err);
            assert_eq!(kind, GenerationErrorKind::Other);
            assert_eq!(kind.message(), "Failed to generate image. Please try again.");
        }
    }

    #[test]
    fn error_display() {
        let err = RunError::Api {
            status: 404,
            message: "Not found".into(),
        };
        assert_eq!(err.to_string(), "API error: 404 - Not found");
    }
}
