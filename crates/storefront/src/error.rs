//! Unified error handling with Sentry integration.
//!
//! Every store operation returns `Result<T, StoreError>`. Errors that are not
//! the user's doing (backend failures, storage failures) are captured to
//! Sentry before being surfaced; validation errors are not.

use thiserror::Error;

use arcade_core::{EmailError, ScoreError};

use crate::api::ApiError;
use crate::storage::StorageError;

/// Message shown when the backend cannot be reached at all.
pub const UNREACHABLE_MESSAGE: &str =
    "Cannot reach the server. Check your connection or whether the backend is running.";

/// Application-level error type for the storefront stores.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Backend call failed.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// Persisted session state could not be read or written.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Operation needs a signed-in identity.
    #[error("You need to sign in first")]
    NotAuthenticated,

    /// Input rejected before any remote call.
    #[error("{0}")]
    Validation(String),

    /// Malformed email address.
    #[error("Invalid email: {0}")]
    Email(#[from] EmailError),

    /// Rating score out of range.
    #[error("Invalid rating: {0}")]
    Score(#[from] ScoreError),

    /// Persisted session is missing, expired, or no longer known to the backend.
    #[error("Your session has expired, please sign in again")]
    SessionInvalid,
}

impl StoreError {
    /// Whether the error was caught locally, before any remote call.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::Validation(_) | Self::Email(_) | Self::Score(_) | Self::NotAuthenticated
        )
    }

    /// Log the error and capture it to Sentry unless it is a validation
    /// error the user can fix themselves.
    pub fn report(&self, operation: &str) {
        if self.is_validation() || matches!(self, Self::SessionInvalid) {
            tracing::debug!(operation, error = %self, "Operation rejected");
            return;
        }
        let event_id = sentry::capture_error(self);
        tracing::error!(
            operation,
            error = %self,
            sentry_event_id = %event_id,
            "Operation failed"
        );
    }
}

/// Result type alias for `StoreError`.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Turn an error into the text shown to the user.
///
/// Backend messages are passed through verbatim; an unreachable backend gets
/// a friendlier explanation; anything without a usable message falls back to
/// `fallback`.
#[must_use]
pub fn user_message(error: &StoreError, fallback: &str) -> String {
    let message = match error {
        StoreError::Api(api) => return api_user_message(api, fallback),
        other => other.to_string(),
    };
    if message.trim().is_empty() {
        fallback.to_string()
    } else {
        message
    }
}

fn api_user_message(error: &ApiError, fallback: &str) -> String {
    match error {
        ApiError::Unreachable(_) => UNREACHABLE_MESSAGE.to_string(),
        ApiError::Api { message, .. } if !message.trim().is_empty() => {
            if looks_unreachable(message) {
                UNREACHABLE_MESSAGE.to_string()
            } else {
                message.clone()
            }
        }
        _ => fallback.to_string(),
    }
}

/// Generic fetch-failure wording some proxies relay as a response body.
fn looks_unreachable(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("failed to fetch") || lower.contains("connection refused")
}

/// Set the Sentry user context from a user ID.
///
/// Called after a successful sign-in to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
///
/// Called on sign-out to stop associating errors with the user.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for user actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of user actions
/// leading up to an error.
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}
