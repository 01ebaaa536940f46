//! Shared error types for the services crate.

use thiserror::Error;

use assess_core::model::{CatalogError, ValidationError};
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Errors emitted by the remote assessment service client.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ApiError {
    /// Transport failure: the service could not be reached or the request timed out.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    /// The service answered, but with a non-success status code.
    #[error("service returned code {code}: {message}")]
    Application { code: i64, message: String },
    #[error("service response is missing its data payload")]
    MissingData,
    #[error("malformed service response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("invalid endpoint url: {0}")]
    Endpoint(#[from] url::ParseError),
}

impl ApiError {
    #[must_use]
    pub fn is_network(&self) -> bool {
        matches!(self, ApiError::Network(_))
    }

    /// Short message suitable for showing to the respondent.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Network(_) => {
                "Could not reach the assessment service. Check your network connection and try again."
                    .to_owned()
            }
            ApiError::Application { message, .. } if !message.trim().is_empty() => message.clone(),
            ApiError::Application { code, .. } => format!("The service rejected the request (code {code})."),
            other => other.to_string(),
        }
    }
}

/// Errors emitted while reading or writing typed entries in the client store.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PersistenceError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("failed to encode stored value: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Errors emitted by `CatalogLoader`. Any of them halts session start.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CatalogLoadError {
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

/// Errors emitted by `SessionController`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SessionError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

/// Errors emitted while reading configuration.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
    #[error("invalid api base url: {0}")]
    BaseUrl(#[from] url::ParseError),
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
    #[error(transparent)]
    Api(#[from] ApiError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn application_errors_surface_the_server_message() {
        let err = ApiError::Application {
            code: 400,
            message: "answers incomplete".into(),
        };
        assert_eq!(err.user_message(), "answers incomplete");

        let blank = ApiError::Application {
            code: 500,
            message: String::new(),
        };
        assert!(blank.user_message().contains("500"));
        assert!(!blank.is_network());
    }
}
