//! Error types for the batch inference workflow.

use thiserror::Error;

/// Errors that can occur while running a batch inference job.
#[derive(Error, Debug)]
pub enum Error {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// A remote service returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Remote resource (object, endpoint, endpoint config) not found.
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Dataset could not be parsed or serialized.
    #[error("Dataset error: {0}")]
    Dataset(String),

    /// A column the workflow expects is absent from the dataset.
    #[error("Column not found in dataset: {0}")]
    MissingColumn(String),

    /// Endpoint configuration or endpoint creation was rejected.
    #[error("Failed to provision endpoint {endpoint}: {source}")]
    Provisioning {
        endpoint: String,
        #[source]
        source: Box<Error>,
    },

    /// Endpoint reached the `Failed` state.
    #[error("Endpoint {endpoint} failed: {reason}")]
    EndpointFailed { endpoint: String, reason: String },

    /// Endpoint did not reach a terminal state before the deadline.
    #[error("Endpoint {endpoint} not ready after {secs} seconds")]
    ReadinessTimeout { endpoint: String, secs: u64 },

    /// The run was cancelled.
    #[error("Operation cancelled")]
    Cancelled,

    /// The endpoint returned a different number of predictions than rows sent.
    #[error("Expected {expected} predictions, endpoint returned {actual}")]
    PredictionCountMismatch { expected: usize, actual: usize },

    /// Deleting the endpoint or its configuration failed.
    #[error("Failed to delete endpoint {endpoint}: {source}")]
    Cleanup {
        endpoint: String,
        #[source]
        source: Box<Error>,
    },
}

impl From<csv::Error> for Error {
    fn from(err: csv::Error) -> Self {
        Self::Dataset(err.to_string())
    }
}

impl Error {
    /// Whether this error means the remote resource does not exist.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Result alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;
