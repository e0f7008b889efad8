//! Service traits and common types for storage and model hosting.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

// ============================================================================
// Object storage types
// ============================================================================

/// A bucket/key pair addressing one object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectLocation {
    /// Bucket name.
    pub bucket: String,
    /// Object key within the bucket.
    pub key: String,
}

impl ObjectLocation {
    #[must_use]
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }
}

impl fmt::Display for ObjectLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.bucket, self.key)
    }
}

// ============================================================================
// Endpoint types
// ============================================================================

/// Endpoint status as reported by the control plane.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EndpointStatus {
    OutOfService,
    /// Endpoint is being created.
    Creating,
    /// Endpoint is being updated.
    Updating,
    SystemUpdating,
    RollingBack,
    /// Endpoint is serving requests.
    InService,
    /// Endpoint is being deleted.
    Deleting,
    /// Endpoint could not be brought up.
    Failed,
    /// Any status this crate does not know about.
    Unknown(String),
}

impl EndpointStatus {
    /// Whether polling should stop at this status.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::InService | Self::Failed)
    }
}

impl From<&str> for EndpointStatus {
    fn from(s: &str) -> Self {
        match s {
            "OutOfService" => Self::OutOfService,
            "Creating" => Self::Creating,
            "Updating" => Self::Updating,
            "SystemUpdating" => Self::SystemUpdating,
            "RollingBack" => Self::RollingBack,
            "InService" => Self::InService,
            "Deleting" => Self::Deleting,
            "Failed" => Self::Failed,
            other => Self::Unknown(other.to_string()),
        }
    }
}

impl fmt::Display for EndpointStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfService => write!(f, "OutOfService"),
            Self::Creating => write!(f, "Creating"),
            Self::Updating => write!(f, "Updating"),
            Self::SystemUpdating => write!(f, "SystemUpdating"),
            Self::RollingBack => write!(f, "RollingBack"),
            Self::InService => write!(f, "InService"),
            Self::Deleting => write!(f, "Deleting"),
            Self::Failed => write!(f, "Failed"),
            Self::Unknown(s) => write!(f, "{s}"),
        }
    }
}

/// Result of describing an endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointDescription {
    /// Endpoint name.
    pub name: String,
    /// Current status.
    pub status: EndpointStatus,
    /// Reason reported by the service when the endpoint failed.
    pub failure_reason: Option<String>,
}

/// Traffic and compute allocation for one model behind an endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductionVariant {
    /// Variant name.
    pub variant_name: String,
    /// Hosted model to serve.
    pub model_name: String,
    /// Number of instances to start with.
    pub initial_instance_count: u32,
    /// Instance type, e.g. `ml.t2.medium`.
    pub instance_type: String,
    /// Relative traffic weight.
    pub initial_variant_weight: f32,
}

// ============================================================================
// Service traits
// ============================================================================

/// Object storage holding input datasets and results.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Read an object as UTF-8 text.
    async fn get_object(&self, location: &ObjectLocation) -> Result<String>;

    /// Write an object, replacing any existing one.
    async fn put_object(&self, location: &ObjectLocation, body: String) -> Result<()>;
}

/// Management API for endpoints and endpoint configurations.
#[async_trait]
pub trait ControlPlane: Send + Sync {
    /// Create a named endpoint configuration.
    async fn create_endpoint_config(
        &self,
        name: &str,
        variants: &[ProductionVariant],
    ) -> Result<()>;

    /// Request creation of an endpoint from an existing configuration.
    async fn create_endpoint(&self, name: &str, config_name: &str) -> Result<()>;

    /// Get the current status of an endpoint.
    async fn describe_endpoint(&self, name: &str) -> Result<EndpointDescription>;

    /// Delete an endpoint.
    async fn delete_endpoint(&self, name: &str) -> Result<()>;

    /// Delete an endpoint configuration.
    async fn delete_endpoint_config(&self, name: &str) -> Result<()>;
}

/// Inference API of a running endpoint.
#[async_trait]
pub trait InferenceRuntime: Send + Sync {
    /// Send one request body to an endpoint and return the response body.
    async fn invoke_endpoint(&self, name: &str, content_type: &str, body: String)
        -> Result<String>;
}
