//! SageMaker API request and response models.

use serde::{Deserialize, Serialize};

use crate::providers::traits::ProductionVariant;

// ============================================================================
// Endpoint configuration
// ============================================================================

/// Production variant as sent on the wire.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ProductionVariantBody {
    pub variant_name: String,
    pub model_name: String,
    pub initial_instance_count: u32,
    pub instance_type: String,
    pub initial_variant_weight: f32,
}

impl From<&ProductionVariant> for ProductionVariantBody {
    fn from(v: &ProductionVariant) -> Self {
        Self {
            variant_name: v.variant_name.clone(),
            model_name: v.model_name.clone(),
            initial_instance_count: v.initial_instance_count,
            instance_type: v.instance_type.clone(),
            initial_variant_weight: v.initial_variant_weight,
        }
    }
}

/// `CreateEndpointConfig` request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateEndpointConfigRequest {
    pub endpoint_config_name: String,
    pub production_variants: Vec<ProductionVariantBody>,
}

/// `CreateEndpointConfig` response.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateEndpointConfigResponse {
    pub endpoint_config_arn: String,
}

/// `DeleteEndpointConfig` request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DeleteEndpointConfigRequest {
    pub endpoint_config_name: String,
}

// ============================================================================
// Endpoint
// ============================================================================

/// `CreateEndpoint` request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateEndpointRequest {
    pub endpoint_name: String,
    pub endpoint_config_name: String,
}

/// `CreateEndpoint` response.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateEndpointResponse {
    pub endpoint_arn: String,
}

/// Request body for operations addressed by endpoint name only
/// (`DescribeEndpoint`, `DeleteEndpoint`).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct EndpointNameRequest {
    pub endpoint_name: String,
}

/// `DescribeEndpoint` response. Only the fields the workflow reads.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DescribeEndpointResponse {
    pub endpoint_name: String,
    pub endpoint_status: String,
    #[serde(default)]
    pub failure_reason: Option<String>,
    #[serde(default)]
    pub endpoint_config_name: Option<String>,
}

// ============================================================================
// Errors
// ============================================================================

/// Error body returned by JSON-protocol AWS services.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AwsErrorBody {
    /// Error type, optionally prefixed with a namespace and `#`.
    #[serde(rename = "__type", default)]
    pub error_type: String,
    #[serde(alias = "Message", default)]
    pub message: String,
}

impl AwsErrorBody {
    /// Error type without its namespace prefix.
    #[must_use]
    pub fn code(&self) -> &str {
        self.error_type
            .rsplit_once('#')
            .map_or(self.error_type.as_str(), |(_, code)| code)
    }

    /// Whether the error reports a missing endpoint or endpoint configuration.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.code() == "ResourceNotFound"
            || (self.code() == "ValidationException" && self.message.contains("Could not find"))
    }
}
