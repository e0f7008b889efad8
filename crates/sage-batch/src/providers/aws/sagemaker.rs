//! SageMaker control-plane client.
//!
//! Speaks the AWS JSON 1.1 protocol: every operation is a `POST /` with the
//! operation named in the `X-Amz-Target` header.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, info, warn};
use url::Url;

use super::http::{build_client, parse_base};
use super::models::{
    AwsErrorBody, CreateEndpointConfigRequest, CreateEndpointConfigResponse,
    CreateEndpointRequest, CreateEndpointResponse, DeleteEndpointConfigRequest,
    DescribeEndpointResponse, EndpointNameRequest, ProductionVariantBody,
};
use crate::error::{Error, Result};
use crate::providers::traits::{ControlPlane, EndpointDescription, ProductionVariant};

/// Default timeout for API requests.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Target prefix for SageMaker operations.
const TARGET_PREFIX: &str = "SageMaker";

/// Content type of the JSON 1.1 protocol.
const JSON_CONTENT_TYPE: &str = "application/x-amz-json-1.1";

/// SageMaker control-plane client.
#[derive(Clone)]
pub struct SageMaker {
    /// HTTP client.
    client: Client,
    /// Service base URL.
    base: Url,
}

impl SageMaker {
    /// Create a client for the given service URL.
    ///
    /// # Errors
    /// Returns error if the URL is invalid or the HTTP client cannot be created.
    pub fn new(base_url: &str) -> Result<Self> {
        Ok(Self {
            client: build_client(Duration::from_secs(DEFAULT_TIMEOUT_SECS))?,
            base: parse_base(base_url)?,
        })
    }

    /// Execute one operation and return the raw response body.
    async fn call_raw(
        &self,
        operation: &str,
        body: &impl Serialize,
        resource: &str,
    ) -> Result<String> {
        debug!(operation, resource, "SageMaker request");

        let response = self
            .client
            .post(self.base.clone())
            .header("X-Amz-Target", format!("{TARGET_PREFIX}.{operation}"))
            .header(reqwest::header::CONTENT_TYPE, JSON_CONTENT_TYPE)
            .body(serde_json::to_vec(body)?)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if status.is_success() {
            return Ok(text);
        }

        let error: AwsErrorBody = serde_json::from_str(&text).unwrap_or_default();
        if error.is_not_found() {
            return Err(Error::NotFound(resource.to_string()));
        }

        warn!(
            operation,
            status = status.as_u16(),
            code = error.code(),
            "SageMaker request failed"
        );
        let message = if error.message.is_empty() {
            text
        } else {
            format!("{}: {}", error.code(), error.message)
        };
        Err(Error::Api {
            status: status.as_u16(),
            message,
        })
    }

    /// Execute one operation and decode its JSON response.
    async fn call<T: DeserializeOwned>(
        &self,
        operation: &str,
        body: &impl Serialize,
        resource: &str,
    ) -> Result<T> {
        let text = self.call_raw(operation, body, resource).await?;
        serde_json::from_str(&text).map_err(|e| {
            warn!(error = %e, body = %text, "Failed to parse response");
            Error::Serialization(e)
        })
    }
}

#[async_trait]
impl ControlPlane for SageMaker {
    async fn create_endpoint_config(
        &self,
        name: &str,
        variants: &[ProductionVariant],
    ) -> Result<()> {
        info!(config = %name, variants = variants.len(), "Creating endpoint configuration");

        let body = CreateEndpointConfigRequest {
            endpoint_config_name: name.to_string(),
            production_variants: variants.iter().map(ProductionVariantBody::from).collect(),
        };
        let response: CreateEndpointConfigResponse =
            self.call("CreateEndpointConfig", &body, name).await?;

        info!(arn = %response.endpoint_config_arn, "Endpoint configuration created");
        Ok(())
    }

    async fn create_endpoint(&self, name: &str, config_name: &str) -> Result<()> {
        info!(endpoint = %name, config = %config_name, "Creating endpoint");

        let body = CreateEndpointRequest {
            endpoint_name: name.to_string(),
            endpoint_config_name: config_name.to_string(),
        };
        let response: CreateEndpointResponse = self.call("CreateEndpoint", &body, name).await?;

        info!(arn = %response.endpoint_arn, "Endpoint creation requested");
        Ok(())
    }

    async fn describe_endpoint(&self, name: &str) -> Result<EndpointDescription> {
        let body = EndpointNameRequest {
            endpoint_name: name.to_string(),
        };
        let response: DescribeEndpointResponse =
            self.call("DescribeEndpoint", &body, name).await?;

        debug!(
            endpoint = %response.endpoint_name,
            status = %response.endpoint_status,
            config = ?response.endpoint_config_name,
            "Described endpoint"
        );

        Ok(EndpointDescription {
            name: response.endpoint_name,
            status: response.endpoint_status.as_str().into(),
            failure_reason: response.failure_reason,
        })
    }

    async fn delete_endpoint(&self, name: &str) -> Result<()> {
        info!(endpoint = %name, "Deleting endpoint");

        let body = EndpointNameRequest {
            endpoint_name: name.to_string(),
        };
        self.call_raw("DeleteEndpoint", &body, name).await?;
        Ok(())
    }

    async fn delete_endpoint_config(&self, name: &str) -> Result<()> {
        info!(config = %name, "Deleting endpoint configuration");

        let body = DeleteEndpointConfigRequest {
            endpoint_config_name: name.to_string(),
        };
        self.call_raw("DeleteEndpointConfig", &body, name).await?;
        Ok(())
    }
}
