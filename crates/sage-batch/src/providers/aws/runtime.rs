//! SageMaker Runtime client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, info};
use url::Url;

use super::http::{build_client, error_for_status, join_segments, parse_base};
use crate::error::Result;
use crate::providers::traits::InferenceRuntime;

/// Inference can take much longer than control-plane calls.
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// SageMaker Runtime client.
#[derive(Clone)]
pub struct SageMakerRuntime {
    /// HTTP client.
    client: Client,
    /// Service base URL.
    base: Url,
}

impl SageMakerRuntime {
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
}

#[async_trait]
impl InferenceRuntime for SageMakerRuntime {
    async fn invoke_endpoint(
        &self,
        name: &str,
        content_type: &str,
        body: String,
    ) -> Result<String> {
        let url = join_segments(&self.base, ["endpoints", name, "invocations"])?;
        debug!(url = %url, bytes = body.len(), "InvokeEndpoint");

        let response = self
            .client
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .header(reqwest::header::ACCEPT, content_type)
            .body(body)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(error_for_status(response, || name.to_string()).await);
        }

        let text = response.text().await?;
        info!(endpoint = %name, bytes = text.len(), "Endpoint responded");
        Ok(text)
    }
}
