//! S3 object storage client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, info};
use url::Url;

use super::http::{build_client, error_for_status, join_segments, parse_base};
use crate::error::{Error, Result};
use crate::providers::traits::{ObjectLocation, ObjectStore};

/// Default timeout for object requests.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// S3 client using path-style addressing (`{base}/{bucket}/{key}`).
#[derive(Clone)]
pub struct S3 {
    /// HTTP client.
    client: Client,
    /// Service base URL.
    base: Url,
}

impl S3 {
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

    fn object_url(&self, location: &ObjectLocation) -> Result<Url> {
        join_segments(
            &self.base,
            std::iter::once(location.bucket.as_str()).chain(location.key.split('/')),
        )
    }
}

#[async_trait]
impl ObjectStore for S3 {
    async fn get_object(&self, location: &ObjectLocation) -> Result<String> {
        let url = self.object_url(location)?;
        debug!(url = %url, "S3 GetObject");

        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(error_for_status(response, || location.to_string()).await);
        }

        let bytes = response.bytes().await?;
        let text = String::from_utf8(bytes.to_vec())
            .map_err(|e| Error::Dataset(format!("{location} is not UTF-8: {e}")))?;

        info!(location = %location, bytes = text.len(), "Fetched object");
        Ok(text)
    }

    async fn put_object(&self, location: &ObjectLocation, body: String) -> Result<()> {
        let url = self.object_url(location)?;
        debug!(url = %url, bytes = body.len(), "S3 PutObject");

        let response = self
            .client
            .put(url)
            .header(reqwest::header::CONTENT_TYPE, "text/csv")
            .body(body)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(error_for_status(response, || location.to_string()).await);
        }

        info!(location = %location, "Stored object");
        Ok(())
    }
}
