//! HTTP plumbing shared by the AWS clients.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use url::Url;

use crate::error::{Error, Result};

/// Build an HTTP client with a per-request timeout.
pub(super) fn build_client(timeout: Duration) -> Result<Client> {
    Client::builder().timeout(timeout).build().map_err(Error::Http)
}

/// Parse a service base URL.
pub(super) fn parse_base(base_url: &str) -> Result<Url> {
    Url::parse(base_url).map_err(|e| Error::Config(format!("invalid service URL {base_url}: {e}")))
}

/// Append path segments to a base URL, percent-encoding each one.
pub(super) fn join_segments<'a>(
    base: &Url,
    segments: impl IntoIterator<Item = &'a str>,
) -> Result<Url> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|()| Error::Config(format!("service URL cannot be a base: {base}")))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// Turn a non-success response into an error, keeping the body as the message.
pub(super) async fn error_for_status(
    response: reqwest::Response,
    not_found: impl FnOnce() -> String,
) -> Error {
    let status = response.status();
    let message = response.text().await.unwrap_or_default();

    if status == StatusCode::NOT_FOUND {
        Error::NotFound(not_found())
    } else {
        Error::Api {
            status: status.as_u16(),
            message,
        }
    }
}
