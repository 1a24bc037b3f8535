//! Shared blocking HTTP plumbing for the backends.

use crate::audit::error::{SourceError, SourceResult};
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Longest response body excerpt kept in error messages.
const ERROR_BODY_LIMIT: usize = 300;

pub fn build_client() -> SourceResult<Client> {
    Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .user_agent(concat!("decay/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| SourceError::unavailable("http client", e))
}

/// Send a request and turn transport failures and error statuses into
/// [`SourceError`]s about `identifier`.
pub fn send(request: RequestBuilder, identifier: &str) -> SourceResult<Response> {
    let response = request
        .send()
        .map_err(|e| SourceError::unavailable(identifier, e))?;

    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::NOT_FOUND {
        return Err(SourceError::NotFound(identifier.to_string()));
    }

    let body = response.text().unwrap_or_default();
    Err(SourceError::unavailable(
        identifier,
        format!("HTTP {}: {}", status, excerpt(&body)),
    ))
}

pub fn send_json<T: DeserializeOwned>(request: RequestBuilder, identifier: &str) -> SourceResult<T> {
    send(request, identifier)?
        .json::<T>()
        .map_err(|e| SourceError::unexpected(identifier, e))
}

fn excerpt(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.len() <= ERROR_BODY_LIMIT {
        return trimmed.to_string();
    }
    let mut end = ERROR_BODY_LIMIT;
    while !trimmed.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &trimmed[..end])
}
