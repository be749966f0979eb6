//! services/client/src/adapters/response.rs
//!
//! Shared helpers for building backend URLs and turning responses into port
//! results.

use egolay_core::ports::{PortError, PortResult};
use reqwest::{Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;

/// The error body shapes the auth and function endpoints return.
#[derive(Deserialize, Default)]
struct ErrorBody {
    msg: Option<String>,
    message: Option<String>,
    error_description: Option<String>,
    error: Option<String>,
}

impl ErrorBody {
    fn into_message(self) -> Option<String> {
        self.msg
            .or(self.message)
            .or(self.error_description)
            .or(self.error)
            .filter(|m| !m.trim().is_empty())
    }
}

/// Maps a non-success status and its body to a `PortError`.
pub(crate) fn status_error(status: StatusCode, body: &str) -> PortError {
    let message = serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(ErrorBody::into_message);

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => PortError::Unauthorized,
        StatusCode::NOT_FOUND => {
            PortError::NotFound(message.unwrap_or_else(|| "resource".to_string()))
        }
        s if s.is_client_error() => PortError::Rejected(
            message.unwrap_or_else(|| format!("Request rejected with status {}", s.as_u16())),
        ),
        s => PortError::Unexpected(format!(
            "backend responded with {}: {}",
            s.as_u16(),
            message.unwrap_or_else(|| body.to_string())
        )),
    }
}

/// Appends `segments` to `base`, percent-encoding each one.
///
/// Ids travel as single path segments, so a `/` or `?` inside one cannot
/// address another resource.
pub(crate) fn endpoint(base: &str, segments: &[&str]) -> PortResult<Url> {
    let mut url = Url::parse(base)
        .map_err(|e| PortError::Unexpected(format!("invalid backend URL '{}': {}", base, e)))?;
    url.path_segments_mut()
        .map_err(|_| PortError::Unexpected(format!("backend URL '{}' cannot take a path", base)))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// Maps a transport failure to a `PortError`.
pub(crate) fn transport_error(err: reqwest::Error) -> PortError {
    PortError::Unexpected(err.to_string())
}

/// Fails with a mapped `PortError` unless the response is a success.
pub(crate) async fn ensure_success(response: Response) -> PortResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(status_error(status, &body))
}

/// Checks the status and decodes the JSON body.
pub(crate) async fn read_json<T: DeserializeOwned>(response: Response) -> PortResult<T> {
    let response = ensure_success(response).await?;
    let body = response.text().await.map_err(transport_error)?;
    serde_json::from_str(&body)
        .map_err(|e| PortError::Unexpected(format!("malformed response body: {}", e)))
}
