//! Shared HTTP plumbing for the feed adapters

use reqwest::StatusCode;
use serde::de::DeserializeOwned;

use crate::error::{Result, SyncError};

/// Send a GET and decode the JSON body. Timeouts, connection failures, 5xx
/// and 429 come back as `TransientFetch`; anything unreadable as
/// `InvalidFeedData`.
pub(crate) async fn fetch_json<T: DeserializeOwned>(
    target: &str,
    req: reqwest::RequestBuilder,
) -> Result<T> {
    let resp = req.send().await.map_err(|e| transport_error(target, e))?;

    let status = resp.status();
    if is_transient_status(status) {
        return Err(SyncError::TransientFetch {
            target: target.to_string(),
            reason: format!("HTTP {status}"),
        });
    }
    if !status.is_success() {
        return Err(SyncError::InvalidFeedData(format!("{target}: HTTP {status}")));
    }

    let body = resp.text().await.map_err(|e| transport_error(target, e))?;
    serde_json::from_str(&body).map_err(|e| SyncError::InvalidFeedData(format!("{target}: {e}")))
}

pub(crate) fn transport_error(target: &str, err: reqwest::Error) -> SyncError {
    if err.is_timeout() || err.is_connect() || err.is_request() || err.is_body() {
        SyncError::TransientFetch {
            target: target.to_string(),
            reason: err.to_string(),
        }
    } else {
        SyncError::Http(err)
    }
}

pub(crate) fn is_transient_status(status: StatusCode) -> bool {
    status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
}
