//! HTTP(S) fetching (`remote` feature)

use super::ByteStream;
use crate::{PlayerError, Result};
use std::time::Duration;
use tracing::debug;

/// Time allowed for a whole download
const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Open a URL for reading. Non-success status codes are errors.
pub fn open_url(url: &str) -> Result<ByteStream> {
    let client = reqwest::blocking::Client::builder()
        .timeout(FETCH_TIMEOUT)
        .build()
        .map_err(|e| fetch_error(url, e))?;

    let response = client
        .get(url)
        .send()
        .and_then(|response| response.error_for_status())
        .map_err(|e| fetch_error(url, e))?;

    debug!(url, status = %response.status(), "Fetched remote file");
    Ok(Box::new(response))
}

fn fetch_error(url: &str, err: reqwest::Error) -> PlayerError {
    PlayerError::Io(std::io::Error::other(format!("Failed to fetch '{url}': {err}")))
}
