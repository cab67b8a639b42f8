//! HTTP access for remote session data.

mod basic;
mod client;

pub use basic::BasicClient;
pub use client::HttpClient;

use anyhow::{Result, anyhow};
use reqwest::StatusCode;

/// GETs `url` and returns the body. Any non-success status is an error.
pub async fn fetch_bytes<C: HttpClient + ?Sized>(client: &C, url: &str) -> Result<Vec<u8>> {
    fetch_optional_bytes(client, url)
        .await?
        .ok_or_else(|| anyhow!("{url} returned 404 Not Found"))
}

/// Like [`fetch_bytes`] but maps `404 Not Found` to `Ok(None)`.
pub async fn fetch_optional_bytes<C: HttpClient + ?Sized>(
    client: &C,
    url: &str,
) -> Result<Option<Vec<u8>>> {
    let req = reqwest::Request::new(reqwest::Method::GET, url.parse()?);

    let resp = client.execute(req).await?;
    if resp.status() == StatusCode::NOT_FOUND {
        return Ok(None);
    }
    let resp = resp.error_for_status()?;
    Ok(Some(resp.bytes().await?.to_vec()))
}
