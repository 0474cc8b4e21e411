use std::time::Duration;

use bytes::Bytes;
use http::{header, HeaderValue};
use reqwest_middleware::ClientWithMiddleware;
use reqwest_tracing::TracingMiddleware;
use tracing::{instrument, warn};
use url::Url;

use crate::{Error, Result};

/// Additional attempts after the first failed range request.
const NUM_REQUEST_RETRIES: u32 = 8;

pub(crate) fn build_client(user_agent: &str) -> Result<ClientWithMiddleware> {
    let client = reqwest::ClientBuilder::new()
        .user_agent(user_agent)
        .build()?;
    Ok(reqwest_middleware::ClientBuilder::new(client)
        .with(TracingMiddleware::default())
        .build())
}

/// Issues single byte-range requests against one URL, retrying with
/// exponential backoff.
pub(crate) struct RangeFetcher {
    client: ClientWithMiddleware,
    url: Url,
    impose_request_failures: bool,
}

impl RangeFetcher {
    pub(crate) fn new(client: ClientWithMiddleware, url: Url, impose_request_failures: bool) -> Self {
        Self {
            client,
            url,
            impose_request_failures,
        }
    }

    /// Determine the total length of the remote object from a HEAD request.
    pub(crate) async fn head(&self) -> Result<u64> {
        let response = self
            .client
            .head(self.url.clone())
            .send()
            .await
            .map_err(Error::Head)?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::HeadStatus { status });
        }

        let value = response
            .headers()
            .get(header::CONTENT_LENGTH)
            .ok_or(Error::MissingContentLength)?;
        value
            .to_str()
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .ok_or_else(|| Error::InvalidContentLength {
                value: String::from_utf8_lossy(value.as_bytes()).into_owned(),
            })
    }

    /// Fetch bytes `[start, end]` (inclusive) of the remote object.
    ///
    /// Failed attempts are retried up to [`NUM_REQUEST_RETRIES`] times,
    /// sleeping `0.1 * 2^attempt` seconds in between. The error of the final
    /// attempt propagates.
    #[instrument(skip(self), fields(url = %self.url))]
    pub(crate) async fn fetch(&self, start: u64, end: u64) -> Result<Bytes> {
        let expected_size = (end - start + 1) as usize;
        let mut attempt = 0;
        loop {
            let url = if self.impose_request_failures && attempt == 0 {
                self.corrupted_url()
            } else {
                self.url.clone()
            };
            match self.fetch_once(url, start, end, expected_size).await {
                Ok(bytes) => return Ok(bytes),
                Err(err) if attempt < NUM_REQUEST_RETRIES => {
                    let delay = Duration::from_millis(100u64 << attempt);
                    warn!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "range request failed, retrying",
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn fetch_once(
        &self,
        url: Url,
        start: u64,
        end: u64,
        expected_size: usize,
    ) -> Result<Bytes> {
        let range = format!("bytes={start}-{end}");
        let response = self
            .client
            .get(url)
            .header(header::RANGE, HeaderValue::from_str(&range)?)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_else(|err| err.to_string());
            return Err(Error::RangeStatus { status, message });
        }

        let bytes = response.bytes().await?;
        if bytes.len() != expected_size {
            return Err(Error::RangeSize {
                expected_size,
                actual_size: bytes.len(),
            });
        }

        Ok(bytes)
    }

    // Testing hook: a request for this URL fails, exercising the retry path.
    fn corrupted_url(&self) -> Url {
        let mut url = self.url.clone();
        let path = format!("/_error_{}", self.url.path().trim_start_matches('/'));
        url.set_path(&path);
        url
    }
}
