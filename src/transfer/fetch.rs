//! Transport collaborator: ranged and plain HTTP fetches

use crate::config::TransferConfig;
use crate::error::{Error, Result};
use crate::types::TransferOutcome;
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::StatusCode;
use reqwest::header::{
    ACCEPT_ENCODING, CACHE_CONTROL, CONTENT_RANGE, CONTENT_TYPE, HeaderMap, RANGE,
};
use url::Url;

/// Answer to one ranged request
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RangeResponse {
    /// Offset of the first body byte within the resource
    ///
    /// `0` when the server ignored the range and sent the whole resource.
    pub start: u64,
    /// Body bytes of this response
    pub body: Bytes,
    /// Declared content type, if any
    pub content_type: Option<String>,
    /// Full length of the resource, if the response declares it
    pub total_length: Option<u64>,
}

/// Abstraction over the network, enabling testability
#[async_trait]
pub trait RangeFetcher: Send + Sync {
    /// Request the resource from `offset` onward
    ///
    /// One call is one attempt; retrying is up to the caller.
    async fn fetch_range(&self, url: &Url, offset: u64) -> Result<RangeResponse>;

    /// Fetch a small resource (artwork, JSON) in one go
    async fn fetch(&self, url: &Url) -> Result<TransferOutcome>;
}

/// Production [`RangeFetcher`] backed by a shared `reqwest` client
#[derive(Clone, Debug)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Build the HTTP client from the transfer settings
    pub fn new(config: &TransferConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(config.user_agent.as_str())
            .build()?;
        Ok(Self { client })
    }

    /// Wrap an existing client
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn get(&self, url: &Url, offset: Option<u64>) -> Result<reqwest::Response> {
        let mut request = self
            .client
            .get(url.clone())
            .header(ACCEPT_ENCODING, "identity")
            .header(CACHE_CONTROL, "no-cache");
        if let Some(offset) = offset {
            request = request.header(RANGE, format!("bytes={offset}-"));
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Http {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl RangeFetcher for HttpFetcher {
    async fn fetch_range(&self, url: &Url, offset: u64) -> Result<RangeResponse> {
        let response = self.get(url, Some(offset)).await?;
        let status = response.status();
        let content_type = content_type(response.headers());
        let content_range = response
            .headers()
            .get(CONTENT_RANGE)
            .and_then(|value| value.to_str().ok())
            .and_then(parse_content_range);
        let content_length = response.content_length();

        let (start, total_length) = match (status, content_range) {
            (StatusCode::PARTIAL_CONTENT, Some(range)) => (range.start, range.total),
            (StatusCode::PARTIAL_CONTENT, None) => {
                (offset, content_length.map(|len| offset + len))
            }
            // Range ignored: the body is the whole resource
            _ => (0, content_length),
        };

        let body = response.bytes().await?;

        tracing::trace!(
            url = %url,
            offset,
            start,
            received = body.len(),
            total = ?total_length,
            "range response"
        );

        Ok(RangeResponse {
            start,
            body,
            content_type,
            total_length,
        })
    }

    async fn fetch(&self, url: &Url) -> Result<TransferOutcome> {
        let response = self.get(url, None).await?;
        let content_type = content_type(response.headers());
        let body = response.bytes().await?;
        Ok(TransferOutcome::new(content_type, body))
    }
}

fn content_type(headers: &HeaderMap) -> Option<String> {
    headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

/// Parsed `Content-Range: bytes <first>-<last>/<total>` header
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct ContentRange {
    pub(crate) start: u64,
    pub(crate) total: Option<u64>,
}

/// Parse a `Content-Range` value; `*` as total means unknown length
pub(crate) fn parse_content_range(value: &str) -> Option<ContentRange> {
    let rest = value.trim().strip_prefix("bytes")?.trim_start();
    let (range, total) = rest.split_once('/')?;
    let (first, _last) = range.split_once('-')?;
    let start = first.trim().parse().ok()?;
    let total = match total.trim() {
        "*" => None,
        n => Some(n.parse().ok()?),
    };
    Some(ContentRange { start, total })
}
