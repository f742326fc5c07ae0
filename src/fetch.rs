use crate::config::Config;
use crate::feed::{Channel, ParseError, parse_feed};
use reqwest::Client;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Errors that can occur while fetching a feed over HTTP.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Not an absolute http(s) URL
    #[error("invalid feed URL '{0}'")]
    InvalidUrl(String),
    /// Network-level error (DNS, connection, TLS, body read)
    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// Response with a non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    #[error("request timed out")]
    Timeout,
}

/// Outcome of fetching and parsing a feed in one go.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// Anything that can hand back the raw bytes behind a feed URL.
pub trait FeedSource {
    fn fetch(&self, url: &str) -> impl Future<Output = Result<Vec<u8>, FetchError>>;
}

/// Fetches feeds over HTTP with a fixed user agent.
///
/// Some feed hosts reject requests carrying a library's default user agent,
/// so the configured one (a browser-like `Mozilla/5.0` by default) is always sent.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(cfg: &Config) -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent(cfg.user_agent.as_str())
            .timeout(Duration::from_secs(cfg.request_timeout_secs))
            .build()?;

        Ok(HttpFetcher { client })
    }
}

fn classify(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        FetchError::Timeout
    } else {
        FetchError::Network(err)
    }
}

impl FeedSource for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let parsed = Url::parse(url).map_err(|_| FetchError::InvalidUrl(url.to_string()))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(FetchError::InvalidUrl(url.to_string()));
        }

        tracing::debug!(url, "fetching feed");
        let resp = self.client.get(parsed).send().await.map_err(classify)?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus(status.as_u16()));
        }

        let bytes = resp.bytes().await.map_err(classify)?;
        tracing::debug!(url, len = bytes.len(), "fetched feed");
        Ok(bytes.to_vec())
    }
}

/// Fetch and parse a feed.
pub async fn load_feed<S: FeedSource>(source: &S, url: &str) -> Result<Channel, FeedError> {
    let bytes = source.fetch(url).await?;
    Ok(parse_feed(&bytes)?)
}
