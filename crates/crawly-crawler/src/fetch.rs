use std::future::Future;
use std::time::Duration;

use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use reqwest::StatusCode;
use url::Url;

use crate::config::CrawlerConfig;
use crate::link;

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("Invalid URL {0}")]
    InvalidUrl(String),
    #[error("Couldn't download {url} got: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("Couldn't download {url} got status {status}")]
    Status { url: String, status: StatusCode },
}

/// A retrieved resource.
///
/// The body is kept as raw bytes, links are only parsed out of it on demand.
#[derive(Debug, Clone)]
pub struct Fetched {
    /// Final location after redirects.
    pub url: Url,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl Fetched {
    pub fn new(url: Url, content_type: Option<String>, body: impl Into<Vec<u8>>) -> Self {
        Self {
            url,
            content_type,
            body: body.into(),
        }
    }

    pub fn outbound_links(&self) -> Vec<String> {
        link::extract_links(&self.url, &self.body)
    }
}

/// Retrieves resources for the crawl and legal collection loops.
pub trait Fetcher {
    fn fetch(&self, url: &str) -> impl Future<Output = Result<Fetched, FetchError>>;
}

impl<T: Fetcher> Fetcher for &T {
    fn fetch(&self, url: &str) -> impl Future<Output = Result<Fetched, FetchError>> {
        (**self).fetch(url)
    }
}

/// Fetches `url`, retrying failed attempts `retries` times after `retry_delay`.
pub async fn fetch_with_retries<F>(
    fetcher: &F,
    url: &str,
    retries: usize,
    retry_delay: Duration,
) -> Result<Fetched, FetchError>
where
    F: Fetcher,
{
    let mut attempt = 0;
    loop {
        match fetcher.fetch(url).await {
            Ok(fetched) => return Ok(fetched),
            Err(e) if attempt < retries => {
                attempt += 1;
                log::debug!("Retrying {url} ({attempt}/{retries}) after: {e}");
                tokio::time::sleep(retry_delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}

/// [`Fetcher`] over HTTP(S) with the configured user agent and request timeout.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    user_agent: String,
}

impl HttpFetcher {
    pub fn new(config: &CrawlerConfig) -> anyhow::Result<Self> {
        let client = reqwest::ClientBuilder::new()
            .gzip(true)
            .deflate(true)
            .timeout(config.timeout())
            .build()?;
        Ok(Self {
            client,
            user_agent: config.user_agent.clone(),
        })
    }
}

impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Fetched, FetchError> {
        let parsed = Url::parse(url).map_err(|_| FetchError::InvalidUrl(url.to_string()))?;
        let transport = |source| FetchError::Transport {
            url: url.to_string(),
            source,
        };

        let resp = self
            .client
            .get(parsed)
            .header(USER_AGENT, &self.user_agent)
            .send()
            .await
            .map_err(transport)?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status,
            });
        }

        let final_url = resp.url().clone();
        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|c| c.to_str().ok())
            .map(String::from);
        let body = resp.bytes().await.map_err(transport)?;

        Ok(Fetched::new(final_url, content_type, body.to_vec()))
    }
}
