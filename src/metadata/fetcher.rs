use std::future::Future;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};

use crate::metadata::types::{FetchError, FetchOptions};

/// Source of page markup for the resolver
pub trait PageFetcher: Send + Sync {
    /// Fetch `url` and return the body as text. Exactly one attempt; any
    /// non-2xx status is an error.
    fn fetch(&self, url: &str) -> impl Future<Output = Result<String, FetchError>> + Send;
}

/// `reqwest`-backed fetcher carrying the bot user agent, the html `Accept`
/// header and a hard request timeout.
#[derive(Clone, Debug)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(opts: &FetchOptions) -> Result<Self, FetchError> {
        let mut headers = HeaderMap::new();
        let accept = HeaderValue::from_str(&opts.accept)
            .map_err(|e| FetchError::Network(format!("invalid accept header: {e}")))?;
        headers.insert(ACCEPT, accept);

        let client = reqwest::Client::builder()
            .user_agent(opts.user_agent.as_str())
            .default_headers(headers)
            .timeout(opts.timeout)
            .build()
            .map_err(|e| FetchError::Network(e.to_string()))?;

        Ok(Self { client })
    }
}

impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let parsed = reqwest::Url::parse(url).map_err(|e| FetchError::InvalidUrl(format!("{url}: {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(FetchError::InvalidUrl(format!("{url}: unsupported scheme")));
        }

        let iden = format!("{}{}", parsed.host_str().unwrap_or_default(), parsed.path());
        log::debug!("{iden}: requesting");

        let resp = self.client.get(parsed).send().await?;
        let status = resp.status();
        if !status.is_success() {
            log::debug!("{iden}: {status}");
            return Err(FetchError::Status(status.as_u16()));
        }

        resp.text().await.map_err(|err| {
            if err.is_timeout() {
                FetchError::Timeout
            } else {
                FetchError::Body(err.to_string())
            }
        })
    }
}
