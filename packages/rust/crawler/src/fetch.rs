//! HTTP fetching with per-request timeouts and run-wide cancellation.
//!
//! A single [`Fetcher`] (and its pooled `reqwest::Client`) is shared by every
//! worker. It never retries; that is the caller's job.

use std::time::Duration;

use harvest_shared::{HarvestError, Result};
use reqwest::{Client, Response};
use tokio_util::sync::CancellationToken;
use tracing::debug;
use url::Url;

/// User-Agent string for harvest requests.
const USER_AGENT: &str = concat!("neurips-harvest/", env!("CARGO_PKG_VERSION"));

/// Redirects followed before a request is treated as failed.
const MAX_REDIRECTS: usize = 5;

/// Shared HTTP session used for pages and PDFs alike.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    timeout: Duration,
}

impl Fetcher {
    /// Create a fetcher whose requests each carry `timeout` as an absolute deadline.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .build()
            .map_err(|e| HarvestError::config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, timeout })
    }

    /// GET `url` and return the body as text.
    ///
    /// Transport errors, timeouts, and non-2xx statuses all become
    /// [`HarvestError::Fetch`].
    pub async fn fetch(&self, url: &Url, cancel: &CancellationToken) -> Result<String> {
        debug!(%url, "fetching page");

        let request = async {
            let response = self.send(url).await?;
            response
                .text()
                .await
                .map_err(|e| HarvestError::fetch(url.as_str(), format!("body read failed: {e}")))
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(HarvestError::Cancelled),
            result = request => result,
        }
    }

    /// GET `url` and hand back the response once headers arrive, for chunked reads.
    ///
    /// The request timeout keeps running while the caller drains the body.
    pub async fn open_stream(&self, url: &Url, cancel: &CancellationToken) -> Result<Response> {
        debug!(%url, "opening stream");

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(HarvestError::Cancelled),
            result = self.send(url) => result,
        }
    }

    async fn send(&self, url: &Url) -> Result<Response> {
        let response = self
            .client
            .get(url.as_str())
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| HarvestError::fetch(url.as_str(), describe(&e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(HarvestError::fetch(url.as_str(), format!("HTTP {status}")));
        }

        Ok(response)
    }
}

/// Render a reqwest error with its timeout/connect classification up front.
pub(crate) fn describe(err: &reqwest::Error) -> String {
    if err.is_timeout() {
        format!("timed out: {err}")
    } else if err.is_connect() {
        format!("connection failed: {err}")
    } else {
        err.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn url_for(server: &MockServer, p: &str) -> Url {
        Url::parse(&format!("{}{p}", server.uri())).unwrap()
    }

    #[tokio::test]
    async fn fetch_returns_body_on_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/paper"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<h4>Hello</h4>"))
            .mount(&server)
            .await;

        let fetcher = Fetcher::new(Duration::from_secs(5)).unwrap();
        let body = fetcher
            .fetch(&url_for(&server, "/paper"), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(body, "<h4>Hello</h4>");
    }

    #[tokio::test]
    async fn non_success_status_is_fetch_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let fetcher = Fetcher::new(Duration::from_secs(5)).unwrap();
        let err = fetcher
            .fetch(&url_for(&server, "/missing"), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, HarvestError::Fetch { .. }));
        assert!(err.to_string().contains("404"));
    }

    #[tokio::test]
    async fn slow_response_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/slow"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .mount(&server)
            .await;

        let fetcher = Fetcher::new(Duration::from_millis(100)).unwrap();
        let err = fetcher
            .fetch(&url_for(&server, "/slow"), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, HarvestError::Fetch { .. }));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn cancelled_token_short_circuits() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
            .mount(&server)
            .await;

        let fetcher = Fetcher::new(Duration::from_secs(30)).unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = fetcher
            .fetch(&url_for(&server, "/any"), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, HarvestError::Cancelled));
    }
}
