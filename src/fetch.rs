//! Retrieval collaborator: the only part of the engine that performs I/O.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::config::Settings;
use crate::error::RetrievalError;

/// Raw document as returned by a fetch.
#[derive(Debug, Clone)]
pub struct Page {
    pub url: String,
    pub status: u16,
    pub body: String,
}

impl Page {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[async_trait]
pub trait Fetcher: Send + Sync {
    /// GET `url` with optional query parameters.
    async fn fetch(&self, url: &str, params: &[(&str, &str)]) -> Result<Page, RetrievalError>;

    /// Lightweight existence check.
    async fn probe_exists(&self, url: &str) -> bool;
}

/// Fetch and reject any non-2xx status.
pub async fn fetch_ok(
    fetcher: &dyn Fetcher,
    url: &str,
    params: &[(&str, &str)],
) -> Result<Page, RetrievalError> {
    let page = fetcher.fetch(url, params).await?;
    if !page.is_success() {
        return Err(RetrievalError::Status {
            url: page.url,
            status: page.status,
        });
    }
    Ok(page)
}

/// reqwest-backed fetcher with a bounded per-call timeout.
#[derive(Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    timeout_secs: u64,
}

impl HttpFetcher {
    pub fn new(settings: &Settings) -> Result<Self, RetrievalError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .redirect(reqwest::redirect::Policy::limited(5))
            .user_agent(&settings.user_agent)
            .build()
            .map_err(|e| RetrievalError::Transport(e.to_string()))?;
        Ok(HttpFetcher {
            client,
            timeout_secs: settings.timeout_secs,
        })
    }

    fn classify(&self, url: &str, err: reqwest::Error) -> RetrievalError {
        if err.is_timeout() {
            RetrievalError::Timeout {
                url: url.to_string(),
                secs: self.timeout_secs,
            }
        } else {
            err.into()
        }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str, params: &[(&str, &str)]) -> Result<Page, RetrievalError> {
        debug!("GET {} {:?}", url, params);
        let response = self
            .client
            .get(url)
            .query(params)
            .send()
            .await
            .map_err(|e| self.classify(url, e))?;

        let status = response.status().as_u16();
        let final_url = response.url().to_string();
        let body = response.text().await.map_err(|e| self.classify(url, e))?;

        Ok(Page {
            url: final_url,
            status,
            body,
        })
    }

    async fn probe_exists(&self, url: &str) -> bool {
        match self.client.head(url).send().await {
            Ok(r) => r.status().as_u16() == 200,
            Err(e) => {
                debug!("HEAD {} failed: {}", url, e);
                false
            }
        }
    }
}
