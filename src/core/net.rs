// src/core/net.rs
//! Fetch collaborator: search term in, page body out.
//!
//! One attempt per call. Timeouts and HTTP errors are returned to the loop, which
//! skips the term for this cycle.

use async_trait::async_trait;
use reqwest::{Client, StatusCode, header};
use thiserror::Error;
use url::{Url, form_urlencoded};

use crate::config::consts::QUERY_PLACEHOLDER;
use crate::config::options::SiteOptions;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("timed out fetching {0}")]
    Timeout(String),
    #[error("HTTP {status} for {url}")]
    Http { status: StatusCode, url: String },
    #[error("network error for {url}: {message}")]
    Transport { url: String, message: String },
    #[error("invalid search url: {0}")]
    InvalidUrl(String),
    #[error("could not build HTTP client: {0}")]
    Client(String),
}

#[async_trait]
pub trait Fetcher: Send + Sync {
    /// The search-results page for one term.
    async fn fetch(&self, term: &str) -> Result<String, FetchError>;
}

/// `base_url + search_path` with `{query}` replaced by the form-encoded term
/// (spaces become `+`).
pub fn search_url(site: &SiteOptions, term: &str) -> Result<Url, FetchError> {
    let encoded: String = form_urlencoded::byte_serialize(term.as_bytes()).collect();
    let path = site.search_path.replace(QUERY_PLACEHOLDER, &encoded);
    let joined = format!("{}{}", site.base_url.trim_end_matches('/'), path);
    Url::parse(&joined).map_err(|e| FetchError::InvalidUrl(format!("{joined}: {e}")))
}

pub struct HttpFetcher {
    client: Client,
    site: SiteOptions,
}

impl HttpFetcher {
    pub fn new(site: &SiteOptions) -> Result<Self, FetchError> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
        );
        headers.insert(header::ACCEPT_LANGUAGE, header::HeaderValue::from_static("de-CH,de;q=0.9,en;q=0.5"));

        let client = Client::builder()
            .timeout(site.request_timeout())
            .user_agent(site.user_agent.clone())
            .default_headers(headers)
            .build()
            .map_err(|e| FetchError::Client(e.to_string()))?;
        Ok(Self { client, site: site.clone() })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, term: &str) -> Result<String, FetchError> {
        let url = search_url(&self.site, term)?;
        log::info!("  URL: {url}");

        let shown = url.to_string();
        let classify = |e: reqwest::Error| {
            if e.is_timeout() {
                FetchError::Timeout(shown.clone())
            } else {
                FetchError::Transport { url: shown.clone(), message: e.to_string() }
            }
        };

        let response = self.client.get(url).send().await.map_err(classify)?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Http { status, url: shown.clone() });
        }
        let body = response.text().await.map_err(classify)?;
        log::debug!("    {} bytes from {shown} ({status})", body.len());
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_term_is_plus_encoded() {
        let site = SiteOptions { base_url: "https://www.example.ch/".into(), ..SiteOptions::default() };
        let url = search_url(&site, "nike air max 42").unwrap();
        assert_eq!(url.as_str(), "https://www.example.ch/de/q?query=nike+air+max+42");
        let url = search_url(&site, "größe & co").unwrap();
        assert_eq!(url.as_str(), "https://www.example.ch/de/q?query=gr%C3%B6%C3%9Fe+%26+co");
    }

    #[test]
    fn broken_base_url_is_reported() {
        let site = SiteOptions { base_url: "not a url".into(), ..SiteOptions::default() };
        assert!(matches!(search_url(&site, "x"), Err(FetchError::InvalidUrl(_))));
    }
}
