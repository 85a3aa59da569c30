//! Async HTTP client wrapping reqwest.
//!
//! Two flavours: a plain JSON API client with a fixed user agent, and a
//! browser-like client that carries a private cookie jar so an anti-bot
//! clearance obtained during warm-up survives into later page fetches.
//! Both fall back to HTTP/1.1 on protocol errors (some CDNs reject HTTP/2).

use crate::error::{StatsError, StatsResult};
use reqwest::cookie::Jar;
use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;

/// Response from an HTTP GET request.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// Original requested URL.
    pub url: String,
    /// Final URL after redirects.
    pub final_url: String,
    /// HTTP status code.
    pub status: u16,
    /// Response body as text.
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_not_found(&self) -> bool {
        self.status == 404
    }
}

/// HTTP client used by the marketplace clients and the dependents scraper.
#[derive(Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    /// HTTP/1.1-only fallback client sharing the same headers and cookies.
    h1_client: reqwest::Client,
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient").finish_non_exhaustive()
    }
}

impl HttpClient {
    /// JSON API client sending `user_agent` and any `extra_headers` on every request.
    pub fn api(
        user_agent: &str,
        timeout: Duration,
        extra_headers: &[(&'static str, String)],
    ) -> StatsResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));
        for (name, value) in extra_headers {
            let value = HeaderValue::from_str(value)
                .map_err(|e| StatsError::Config(format!("invalid value for header {name}: {e}")))?;
            headers.insert(HeaderName::from_static(*name), value);
        }

        let build = |h1: bool| {
            let mut b = reqwest::Client::builder()
                .timeout(timeout)
                .redirect(reqwest::redirect::Policy::limited(5))
                .user_agent(user_agent)
                .default_headers(headers.clone());
            if h1 {
                b = b.http1_only();
            }
            b.build()
        };

        Ok(Self {
            client: build(false)?,
            h1_client: build(true)?,
        })
    }

    /// Browser-like client: Chrome headers, Google referrer, and a cookie jar
    /// owned by this client alone.
    pub fn browser(user_agent: &str, timeout: Duration) -> StatsResult<Self> {
        let jar = Arc::new(Jar::default());
        let headers = browser_headers();

        let build = |h1: bool| {
            let mut b = reqwest::Client::builder()
                .timeout(timeout)
                .redirect(reqwest::redirect::Policy::limited(5))
                .user_agent(user_agent)
                .default_headers(headers.clone())
                .cookie_provider(Arc::clone(&jar));
            if h1 {
                b = b.http1_only();
            }
            b.build()
        };

        Ok(Self {
            client: build(false)?,
            h1_client: build(true)?,
        })
    }

    /// Perform a single GET request. Non-2xx statuses are returned, not raised.
    pub async fn get(&self, url: &str, query: &[(&str, String)]) -> StatsResult<HttpResponse> {
        match self.get_inner(&self.client, url, query).await {
            Ok(resp) => Ok(resp),
            Err(e) => {
                let err_str = format!("{e:?}");
                if err_str.contains("http2")
                    || err_str.contains("protocol")
                    || err_str.contains("connection closed")
                {
                    tracing::debug!("retrying {url} over HTTP/1.1: {e}");
                    self.get_inner(&self.h1_client, url, query).await
                } else {
                    Err(e)
                }
            }
        }
    }

    /// GET and decode a JSON body, treating any non-2xx status as an error.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> StatsResult<T> {
        let resp = self.get(url, query).await?;
        if !resp.is_success() {
            return Err(StatsError::UnexpectedStatus {
                status: resp.status,
                url: resp.final_url,
            });
        }
        Ok(serde_json::from_str(&resp.body)?)
    }

    async fn get_inner(
        &self,
        client: &reqwest::Client,
        url: &str,
        query: &[(&str, String)],
    ) -> StatsResult<HttpResponse> {
        let r = client.get(url).query(query).send().await?;
        let status = r.status().as_u16();
        let final_url = r.url().to_string();
        let body = r.text().await?;

        Ok(HttpResponse {
            url: url.to_string(),
            final_url,
            status,
            body,
        })
    }
}

fn browser_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::ACCEPT,
        HeaderValue::from_static(
            "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8",
        ),
    );
    headers.insert(
        header::ACCEPT_LANGUAGE,
        HeaderValue::from_static("en-US,en;q=0.9"),
    );
    headers.insert(
        header::REFERER,
        HeaderValue::from_static("https://www.google.com/"),
    );
    headers.insert(
        header::UPGRADE_INSECURE_REQUESTS,
        HeaderValue::from_static("1"),
    );
    headers.insert(
        HeaderName::from_static("sec-ch-ua"),
        HeaderValue::from_static(
            "\"Not_A Brand\";v=\"8\", \"Chromium\";v=\"120\", \"Google Chrome\";v=\"120\"",
        ),
    );
    headers.insert(
        HeaderName::from_static("sec-ch-ua-mobile"),
        HeaderValue::from_static("?0"),
    );
    headers.insert(
        HeaderName::from_static("sec-ch-ua-platform"),
        HeaderValue::from_static("\"Windows\""),
    );
    headers
}
