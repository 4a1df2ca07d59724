//! HTTP implementation of the core [`Transport`] against a real Deputy install.
//!
//! - Construct [`DeputyHttpClient`] from the resolved `deputy` config section
//!   (endpoint, access token, timeout).
//! - Every request carries `Authorization: OAuth <token>`, JSON content
//!   headers and `dp-meta-option: none` so responses stay plain.
//! - Redirects are never followed: the API answers 200 directly, and a 302
//!   almost always means the endpoint is wrong.

use std::time::Duration;

use async_trait::async_trait;
use deputy_bursary_core::contract::{Method, Transport};
use deputy_bursary_core::DeputyError;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE, LOCATION};
use reqwest::{redirect, StatusCode, Url};
use serde_json::Value;

pub const DP_META_OPTION: &str = "dp-meta-option";

pub struct DeputyHttpClient {
    http: reqwest::Client,
    endpoint: Url,
    timeout: Duration,
}

impl DeputyHttpClient {
    pub fn new(endpoint: &str, token: &str, timeout: Duration) -> Result<Self, DeputyError> {
        let endpoint = parse_endpoint(endpoint)?;

        let mut headers = HeaderMap::new();
        let auth = HeaderValue::from_str(&format!("OAuth {token}"))
            .map_err(|e| DeputyError::configuration(format!("access token is not a valid header value: {e}")))?;
        headers.insert(AUTHORIZATION, auth);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(DP_META_OPTION, HeaderValue::from_static("none"));

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .redirect(redirect::Policy::none())
            .timeout(timeout)
            .build()
            .map_err(|e| DeputyError::configuration(format!("could not build HTTP client: {e}")))?;

        tracing::info!(
            endpoint = %endpoint,
            token_set = !token.is_empty(),
            timeout_secs = timeout.as_secs(),
            "Initialised Deputy HTTP client"
        );
        Ok(Self {
            http,
            endpoint,
            timeout,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn url(&self, path: &str) -> Result<Url, DeputyError> {
        self.endpoint
            .join(path.trim_start_matches('/'))
            .map_err(|e| DeputyError::Transport {
                path: path.to_string(),
                detail: format!("invalid API path: {e}"),
            })
    }
}

/// Parse the configured endpoint, making sure relative joins keep its path.
pub fn parse_endpoint(endpoint: &str) -> Result<Url, DeputyError> {
    let mut url = Url::parse(endpoint)
        .map_err(|e| DeputyError::configuration(format!("invalid API endpoint {endpoint:?}: {e}")))?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

fn to_reqwest(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
        Method::Delete => reqwest::Method::DELETE,
    }
}

#[async_trait]
impl Transport for DeputyHttpClient {
    async fn request(&self, method: Method, path: &str, body: Option<Value>) -> Result<Value, DeputyError> {
        let url = self.url(path)?;
        tracing::debug!(%method, %url, "Sending API request");

        let mut request = self.http.request(to_reqwest(method), url.clone());
        if let Some(body) = &body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| {
            let detail = if e.is_timeout() {
                format!("timed out after {}s", self.timeout.as_secs())
            } else if e.is_connect() {
                format!("connection failed: {e}")
            } else {
                e.to_string()
            };
            tracing::error!(%method, path, error = %detail, "API request failed");
            DeputyError::Transport {
                path: path.to_string(),
                detail,
            }
        })?;

        let status = response.status();
        if status == StatusCode::FOUND {
            let location = response
                .headers()
                .get(LOCATION)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string();
            tracing::error!(path, %url, location, "API answered with a redirect");
            return Err(DeputyError::UnexpectedRedirect {
                path: path.to_string(),
                location,
            });
        }
        if status != StatusCode::OK {
            tracing::error!(path, status = status.as_u16(), "API returned an error status");
            return Err(DeputyError::Http {
                path: path.to_string(),
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or_default().to_string(),
            });
        }

        let text = response.text().await.map_err(|e| DeputyError::Transport {
            path: path.to_string(),
            detail: format!("reading response body: {e}"),
        })?;
        serde_json::from_str(&text).map_err(|e| {
            tracing::error!(path, error = %e, "API response is not JSON");
            DeputyError::ResponseParse {
                path: path.to_string(),
                detail: e.to_string(),
            }
        })
    }
}
