//! HTTP transport seam
//!
//! Everything the adapter does goes through `PodFetch`. The auth subsystem owns
//! the credential; this crate only sees a function from request to response.
//!
//! - `HttpFetch` - reqwest-backed, with or without a bearer token
//! - `MemoryPod` - in-process Solid server for tests and embedding

mod http;
mod memory;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
pub use reqwest::{Method, StatusCode};

use crate::error::{PodError, Result};

pub use http::HttpFetch;
pub use memory::{MemoryPod, MemoryPodClient};

pub const CONTENT_TYPE_JSON: &str = "application/json";
pub const CONTENT_TYPE_TURTLE: &str = "text/turtle";

/// A single request against the Pod
#[derive(Clone, Debug)]
pub struct PodRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

impl PodRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn head(url: impl Into<String>) -> Self {
        Self::new(Method::HEAD, url)
    }

    pub fn put(url: impl Into<String>) -> Self {
        Self::new(Method::PUT, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::POST, url)
    }

    pub fn delete(url: impl Into<String>) -> Self {
        Self::new(Method::DELETE, url)
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn body(mut self, content_type: &str, body: impl Into<String>) -> Self {
        self.headers
            .push(("Content-Type".to_string(), content_type.to_string()));
        self.body = Some(body.into());
        self
    }

    /// Case-insensitive header lookup
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Response from the Pod, body fully buffered
#[derive(Clone, Debug)]
pub struct PodResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

impl PodResponse {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: String::new(),
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            self.headers.append(name, value);
        }
        self
    }

    pub fn with_body(mut self, content_type: &str, body: impl Into<String>) -> Self {
        self = self.with_header("content-type", content_type);
        self.body = body.into();
        self
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn is_not_found(&self) -> bool {
        self.status == StatusCode::NOT_FOUND
    }

    /// 401 or 403
    pub fn is_denied(&self) -> bool {
        self.status == StatusCode::UNAUTHORIZED || self.status == StatusCode::FORBIDDEN
    }

    /// All values of a header, joined the way HTTP allows repeated headers to be
    pub fn header_values(&self, name: &str) -> Vec<String> {
        self.headers
            .get_all(name)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .map(|v| v.to_string())
            .collect()
    }

    /// Turn a non-success response into `PodError::Transport`
    pub fn error_for(self, method: &Method, url: &str) -> PodError {
        PodError::Transport {
            method: method.to_string(),
            url: url.to_string(),
            status: self.status.as_u16(),
            body: self.body,
        }
    }
}

/// Performs requests against a Pod
///
/// Implementations attach (or deliberately omit) credentials. They must only
/// fail for network-level problems; HTTP error statuses are returned as
/// responses so callers can tell a 404 from a 403.
#[async_trait]
pub trait PodFetch: Send + Sync {
    async fn fetch(&self, request: PodRequest) -> Result<PodResponse>;
}

#[async_trait]
impl<T: PodFetch + ?Sized> PodFetch for std::sync::Arc<T> {
    async fn fetch(&self, request: PodRequest) -> Result<PodResponse> {
        (**self).fetch(request).await
    }
}

/// Entries of an HTTP `Link` header: `(target, rel)` pairs
pub fn parse_link_header(values: &[String]) -> Vec<(String, String)> {
    let mut links = Vec::new();
    for value in values {
        for entry in value.split(',') {
            let entry = entry.trim();
            let Some(start) = entry.find('<') else {
                continue;
            };
            let Some(end) = entry[start..].find('>') else {
                continue;
            };
            let target = &entry[start + 1..start + end];
            for param in entry[start + end + 1..].split(';') {
                let param = param.trim();
                if let Some(rel) = param.strip_prefix("rel=") {
                    for rel in rel.trim_matches('"').split_whitespace() {
                        links.push((target.to_string(), rel.to_string()));
                    }
                }
            }
        }
    }
    links
}
