//! reqwest-backed transport

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

use super::{Method, PodFetch, PodRequest, PodResponse};
use crate::error::{PodError, Result};

/// HTTP transport for a real Pod
///
/// Holds an optional bearer token. Without one it is the unauthenticated
/// transport used for public share links.
#[derive(Clone)]
pub struct HttpFetch {
    http_client: Client,
    access_token: Option<String>,
}

impl std::fmt::Debug for HttpFetch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpFetch")
            .field("authenticated", &self.access_token.is_some())
            .finish()
    }
}

impl HttpFetch {
    /// Transport that attaches `Authorization: Bearer <token>`
    pub fn with_token(access_token: impl Into<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            http_client: Self::build_client(timeout)?,
            access_token: Some(access_token.into()),
        })
    }

    /// Transport that sends no credential
    pub fn public(timeout: Duration) -> Result<Self> {
        Ok(Self {
            http_client: Self::build_client(timeout)?,
            access_token: None,
        })
    }

    /// Reuse an existing client (connection pool shared with the caller)
    pub fn from_client(http_client: Client, access_token: Option<String>) -> Self {
        Self {
            http_client,
            access_token,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.access_token.is_some()
    }

    fn build_client(timeout: Duration) -> Result<Client> {
        Ok(Client::builder().timeout(timeout).build()?)
    }
}

#[async_trait]
impl PodFetch for HttpFetch {
    async fn fetch(&self, request: PodRequest) -> Result<PodResponse> {
        let mut builder = self
            .http_client
            .request(request.method.clone(), &request.url);

        if let Some(token) = &self.access_token {
            builder = builder.header("Authorization", format!("Bearer {}", token));
        }
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        tracing::debug!(method = %request.method, url = %request.url, status = %status, "pod request");

        // HEAD responses carry no body
        let body = if request.method == Method::HEAD {
            String::new()
        } else {
            response
                .text()
                .await
                .map_err(|e| PodError::Network(format!("{} {}: {}", request.method, request.url, e)))?
        };

        Ok(PodResponse {
            status,
            headers,
            body,
        })
    }
}
