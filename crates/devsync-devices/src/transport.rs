//! HTTP transport seam.
//!
//! The engine only needs "send this request, give me status and body". The
//! [`HttpTransport`] trait is that seam; [`ReqwestTransport`] is the real
//! implementation, tests plug in scripted transports.

use async_trait::async_trait;

use crate::error::TransportError;

/// HTTP Basic credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicAuth {
    pub username: String,
    pub password: String,
    /// Send with the first request instead of waiting for a `401` challenge
    pub preemptive: bool,
}

/// One outbound call, fully rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: String,
    pub url: String,
    /// Empty means no body
    pub body: String,
    pub auth: Option<BasicAuth>,
}

impl HttpRequest {
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            body: String::new(),
            auth: None,
        }
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }
}

/// Status and body of a response, whatever the status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Sends HTTP requests.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

#[cfg(feature = "http")]
pub use self::reqwest_transport::ReqwestTransport;

#[cfg(feature = "http")]
mod reqwest_transport {
    use std::time::Duration;

    use reqwest::{Client, Method, StatusCode, Url};
    use tracing::debug;

    use super::*;

    /// [`HttpTransport`] backed by a shared reqwest client.
    #[derive(Debug, Clone)]
    pub struct ReqwestTransport {
        client: Client,
        timeout: Duration,
    }

    impl ReqwestTransport {
        pub fn new(timeout: Duration) -> Result<Self, TransportError> {
            let client = Client::builder()
                .timeout(timeout)
                .build()
                .map_err(|e| TransportError::Other(format!("HTTP client setup failed: {}", e)))?;
            Ok(Self { client, timeout })
        }

        async fn execute(
            &self,
            method: &Method,
            url: &Url,
            request: &HttpRequest,
            with_auth: bool,
        ) -> Result<reqwest::Response, TransportError> {
            let mut builder = self.client.request(method.clone(), url.clone());

            if !request.body.is_empty() {
                builder = builder.body(request.body.clone());
            }

            if with_auth {
                if let Some(auth) = &request.auth {
                    builder = builder.basic_auth(&auth.username, Some(&auth.password));
                }
            }

            builder.send().await.map_err(|e| self.map_error(e))
        }

        fn map_error(&self, e: reqwest::Error) -> TransportError {
            if e.is_timeout() {
                TransportError::Timeout(self.timeout.as_secs())
            } else if e.is_builder() {
                TransportError::InvalidRequest(e.to_string())
            } else if e.is_body() || e.is_decode() {
                TransportError::Body(e.to_string())
            } else {
                TransportError::Connection(e.to_string())
            }
        }
    }

    #[async_trait]
    impl HttpTransport for ReqwestTransport {
        async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
            let method = Method::from_bytes(request.method.trim().to_ascii_uppercase().as_bytes())
                .map_err(|_| {
                    TransportError::InvalidRequest(format!(
                        "Unsupported HTTP method: {}",
                        request.method
                    ))
                })?;
            let url = Url::parse(request.url.trim()).map_err(|e| {
                TransportError::InvalidRequest(format!("Invalid URL '{}': {}", request.url, e))
            })?;

            let preemptive = request.auth.as_ref().is_some_and(|auth| auth.preemptive);
            let mut response = self.execute(&method, &url, &request, preemptive).await?;

            if response.status() == StatusCode::UNAUTHORIZED && request.auth.is_some() && !preemptive
            {
                debug!("{} {} answered 401, retrying with credentials", method, url);
                response = self.execute(&method, &url, &request, true).await?;
            }

            let status = response.status().as_u16();
            let body = response
                .text()
                .await
                .map_err(|e| TransportError::Body(e.to_string()))?;

            Ok(HttpResponse { status, body })
        }
    }
}
