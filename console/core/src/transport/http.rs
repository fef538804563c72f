//! Reqwest Transport
//!
//! [`HttpTransport`] over a `reqwest::Client`. The client has no request
//! timeout unless one is configured: an evaluation may legitimately run for
//! as long as the sandbox lets it.

use async_trait::async_trait;

use super::traits::{HttpMethod, HttpRequest, HttpResponse, HttpTransport, TransportError};
use crate::config::ServerConfig;

/// HTTP transport for a sandbox server reachable at a base URL
#[derive(Clone)]
pub struct ReqwestTransport {
    /// Base URL without a trailing slash
    base_url: String,
    /// HTTP client
    http_client: reqwest::Client,
}

impl ReqwestTransport {
    /// Create a transport from server configuration
    ///
    /// # Errors
    ///
    /// Returns `TransportError::ClientSetup` if the HTTP client cannot be built.
    pub fn new(config: &ServerConfig) -> Result<Self, TransportError> {
        let mut builder = reqwest::Client::builder().user_agent(config.user_agent.clone());
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        let http_client = builder
            .build()
            .map_err(|e| TransportError::ClientSetup(e.to_string()))?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            http_client,
        })
    }

    /// Base URL requests are issued against
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Full URL for a request
    fn url_for(&self, request: &HttpRequest) -> String {
        format!("{}{}", self.base_url, request.path_and_query())
    }
}

fn classify(err: &reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout(err.to_string())
    } else if err.is_connect() {
        TransportError::ConnectionFailed(err.to_string())
    } else {
        TransportError::SendFailed(err.to_string())
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    fn name(&self) -> &str {
        "reqwest"
    }

    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let url = self.url_for(&request);

        let mut builder = match request.method {
            HttpMethod::Get => self.http_client.get(&url),
            HttpMethod::Post => self.http_client.post(&url),
        };
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await.map_err(|e| classify(&e))?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout(e.to_string())
            } else {
                TransportError::ReceiveFailed(e.to_string())
            }
        })?;

        tracing::trace!(url = %url, status, bytes = body.len(), "Response received");

        Ok(HttpResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_is_normalized() {
        let config = ServerConfig {
            base_url: "http://example.com:8080/".to_string(),
            ..ServerConfig::default()
        };
        let transport = ReqwestTransport::new(&config).unwrap();
        assert_eq!(transport.base_url(), "http://example.com:8080");

        let request = HttpRequest::new(HttpMethod::Get, "/getLog").with_query("42");
        assert_eq!(
            transport.url_for(&request),
            "http://example.com:8080/getLog?42"
        );
    }
}
