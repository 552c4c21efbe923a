//! HTTP transports.

use crate::config::{ClientConfiguration, SessionSpec};
use crate::error::{AcceptanceError, BoxError, Result};
use crate::request::{RestRequest, RestResponse};
use async_trait::async_trait;
use reqwest::{Client, Method};
use std::time::Duration;
use tracing::trace;

/// Default request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Sends one request and captures the response.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Sends a request.
    async fn send(
        &self,
        method: Method,
        request: &RestRequest,
    ) -> std::result::Result<RestResponse, BoxError>;
}

/// Transport backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
    base_url: String,
    credentials: ClientConfiguration,
}

impl ReqwestTransport {
    /// Creates a transport for a session.
    ///
    /// # Errors
    ///
    /// Returns a transport error if the HTTP client cannot be built.
    pub fn new(session: &SessionSpec, credentials: ClientConfiguration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("exam-acceptance/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .map_err(|e| AcceptanceError::Transport(e.into()))?;

        Ok(Self {
            client,
            base_url: session.base_url(),
            credentials,
        })
    }

    /// Returns the base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(
        &self,
        method: Method,
        request: &RestRequest,
    ) -> std::result::Result<RestResponse, BoxError> {
        let url = format!("{}{}", self.base_url, request.path);
        trace!(%method, %url, "sending request");

        let mut builder = self.client.request(method, &url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(user) = &self.credentials.user {
            builder = builder.basic_auth(user, self.credentials.password.as_ref());
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.to_string(), value.to_string()))
            })
            .collect();
        let body = response.text().await?;

        Ok(RestResponse {
            status,
            headers,
            body,
        })
    }
}
