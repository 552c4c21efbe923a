//! Retrying REST client.

use crate::config::{ClientConfiguration, SessionSpec};
use crate::error::{AcceptanceError, BoxError, Result};
use crate::request::{RestRequest, RestResponse};
use crate::transport::{HttpTransport, ReqwestTransport};
use reqwest::Method;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

/// Status treated as "not there yet" by [`RestClient::get_with_retry`].
const NOT_FOUND: u16 = 404;

/// Outcome of a request: the response if one was captured, the error
/// otherwise, and the attempts it took.
#[derive(Debug)]
#[must_use]
pub struct RestResult {
    response: Option<RestResponse>,
    error: Option<AcceptanceError>,
    attempts_used: u32,
}

impl RestResult {
    fn success(response: RestResponse, attempts_used: u32) -> Self {
        Self {
            response: Some(response),
            error: None,
            attempts_used,
        }
    }

    fn failure(error: Option<AcceptanceError>, attempts_used: u32) -> Self {
        Self {
            response: None,
            error,
            attempts_used,
        }
    }

    /// Fluent no-op separating the request from its assertions.
    pub const fn then(self) -> Self {
        self
    }

    /// Returns the captured response.
    #[must_use]
    pub const fn response(&self) -> Option<&RestResponse> {
        self.response.as_ref()
    }

    /// Returns the error, if no response was captured.
    #[must_use]
    pub const fn error(&self) -> Option<&AcceptanceError> {
        self.error.as_ref()
    }

    /// Returns the number of requests sent.
    #[must_use]
    pub const fn attempts_used(&self) -> u32 {
        self.attempts_used
    }

    /// Asserts the response status and returns the response.
    ///
    /// # Errors
    ///
    /// Returns the recorded error if no response was captured,
    /// [`AcceptanceError::NoResponse`] if there is neither, and
    /// [`AcceptanceError::UnexpectedStatus`] on a mismatch.
    pub fn status_code(self, expected: u16) -> Result<RestResponse> {
        match (self.response, self.error) {
            (Some(response), _) if response.status == expected => Ok(response),
            (Some(response), _) => Err(AcceptanceError::UnexpectedStatus {
                expected,
                actual: response.status,
            }),
            (None, Some(error)) => Err(error),
            (None, None) => Err(AcceptanceError::NoResponse),
        }
    }
}

/// REST client for acceptance tests against a staged system.
#[derive(Clone)]
pub struct RestClient {
    transport: Arc<dyn HttpTransport>,
    session: SessionSpec,
    cancel: CancellationToken,
}

impl RestClient {
    /// Creates a client over HTTP.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an invalid session, or a transport
    /// error if the HTTP client cannot be built.
    pub fn new(session: SessionSpec, credentials: ClientConfiguration) -> Result<Self> {
        session.validate()?;
        let transport = ReqwestTransport::new(&session, credentials)?;
        Ok(Self::with_transport(session, Arc::new(transport)))
    }

    /// Creates a client over any transport.
    #[must_use]
    pub fn with_transport(session: SessionSpec, transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            transport,
            session,
            cancel: CancellationToken::new(),
        }
    }

    /// Uses a cancellation token to interrupt retrying.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Returns the session.
    #[must_use]
    pub const fn session(&self) -> &SessionSpec {
        &self.session
    }

    /// Returns the token that interrupts retrying.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    async fn once(&self, method: Method, request: &RestRequest) -> RestResult {
        match self.transport.send(method, request).await {
            Ok(response) => RestResult::success(response, 1),
            Err(err) => RestResult::failure(Some(AcceptanceError::Transport(err)), 1),
        }
    }

    /// Sends a GET request once.
    pub async fn get(&self, request: &RestRequest) -> RestResult {
        self.once(Method::GET, request).await
    }

    /// Sends a POST request once.
    pub async fn post(&self, request: &RestRequest) -> RestResult {
        self.once(Method::POST, request).await
    }

    /// Sends a PUT request once.
    pub async fn put(&self, request: &RestRequest) -> RestResult {
        self.once(Method::PUT, request).await
    }

    /// Sends GET requests until one returns anything but 404.
    ///
    /// Makes at most `retries × 3` attempts with the session backoff in
    /// between. When the budget runs out without a response the result
    /// carries the last transport error, or no error if every attempt got a
    /// 404. Cancelling the client's token stops retrying with
    /// [`AcceptanceError::Interrupted`].
    #[instrument(skip(self, request), fields(path = %request.path))]
    pub async fn get_with_retry(&self, request: &RestRequest) -> RestResult {
        let budget = self.session.attempt_budget();
        let backoff = self.session.backoff();
        let mut last_error: Option<BoxError> = None;

        for attempt in 1..=budget {
            match self.transport.send(Method::GET, request).await {
                Ok(response) if response.status != NOT_FOUND => {
                    debug!(attempt, status = response.status, "response received");
                    return RestResult::success(response, attempt);
                }
                Ok(_) => debug!(attempt, "not found yet"),
                Err(err) => {
                    debug!(attempt, error = %err, "request failed");
                    last_error = Some(err);
                }
            }

            if attempt == budget {
                break;
            }
            tokio::select! {
                biased;
                () = self.cancel.cancelled() => {
                    debug!(attempt, "retry interrupted");
                    return RestResult::failure(Some(AcceptanceError::Interrupted), attempt);
                }
                () = tokio::time::sleep(backoff) => {}
            }
        }

        warn!(attempts = budget, "giving up");
        let error = last_error.map(|source| AcceptanceError::RetriesExhausted {
            attempts: budget,
            source,
        });
        RestResult::failure(error, budget)
    }
}
