//! # exam-acceptance
//!
//! Retrying REST client for acceptance tests against a staged system.
//!
//! Requests go through an [`HttpTransport`]; [`ReqwestTransport`] talks
//! HTTP with basic auth. [`RestClient::get_with_retry`] keeps polling while
//! the system answers 404 or cannot be reached, and reports the outcome as
//! a [`RestResult`] instead of failing early:
//!
//! ```no_run
//! # async fn probe() -> exam_acceptance::Result<()> {
//! use exam_acceptance::{AcceptanceConfig, RestClient, RestRequest};
//!
//! let config = AcceptanceConfig::default();
//! let client = RestClient::new(config.session, config.client)?;
//! client
//!     .get_with_retry(&RestRequest::new("/health"))
//!     .await
//!     .then()
//!     .status_code(200)?;
//! # Ok(())
//! # }
//! ```

#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod client;
pub mod config;
pub mod error;
pub mod request;
pub mod transport;

pub use client::{RestClient, RestResult};
pub use config::{AcceptanceConfig, ClientConfiguration, SessionSpec};
pub use error::{AcceptanceError, BoxError, Result};
pub use request::{RestRequest, RestResponse};
pub use reqwest::Method;
pub use transport::{HttpTransport, ReqwestTransport};
