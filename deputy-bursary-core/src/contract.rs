#![allow(unused)]

//! # contract: the seams between the core and the outside world
//!
//! The core never opens sockets itself. Everything it needs from the Deputy
//! API goes through one capability, [`Transport`]: issue one request, get back
//! parsed JSON or a typed [`DeputyError`]. Authentication, headers, timeouts
//! and JSON marshalling are the implementor's concern.
//!
//! ## Mocking & Testing
//! - The trait is annotated for `mockall` so consumers can script exact call
//!   sequences (`MockTransport`) in unit and integration tests.
//! - The mock is exported when the `test-export-mocks` feature is on (default).

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use mockall::{automock, predicate::*};
use serde_json::Value;

use crate::error::DeputyError;

/// HTTP verbs used against the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Issues exactly one request against the API.
///
/// `path` is relative to the configured API endpoint, e.g.
/// `resource/Employee/QUERY`. Implementations must fail with
/// [`DeputyError::UnexpectedRedirect`] on 302, [`DeputyError::Http`] on any
/// other non-200 status, [`DeputyError::ResponseParse`] when the body is not
/// JSON, and [`DeputyError::Transport`] for socket level failures.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Value, DeputyError>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Value, DeputyError> {
        (**self).request(method, path, body).await
    }
}

/// Reported at the start of every page and once more with the final total.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchProgress {
    pub resource: String,
    /// Page offset while fetching, record count once finished.
    pub position: usize,
    pub finished: bool,
}

/// Observational progress hook; has no effect on what is fetched.
pub type ProgressFn = Arc<dyn Fn(&FetchProgress) + Send + Sync>;
