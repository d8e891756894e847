use std::time::Duration;

use async_trait::async_trait;
use http::Uri;
use thiserror::Error;

use crate::core::{outcome::UpstreamResponse, request::RoutedRequest};

/// Error type for upstream transport operations
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum TransportError {
    /// Error when the upstream does not answer in time
    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    /// Error when connection to the upstream fails
    #[error("Connection error: {0}")]
    Connect(String),

    /// Error when the outgoing request cannot be built
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Error while exchanging data with a connected upstream
    #[error("I/O error: {0}")]
    Io(String),
}

/// Result type alias for transport operations
pub type TransportResult<T> = Result<T, TransportError>;

/// UpstreamTransport defines the port (interface) for forwarding requests to upstreams
#[async_trait]
pub trait UpstreamTransport: Send + Sync + 'static {
    /// Forward a request to an upstream
    ///
    /// # Arguments
    /// * `request` - The routed request (method, headers and body are forwarded)
    /// * `target` - Absolute upstream URI including the rewritten path and query
    /// * `timeout` - Upper bound for the whole exchange
    ///
    /// # Returns
    /// A future that resolves to the upstream's buffered response or an error
    async fn send(
        &self,
        request: &RoutedRequest,
        target: &Uri,
        timeout: Duration,
    ) -> TransportResult<UpstreamResponse>;
}
