use std::fmt;

use bytes::Bytes;
use http::{HeaderMap, StatusCode};
use serde::Serialize;
use thiserror::Error;

/// Request-time fault taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultKind {
    /// No route pattern matched the request path.
    NoRoute,
    /// A pre-dispatch hook short-circuited the request.
    Rejected,
    /// The upstream did not answer within the configured timeout.
    UpstreamTimeout,
    /// The upstream could not be reached.
    UpstreamUnreachable,
}

impl FaultKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FaultKind::NoRoute => "no_route",
            FaultKind::Rejected => "rejected",
            FaultKind::UpstreamTimeout => "upstream_timeout",
            FaultKind::UpstreamUnreachable => "upstream_unreachable",
        }
    }

    /// HTTP status the inbound adapter answers with for this fault.
    pub fn status_code(&self) -> StatusCode {
        match self {
            FaultKind::NoRoute => StatusCode::NOT_FOUND,
            FaultKind::Rejected => StatusCode::FORBIDDEN,
            FaultKind::UpstreamTimeout => StatusCode::GATEWAY_TIMEOUT,
            FaultKind::UpstreamUnreachable => StatusCode::BAD_GATEWAY,
        }
    }
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct Fault {
    pub kind: FaultKind,
    pub message: String,
}

impl Fault {
    pub fn new(kind: FaultKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn no_route(path: &str) -> Self {
        Self::new(FaultKind::NoRoute, format!("No route matches path '{path}'"))
    }

    pub fn rejected(hook: &str, reason: &str) -> Self {
        Self::new(
            FaultKind::Rejected,
            format!("Request rejected by hook '{hook}': {reason}"),
        )
    }
}

/// Buffered response received from an upstream.
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl UpstreamResponse {
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }
}

/// Result of a single dispatch.
#[derive(Debug, Clone)]
pub enum Outcome {
    Success(UpstreamResponse),
    Fault(Fault),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }

    pub fn fault(&self) -> Option<&Fault> {
        match self {
            Outcome::Fault(fault) => Some(fault),
            Outcome::Success(_) => None,
        }
    }

    pub fn fault_kind(&self) -> Option<FaultKind> {
        self.fault().map(|f| f.kind)
    }

    /// Short label for logs and metrics: `success` or the fault kind.
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Success(_) => "success",
            Outcome::Fault(fault) => fault.kind.as_str(),
        }
    }
}

impl From<Fault> for Outcome {
    fn from(fault: Fault) -> Self {
        Outcome::Fault(fault)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fault_status_mapping() {
        assert_eq!(FaultKind::NoRoute.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(FaultKind::Rejected.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(
            FaultKind::UpstreamTimeout.status_code(),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            FaultKind::UpstreamUnreachable.status_code(),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn test_outcome_labels() {
        let ok = Outcome::Success(UpstreamResponse::new(StatusCode::OK, "hi"));
        assert!(ok.is_success());
        assert_eq!(ok.label(), "success");

        let fault: Outcome = Fault::no_route("/nope").into();
        assert_eq!(fault.label(), "no_route");
        assert_eq!(fault.fault_kind(), Some(FaultKind::NoRoute));
        assert_eq!(
            fault.fault().unwrap().to_string(),
            "no_route: No route matches path '/nope'"
        );
    }
}
