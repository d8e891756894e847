//! Structured logging around each dispatch.
use crate::{
    core::{outcome::Outcome, request::RoutedRequest},
    ports::hooks::{DispatchHook, HookDecision, HookError},
};

/// Logs the start of every dispatch and how it ended.
///
/// Successful dispatches are logged at `info`, faults at `warn`.
#[derive(Debug, Default, Clone)]
pub struct LoggingHook;

impl LoggingHook {
    pub fn new() -> Self {
        Self
    }
}

impl DispatchHook for LoggingHook {
    fn name(&self) -> &str {
        "logging"
    }

    fn before_dispatch(&self, request: &RoutedRequest) -> Result<HookDecision, HookError> {
        tracing::info!(
            request.id = %request.id(),
            http.method = %request.method(),
            http.path = request.path(),
            "Dispatching request"
        );
        Ok(HookDecision::Continue)
    }

    fn after_dispatch(&self, request: &RoutedRequest, outcome: &Outcome) -> Result<(), HookError> {
        match outcome {
            Outcome::Success(response) => tracing::info!(
                request.id = %request.id(),
                http.status_code = response.status.as_u16(),
                "Request completed"
            ),
            Outcome::Fault(fault) => tracing::warn!(
                request.id = %request.id(),
                fault = %fault.kind,
                "Request failed: {}",
                fault.message
            ),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use http::{Method, StatusCode};

    use super::*;
    use crate::core::outcome::{Fault, UpstreamResponse};

    #[test]
    fn test_logging_hook_never_rejects_or_fails() {
        let hook = LoggingHook::new();
        let request = RoutedRequest::new(Method::GET, &"/a".parse().unwrap());

        assert_eq!(hook.before_dispatch(&request).unwrap(), HookDecision::Continue);
        let ok = Outcome::Success(UpstreamResponse::new(StatusCode::OK, ""));
        assert!(hook.after_dispatch(&request, &ok).is_ok());
        let fault = Outcome::Fault(Fault::no_route("/a"));
        assert!(hook.after_dispatch(&request, &fault).is_ok());
    }
}
