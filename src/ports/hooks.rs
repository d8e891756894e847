use thiserror::Error;

use crate::core::{outcome::Outcome, request::RoutedRequest};

/// Error reported by a hook. Hook errors are logged and never abort a dispatch.
#[derive(Error, Debug)]
#[error("Hook '{hook}' failed: {message}")]
pub struct HookError {
    pub hook: String,
    pub message: String,
}

impl HookError {
    pub fn new(hook: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            hook: hook.into(),
            message: message.into(),
        }
    }
}

/// Decision returned by [`DispatchHook::before_dispatch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookDecision {
    Continue,
    /// Stop the request before it is matched or forwarded.
    Reject { reason: String },
}

/// DispatchHook defines the port for observing requests around a dispatch.
///
/// Both callbacks are advisory. `before_dispatch` may short-circuit with
/// [`HookDecision::Reject`]; `after_dispatch` sees the final outcome and
/// cannot change it.
pub trait DispatchHook: Send + Sync + 'static {
    /// Name used in logs and rejection messages.
    fn name(&self) -> &str;

    fn before_dispatch(&self, _request: &RoutedRequest) -> Result<HookDecision, HookError> {
        Ok(HookDecision::Continue)
    }

    fn after_dispatch(&self, _request: &RoutedRequest, _outcome: &Outcome) -> Result<(), HookError> {
        Ok(())
    }
}
