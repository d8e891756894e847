use crate::{
    core::{outcome::Outcome, request::RoutedRequest},
    metrics::record_dispatch,
    ports::hooks::{DispatchHook, HookError},
};

/// Counts finished dispatches by method and outcome.
#[derive(Debug, Default, Clone)]
pub struct MetricsHook;

impl MetricsHook {
    pub fn new() -> Self {
        Self
    }
}

impl DispatchHook for MetricsHook {
    fn name(&self) -> &str {
        "metrics"
    }

    fn after_dispatch(&self, request: &RoutedRequest, outcome: &Outcome) -> Result<(), HookError> {
        record_dispatch(request.method().as_str(), outcome.label());
        Ok(())
    }
}
