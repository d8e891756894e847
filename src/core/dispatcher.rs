//! Request dispatch pipeline.
//!
//! `dispatch` runs a fixed sequence of stages:
//! 1. pre-dispatch hooks (may reject)
//! 2. route matching
//! 3. forwarding through the upstream transport under a bounded timeout
//! 4. post-dispatch hooks (observe only)
//!
//! No retries happen here. Callers wanting a retry policy wrap the dispatcher.
use std::{
    panic::{AssertUnwindSafe, catch_unwind},
    sync::Arc,
    time::Duration,
};

use tracing::Instrument;

use crate::{
    core::{
        matcher::{Matcher, ResolvedTarget},
        outcome::{Fault, FaultKind, Outcome},
        request::RoutedRequest,
    },
    metrics::{UpstreamTimer, increment_hook_errors},
    ports::{
        hooks::{DispatchHook, HookDecision, HookError},
        transport::{TransportError, UpstreamTransport},
    },
    tracing_setup::create_upstream_span,
};

/// Default upper bound for a single upstream exchange.
pub const DEFAULT_UPSTREAM_TIMEOUT: Duration = Duration::from_secs(30);

pub struct Dispatcher {
    matcher: Matcher,
    transport: Arc<dyn UpstreamTransport>,
    hooks: Vec<Arc<dyn DispatchHook>>,
    timeout: Duration,
}

impl Dispatcher {
    pub fn new(matcher: Matcher, transport: Arc<dyn UpstreamTransport>) -> Self {
        Self {
            matcher,
            transport,
            hooks: Vec::new(),
            timeout: DEFAULT_UPSTREAM_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Append a hook. Hooks run in the order they were added.
    pub fn with_hook(mut self, hook: Arc<dyn DispatchHook>) -> Self {
        self.hooks.push(hook);
        self
    }

    pub fn matcher(&self) -> &Matcher {
        &self.matcher
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn hook_count(&self) -> usize {
        self.hooks.len()
    }

    /// Dispatch one request and return its outcome.
    pub async fn dispatch(&self, request: &RoutedRequest) -> Outcome {
        let outcome = self.run_stages(request).await;
        self.run_after_hooks(request, &outcome);

        match &outcome {
            Outcome::Success(response) => tracing::debug!(
                request.id = %request.id(),
                status = response.status.as_u16(),
                "Dispatch succeeded"
            ),
            Outcome::Fault(fault) => tracing::debug!(
                request.id = %request.id(),
                fault = %fault.kind,
                "Dispatch faulted: {}",
                fault.message
            ),
        }
        outcome
    }

    async fn run_stages(&self, request: &RoutedRequest) -> Outcome {
        if let Some(fault) = self.run_before_hooks(request) {
            return fault.into();
        }

        let resolved = match self.matcher.match_request(request) {
            Ok(resolved) => resolved,
            Err(fault) => return fault.into(),
        };

        self.forward(request, &resolved).await
    }

    fn run_before_hooks(&self, request: &RoutedRequest) -> Option<Fault> {
        for hook in &self.hooks {
            match guarded(&**hook, || hook.before_dispatch(request)) {
                Ok(HookDecision::Continue) => {}
                Ok(HookDecision::Reject { reason }) => {
                    tracing::info!(
                        request.id = %request.id(),
                        hook = hook.name(),
                        "Request rejected before dispatch: {}",
                        reason
                    );
                    return Some(Fault::rejected(hook.name(), &reason));
                }
                Err(e) => {
                    increment_hook_errors(hook.name(), "before");
                    tracing::warn!(request.id = %request.id(), "Ignoring pre-dispatch hook error: {}", e);
                }
            }
        }
        None
    }

    fn run_after_hooks(&self, request: &RoutedRequest, outcome: &Outcome) {
        for hook in &self.hooks {
            if let Err(e) = guarded(&**hook, || hook.after_dispatch(request, outcome)) {
                increment_hook_errors(hook.name(), "after");
                tracing::warn!(request.id = %request.id(), "Ignoring post-dispatch hook error: {}", e);
            }
        }
    }

    async fn forward(&self, request: &RoutedRequest, resolved: &ResolvedTarget) -> Outcome {
        let target = resolved.upstream_uri();
        let span = create_upstream_span(&target.to_string(), request.method().as_str(), resolved.upstream_path());
        let _timer = UpstreamTimer::new(resolved.route().pattern().as_str());

        // The transport gets the same budget; this outer bound covers
        // transports that ignore it. Dropping the future abandons the call.
        let call = self.transport.send(request, target, self.timeout);
        let result = tokio::time::timeout(self.timeout, call)
            .instrument(span)
            .await;

        match result {
            Ok(Ok(response)) => Outcome::Success(response),
            Ok(Err(TransportError::Timeout(_))) | Err(_) => Fault::new(
                FaultKind::UpstreamTimeout,
                format!("Upstream {target} did not respond within {:?}", self.timeout),
            )
            .into(),
            Ok(Err(e)) => Fault::new(
                FaultKind::UpstreamUnreachable,
                format!("Upstream {target} unreachable: {e}"),
            )
            .into(),
        }
    }
}

/// Run a hook callback, turning a panic into a [`HookError`].
fn guarded<T>(
    hook: &dyn DispatchHook,
    call: impl FnOnce() -> Result<T, HookError>,
) -> Result<T, HookError> {
    catch_unwind(AssertUnwindSafe(call)).unwrap_or_else(|payload| {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| (*s).to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        Err(HookError::new(hook.name(), format!("panicked: {message}")))
    })
}
