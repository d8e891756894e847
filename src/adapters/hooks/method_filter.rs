use std::{collections::HashSet, str::FromStr};

use http::Method;

use crate::{
    core::request::RoutedRequest,
    ports::hooks::{DispatchHook, HookDecision, HookError},
};

/// Rejects requests whose method is not on the allow-list.
///
/// An empty allow-list accepts every method.
#[derive(Debug, Clone, Default)]
pub struct MethodFilterHook {
    allowed: HashSet<Method>,
}

impl MethodFilterHook {
    pub fn new(allowed: impl IntoIterator<Item = Method>) -> Self {
        Self {
            allowed: allowed.into_iter().collect(),
        }
    }

    /// Build from configured method names, skipping (and logging) invalid ones.
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Self {
        let allowed = names
            .iter()
            .filter_map(|name| {
                let name = name.as_ref();
                match Method::from_str(&name.to_ascii_uppercase()) {
                    Ok(method) => Some(method),
                    Err(_) => {
                        tracing::warn!("Ignoring invalid method '{}' in allow-list", name);
                        None
                    }
                }
            })
            .collect();
        Self { allowed }
    }

    pub fn is_allowed(&self, method: &Method) -> bool {
        self.allowed.is_empty() || self.allowed.contains(method)
    }
}

impl DispatchHook for MethodFilterHook {
    fn name(&self) -> &str {
        "method_filter"
    }

    fn before_dispatch(&self, request: &RoutedRequest) -> Result<HookDecision, HookError> {
        if self.is_allowed(request.method()) {
            Ok(HookDecision::Continue)
        } else {
            Ok(HookDecision::Reject {
                reason: format!("method {} is not allowed", request.method()),
            })
        }
    }
}
