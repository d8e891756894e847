//! Request to upstream resolution.
use std::sync::Arc;

use http::{Uri, uri::PathAndQuery};

use crate::core::{
    outcome::{Fault, FaultKind},
    request::RoutedRequest,
    route::Route,
    route_table::{RouteSnapshot, RouteTable},
};

/// A request resolved against the route table.
#[derive(Debug, Clone)]
pub struct ResolvedTarget {
    route: Arc<Route>,
    upstream_path: String,
    upstream_uri: Uri,
}

impl ResolvedTarget {
    pub fn route(&self) -> &Arc<Route> {
        &self.route
    }

    /// Path sent upstream after any rewrite, without the target's base path.
    pub fn upstream_path(&self) -> &str {
        &self.upstream_path
    }

    /// Absolute URI the request is forwarded to.
    pub fn upstream_uri(&self) -> &Uri {
        &self.upstream_uri
    }
}

/// Resolves requests against the current route table snapshot.
#[derive(Clone)]
pub struct Matcher {
    table: Arc<RouteTable>,
}

impl Matcher {
    pub fn new(table: Arc<RouteTable>) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &Arc<RouteTable> {
        &self.table
    }

    pub fn match_request(&self, request: &RoutedRequest) -> Result<ResolvedTarget, Fault> {
        Self::match_in(&self.table.snapshot(), request)
    }

    /// Resolve against an explicit snapshot.
    pub fn match_in(
        snapshot: &RouteSnapshot,
        request: &RoutedRequest,
    ) -> Result<ResolvedTarget, Fault> {
        let route = snapshot
            .lookup(request.path())
            .ok_or_else(|| Fault::no_route(request.path()))?;

        let upstream_path = route.rewrite_path(request.path());
        let upstream_uri = build_upstream_uri(route.target(), &upstream_path, request.query())
            .map_err(|e| {
                Fault::new(
                    FaultKind::UpstreamUnreachable,
                    format!("Cannot build upstream URI for '{}': {e}", route.target()),
                )
            })?;

        tracing::debug!(
            pattern = %route.pattern(),
            path = request.path(),
            upstream = %upstream_uri,
            "Matched route"
        );

        Ok(ResolvedTarget {
            route,
            upstream_path,
            upstream_uri,
        })
    }
}

/// Join the target's base path with the upstream path and carry the query.
fn build_upstream_uri(target: &Uri, upstream_path: &str, query: Option<&str>) -> Result<Uri, http::Error> {
    let base = target.path().trim_end_matches('/');
    let path = if upstream_path.starts_with('/') {
        format!("{base}{upstream_path}")
    } else {
        format!("{base}/{upstream_path}")
    };
    let path_and_query = match query {
        Some(q) if !q.is_empty() => format!("{path}?{q}"),
        _ => path,
    };
    let path_and_query: PathAndQuery = path_and_query.parse()?;

    let mut builder = Uri::builder().path_and_query(path_and_query);
    if let Some(scheme) = target.scheme() {
        builder = builder.scheme(scheme.clone());
    }
    if let Some(authority) = target.authority() {
        builder = builder.authority(authority.clone());
    }
    builder.build()
}

#[cfg(test)]
mod tests {
    use http::Method;

    use super::*;

    fn request(uri: &str) -> RoutedRequest {
        RoutedRequest::new(Method::GET, &uri.parse().unwrap())
    }

    fn matcher(routes: Vec<Route>) -> Matcher {
        Matcher::new(Arc::new(RouteTable::from_routes(routes).unwrap()))
    }

    #[test]
    fn test_no_route_fault() {
        let m = matcher(vec![Route::new("/api", "http://a:80", None).unwrap()]);
        let fault = m.match_request(&request("/other")).unwrap_err();
        assert_eq!(fault.kind, FaultKind::NoRoute);
    }

    #[test]
    fn test_rewrite_and_query_are_applied() {
        let m = matcher(vec![
            Route::new("/api/*", "http://backend:8080/base/", Some("/v2")).unwrap(),
        ]);
        let resolved = m.match_request(&request("/api/users/7?expand=true")).unwrap();
        assert_eq!(resolved.upstream_path(), "/v2/users/7");
        assert_eq!(
            resolved.upstream_uri().to_string(),
            "http://backend:8080/base/v2/users/7?expand=true"
        );
    }

    #[test]
    fn test_passthrough_without_rewrite() {
        let m = matcher(vec![Route::new("/", "https://site.example", None).unwrap()]);
        let resolved = m.match_request(&request("/docs/intro")).unwrap();
        assert_eq!(
            resolved.upstream_uri().to_string(),
            "https://site.example/docs/intro"
        );
    }

    #[test]
    fn test_matching_is_deterministic() {
        let m = matcher(vec![
            Route::new("/api/*", "http://a:80", None).unwrap(),
            Route::new("/api/v1", "http://b:80", None).unwrap(),
        ]);
        let req = request("/api/v1/items");
        let first = m.match_request(&req).unwrap();
        for _ in 0..10 {
            let again = m.match_request(&req).unwrap();
            assert_eq!(again.upstream_uri(), first.upstream_uri());
        }
        assert_eq!(first.route().pattern().as_str(), "/api/v1");
    }
}
