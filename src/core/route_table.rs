//! Ordered, hot-swappable route table.
//!
//! Readers load an immutable [`RouteSnapshot`] through `ArcSwap` and never
//! block. Writers are serialised by a mutex, build a complete replacement
//! snapshot off to the side and publish it with a single store, so a reader
//! observes either the whole old table or the whole new one.
use std::sync::{Arc, Mutex, PoisonError};

use arc_swap::ArcSwap;
use thiserror::Error;

use crate::{
    core::route::{Route, RoutePattern, RouteError, split_segments},
    metrics::set_route_table_size,
};

/// Errors raised by route table mutations. A failed mutation leaves the
/// table untouched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum RouteTableError {
    #[error("Duplicate route pattern: {0}")]
    DuplicatePattern(String),

    #[error(transparent)]
    InvalidRoute(#[from] RouteError),
}

pub type RouteTableResult<T> = Result<T, RouteTableError>;

/// An immutable view of the table at one point in time.
#[derive(Debug, Default)]
pub struct RouteSnapshot {
    routes: Vec<Arc<Route>>,
    version: u64,
}

impl RouteSnapshot {
    fn build(routes: Vec<Arc<Route>>, version: u64) -> RouteTableResult<Self> {
        for (i, route) in routes.iter().enumerate() {
            let key = route.pattern().key();
            if routes[..i].iter().any(|r| r.pattern().key() == key) {
                return Err(RouteTableError::DuplicatePattern(
                    route.pattern().as_str().to_string(),
                ));
            }
        }
        Ok(Self { routes, version })
    }

    /// Monotonic counter bumped by every successful mutation.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn routes(&self) -> &[Arc<Route>] {
        &self.routes
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn contains(&self, pattern: &RoutePattern) -> bool {
        self.routes.iter().any(|r| r.pattern().key() == pattern.key())
    }

    /// Find the most specific route for `path`.
    ///
    /// Literal segments beat wildcards at the same position and longer
    /// patterns beat their prefixes. Equal rank keeps the earliest route.
    pub fn lookup(&self, path: &str) -> Option<Arc<Route>> {
        let parts: Vec<&str> = split_segments(path).collect();

        let mut best: Option<&Arc<Route>> = None;
        for route in &self.routes {
            if !route.pattern().matches_segments(&parts) {
                continue;
            }
            let better = match best {
                None => true,
                Some(current) => {
                    route.pattern().specificity() > current.pattern().specificity()
                }
            };
            if better {
                best = Some(route);
            }
        }
        best.cloned()
    }
}

/// The gateway's route table.
pub struct RouteTable {
    current: ArcSwap<RouteSnapshot>,
    writer: Mutex<()>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self {
            current: ArcSwap::from_pointee(RouteSnapshot::default()),
            writer: Mutex::new(()),
        }
    }

    /// Build a table from an ordered list of routes.
    pub fn from_routes(routes: impl IntoIterator<Item = Route>) -> RouteTableResult<Self> {
        let table = Self::new();
        table.replace_all(routes)?;
        Ok(table)
    }

    /// Current snapshot. Hold on to it for the duration of a single dispatch.
    pub fn snapshot(&self) -> Arc<RouteSnapshot> {
        self.current.load_full()
    }

    pub fn lookup(&self, path: &str) -> Option<Arc<Route>> {
        self.current.load().lookup(path)
    }

    pub fn len(&self) -> usize {
        self.current.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.current.load().is_empty()
    }

    /// Append a route. Fails with `DuplicatePattern` if its pattern is taken.
    pub fn register(&self, route: Route) -> RouteTableResult<()> {
        let _guard = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let current = self.current.load_full();

        if current.contains(route.pattern()) {
            tracing::warn!(pattern = %route.pattern(), "Rejected duplicate route registration");
            return Err(RouteTableError::DuplicatePattern(
                route.pattern().as_str().to_string(),
            ));
        }

        let mut routes = current.routes.clone();
        tracing::debug!(pattern = %route.pattern(), target = %route.target(), "Registering route");
        routes.push(Arc::new(route));
        self.publish(routes, current.version + 1)
    }

    /// Remove the route registered under `pattern`, returning it if present.
    pub fn unregister(&self, pattern: &str) -> RouteTableResult<Option<Arc<Route>>> {
        let pattern = RoutePattern::parse(pattern)?;
        let _guard = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let current = self.current.load_full();

        let Some(index) = current
            .routes
            .iter()
            .position(|r| r.pattern().key() == pattern.key())
        else {
            return Ok(None);
        };

        let mut routes = current.routes.clone();
        let removed = routes.remove(index);
        tracing::debug!(pattern = %removed.pattern(), "Unregistered route");
        self.publish(routes, current.version + 1)?;
        Ok(Some(removed))
    }

    /// Atomically replace the whole table. On error the old table stays.
    pub fn replace_all(&self, routes: impl IntoIterator<Item = Route>) -> RouteTableResult<()> {
        let routes: Vec<Arc<Route>> = routes.into_iter().map(Arc::new).collect();
        let _guard = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let version = self.current.load().version + 1;
        self.publish(routes, version)?;
        tracing::info!(routes = self.len(), version, "Route table replaced");
        Ok(())
    }

    fn publish(&self, routes: Vec<Arc<Route>>, version: u64) -> RouteTableResult<()> {
        let snapshot = RouteSnapshot::build(routes, version)?;
        set_route_table_size(snapshot.len());
        self.current.store(Arc::new(snapshot));
        Ok(())
    }
}

impl Default for RouteTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn route(pattern: &str, target: &str) -> Route {
        Route::new(pattern, target, None).unwrap()
    }

    #[test]
    fn test_register_and_lookup_exact() {
        let table = RouteTable::new();
        table.register(route("/users", "http://users:80")).unwrap();
        table.register(route("/orders", "http://orders:80")).unwrap();

        let found = table.lookup("/orders").unwrap();
        assert_eq!(found.target(), "http://orders:80");
        assert!(table.lookup("/inventory").is_none());
    }

    #[test]
    fn test_duplicate_pattern_leaves_table_unchanged() {
        let table = RouteTable::new();
        table.register(route("/api", "http://a:80")).unwrap();
        let before = table.snapshot();

        let err = table.register(route("/api/", "http://b:80")).unwrap_err();
        assert_eq!(err, RouteTableError::DuplicatePattern("/api/".to_string()));

        let after = table.snapshot();
        assert_eq!(after.version(), before.version());
        assert_eq!(after.len(), 1);
        assert_eq!(table.lookup("/api").unwrap().target(), "http://a:80");
    }

    #[test]
    fn test_literal_beats_wildcard_regardless_of_order() {
        let table = RouteTable::new();
        table.register(route("/api/*", "http://a:80")).unwrap();
        table.register(route("/api/v1", "http://b:80")).unwrap();

        assert_eq!(table.lookup("/api/v1").unwrap().target(), "http://b:80");
        assert_eq!(table.lookup("/api/other").unwrap().target(), "http://a:80");
    }

    #[test]
    fn test_earlier_literal_position_wins() {
        let table = RouteTable::new();
        table.register(route("/*/items", "http://first:80")).unwrap();
        table.register(route("/shop/*", "http://second:80")).unwrap();
        table.register(route("/*/*", "http://third:80")).unwrap();

        assert_eq!(table.lookup("/shop/items").unwrap().target(), "http://second:80");
        assert_eq!(table.lookup("/cart/items").unwrap().target(), "http://first:80");
        assert_eq!(table.lookup("/cart/other").unwrap().target(), "http://third:80");
    }

    #[test]
    fn test_unregister() {
        let table = RouteTable::new();
        table.register(route("/api", "http://a:80")).unwrap();
        let removed = table.unregister("/api/").unwrap();
        assert!(removed.is_some());
        assert!(table.is_empty());
        assert!(table.unregister("/api").unwrap().is_none());
    }

    #[test]
    fn test_replace_all_is_atomic_on_error() {
        let table = RouteTable::from_routes([route("/a", "http://a:80")]).unwrap();
        let err = table
            .replace_all([route("/x", "http://x:80"), route("/x", "http://y:80")])
            .unwrap_err();
        assert!(matches!(err, RouteTableError::DuplicatePattern(_)));
        assert_eq!(table.len(), 1);
        assert!(table.lookup("/a").is_some());
        assert!(table.lookup("/x").is_none());
    }

    #[test]
    fn test_snapshot_is_stable_across_mutation() {
        let table = RouteTable::from_routes([route("/a", "http://a:80")]).unwrap();
        let snapshot = table.snapshot();
        table.register(route("/b", "http://b:80")).unwrap();
        assert_eq!(snapshot.len(), 1);
        assert!(snapshot.lookup("/b").is_none());
        assert!(table.lookup("/b").is_some());
    }
}
