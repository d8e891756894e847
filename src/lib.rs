//! Junction - a path-based request routing gateway.
//!
//! Junction accepts inbound HTTP requests, picks an upstream target from a
//! table of path templates and forwards the request, returning either the
//! upstream response or a typed fault.
//!
//! # Features
//! - Path templates with literal and single-segment `*` wildcard segments
//! - Most-specific-match selection with deterministic tie breaking
//! - Optional prefix rewrite per route
//! - Lock-free route lookups with atomic whole-table replacement
//! - Pre/post dispatch hooks (logging, metrics, method filtering)
//! - Bounded upstream timeout, no implicit retries
//! - Live configuration reload from a file or an HTTP endpoint
//! - Structured tracing via `tracing` and counters via `metrics`
//!
//! # Quick Example
//! ```no_run
//! use std::sync::Arc;
//!
//! use junction::{Dispatcher, HyperTransport, Matcher, Route, RouteTable, RoutedRequest};
//!
//! # #[tokio::main] async fn main() -> eyre::Result<()> {
//! let table = Arc::new(RouteTable::new());
//! table.register(Route::new("/api/*", "http://127.0.0.1:3000", Some("/"))?)?;
//!
//! let dispatcher = Dispatcher::new(Matcher::new(table), Arc::new(HyperTransport::new()?));
//! let request = RoutedRequest::new(http::Method::GET, &"/api/users".parse()?);
//! let outcome = dispatcher.dispatch(&request).await;
//! println!("{}", outcome.label());
//! # Ok(()) }
//! ```
//!
//! # Architecture
//! **Ports** (traits) are kept apart from **adapters** (implementations);
//! routing and dispatch logic lives in `core` and never touches the network
//! directly.
//!
//! # Error Handling
//! Domain operations return typed errors (`RouteError`, `RouteTableError`,
//! `Fault`). Plumbing such as configuration loading returns `eyre::Result`
//! with context attached through `WrapErr`.
pub mod config;
pub mod metrics;
pub mod ports;
pub mod tracing_setup;
pub mod utils;

pub mod adapters;
pub mod core;

pub use crate::{
    adapters::{
        FileConfigProvider, HttpConfigProvider, HttpHandler, HyperTransport, LoggingHook,
        MethodFilterHook, MetricsHook,
    },
    core::{
        Dispatcher, Fault, FaultKind, Matcher, Outcome, Route, RouteReloader, RouteTable,
        RoutedRequest,
    },
    ports::{config_provider::ConfigProvider, hooks::DispatchHook, transport::UpstreamTransport},
    utils::{Shutdown, ShutdownReason},
};
