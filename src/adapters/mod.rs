pub mod account_service;
pub mod config_providers;
pub mod hooks;
pub mod http_handler;
pub mod http_transport;

pub use account_service::InMemoryAccountService;
pub use config_providers::{FileConfigProvider, HttpConfigProvider};
pub use hooks::{LoggingHook, MethodFilterHook, MetricsHook};
pub use http_handler::HttpHandler;
pub use http_transport::HyperTransport;
