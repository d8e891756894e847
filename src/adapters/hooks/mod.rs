pub mod logging;
pub mod method_filter;
pub mod metrics;

pub use logging::LoggingHook;
pub use method_filter::MethodFilterHook;
pub use metrics::MetricsHook;
