pub mod dispatcher;
pub mod matcher;
pub mod outcome;
pub mod reloader;
pub mod request;
pub mod route;
pub mod route_table;

pub use dispatcher::Dispatcher;
pub use matcher::{Matcher, ResolvedTarget};
pub use outcome::{Fault, FaultKind, Outcome, UpstreamResponse};
pub use reloader::RouteReloader;
pub use request::RoutedRequest;
pub use route::{Route, RouteError, RoutePattern};
pub use route_table::{RouteSnapshot, RouteTable, RouteTableError};
