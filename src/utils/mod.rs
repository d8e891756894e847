pub mod shutdown;

pub use shutdown::{Shutdown, ShutdownReason};
