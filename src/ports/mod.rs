pub mod account_service;
pub mod config_provider;
pub mod hooks;
pub mod transport;
