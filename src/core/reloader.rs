//! Hot reload of the route table from a [`ConfigProvider`].
use std::{sync::Arc, time::Duration};

use eyre::{Result, WrapErr};

use crate::{
    config::{ServerConfig, ServerConfigValidator},
    core::{route::Route, route_table::RouteTable},
    ports::config_provider::ConfigProvider,
};

/// Default quiet period between two reload attempts.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_secs(2);

/// Build the ordered route list described by a configuration.
pub fn routes_from_config(config: &ServerConfig) -> Result<Vec<Route>> {
    config
        .routes
        .iter()
        .map(|rc| Route::try_from(rc).wrap_err_with(|| format!("Invalid route '{}'", rc.pattern)))
        .collect()
}

/// Listens for change signals and swaps in freshly loaded routes.
pub struct RouteReloader {
    provider: Arc<dyn ConfigProvider>,
    table: Arc<RouteTable>,
    debounce: Duration,
}

impl RouteReloader {
    pub fn new(provider: Arc<dyn ConfigProvider>, table: Arc<RouteTable>) -> Self {
        Self {
            provider,
            table,
            debounce: DEFAULT_DEBOUNCE,
        }
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Load, validate and apply the provider's current configuration.
    ///
    /// Any failure leaves the existing table untouched.
    pub async fn reload_once(&self) -> Result<usize> {
        let config = self
            .provider
            .load_config()
            .await
            .wrap_err("Failed to load configuration")?;
        ServerConfigValidator::validate(&config).wrap_err("New configuration is invalid")?;

        let routes = routes_from_config(&config)?;
        let count = routes.len();
        self.table
            .replace_all(routes)
            .wrap_err("Failed to apply new routes")?;
        Ok(count)
    }

    /// Run until the provider's watch channel closes.
    pub async fn run(self) -> Result<()> {
        let mut notify_rx = self
            .provider
            .watch()
            .ok_or_else(|| eyre::eyre!("Config provider watch channel already taken"))?;

        tracing::info!("Route reloader started.");
        let mut last_reload_attempt: Option<tokio::time::Instant> = None;

        while notify_rx.recv().await.is_some() {
            // Trailing edge: a change inside the cooldown is applied once it ends.
            if let Some(last) = last_reload_attempt {
                let ready_at = last + self.debounce;
                if tokio::time::Instant::now() < ready_at {
                    tracing::debug!("Config change within cooldown, reloading when it ends.");
                    tokio::time::sleep_until(ready_at).await;
                }
            }
            while notify_rx.try_recv().is_ok() {}
            last_reload_attempt = Some(tokio::time::Instant::now());

            match self.reload_once().await {
                Ok(count) => tracing::info!(routes = count, "Configuration reloaded."),
                Err(e) => tracing::error!(
                    "Failed to reload configuration: {:#}. Keeping old routes.",
                    e
                ),
            }
        }

        tracing::info!("Route reloader is shutting down.");
        Ok(())
    }
}
