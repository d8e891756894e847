use std::{
    collections::hash_map::DefaultHasher,
    hash::{Hash, Hasher},
    sync::{Mutex, PoisonError},
    time::Duration,
};

use async_trait::async_trait;
use config::FileFormat;
use eyre::{Context, Result};
use reqwest::{Client, header::CONTENT_TYPE};
use tokio::{sync::mpsc, task::JoinHandle};

use crate::{
    config::{loader::load_config_from_str, models::ServerConfig},
    ports::config_provider::ConfigProvider,
};

/// Fetches configuration from an HTTP endpoint and polls it for changes.
///
/// The document format follows the response `Content-Type`, falling back to
/// the URL extension and then TOML. A change is signalled when the fetched
/// text differs from the previous poll.
pub struct HttpConfigProvider {
    url: String,
    client: Client,
    update_rx: Mutex<Option<mpsc::Receiver<()>>>,
    poller: JoinHandle<()>,
}

impl HttpConfigProvider {
    /// Create the provider and start polling. Must be called within a Tokio runtime.
    pub fn new(url: impl Into<String>, poll_interval: Duration) -> Result<Self> {
        let url = url.into();
        let (tx, rx) = mpsc::channel(1);
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .wrap_err("Failed to build HTTP client for config provider")?;

        let poller = tokio::spawn(Self::poll(client.clone(), url.clone(), poll_interval, tx));

        Ok(Self {
            url,
            client,
            update_rx: Mutex::new(Some(rx)),
            poller,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn poll(client: Client, url: String, poll_interval: Duration, tx: mpsc::Sender<()>) {
        let mut last_hash: Option<u64> = None;
        let mut interval = tokio::time::interval(poll_interval);

        loop {
            interval.tick().await;
            match Self::fetch_text(&client, &url).await {
                Ok((_, body)) => {
                    let mut hasher = DefaultHasher::new();
                    body.hash(&mut hasher);
                    let hash = hasher.finish();

                    if last_hash.is_some_and(|last| last != hash) {
                        tracing::info!(url = %url, "Remote configuration changed");
                        if tx.try_send(()).is_err() && tx.is_closed() {
                            return;
                        }
                    }
                    last_hash = Some(hash);
                }
                Err(e) => tracing::warn!("Failed to poll remote config: {:#}", e),
            }
        }
    }

    async fn fetch_text(client: &Client, url: &str) -> Result<(FileFormat, String)> {
        let resp = client
            .get(url)
            .send()
            .await
            .wrap_err_with(|| format!("Failed to fetch config from {url}"))?
            .error_for_status()
            .wrap_err_with(|| format!("Config endpoint {url} returned an error"))?;

        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let body = resp.text().await.wrap_err("Failed to read config body")?;

        Ok((detect_format(content_type.as_deref(), url), body))
    }
}

impl Drop for HttpConfigProvider {
    fn drop(&mut self) {
        self.poller.abort();
    }
}

fn detect_format(content_type: Option<&str>, url: &str) -> FileFormat {
    if let Some(ct) = content_type {
        if ct.contains("json") {
            return FileFormat::Json;
        }
        if ct.contains("yaml") {
            return FileFormat::Yaml;
        }
        if ct.contains("toml") {
            return FileFormat::Toml;
        }
    }

    let path = url.split(['?', '#']).next().unwrap_or(url);
    if path.ends_with(".json") {
        FileFormat::Json
    } else if path.ends_with(".yaml") || path.ends_with(".yml") {
        FileFormat::Yaml
    } else {
        FileFormat::Toml
    }
}

#[async_trait]
impl ConfigProvider for HttpConfigProvider {
    async fn load_config(&self) -> Result<ServerConfig> {
        let (format, body) = Self::fetch_text(&self.client, &self.url).await?;
        load_config_from_str(&body, format)
            .wrap_err_with(|| format!("Failed to parse config from {}", self.url))
    }

    fn watch(&self) -> Option<mpsc::Receiver<()>> {
        self.update_rx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{Json, Router, routing::get};
    use tokio::net::TcpListener;

    use super::*;
    use crate::config::RouteConfig;

    #[test]
    fn test_detect_format() {
        assert!(matches!(
            detect_format(Some("application/json; charset=utf-8"), "http://c/x"),
            FileFormat::Json
        ));
        assert!(matches!(
            detect_format(Some("text/plain"), "http://c/routes.yml?v=2"),
            FileFormat::Yaml
        ));
        assert!(matches!(detect_format(None, "http://c/routes"), FileFormat::Toml));
    }

    #[tokio::test]
    async fn test_http_config_provider_polls_for_changes() -> Result<()> {
        let state = Arc::new(Mutex::new(
            ServerConfig::builder()
                .listen_addr("127.0.0.1:8080")
                .route(RouteConfig::new("/api/*", "http://backend:9000"))
                .build()
                .unwrap(),
        ));

        let shared = state.clone();
        let app = Router::new().route(
            "/config",
            get(move || async move { Json(shared.lock().unwrap().clone()) }),
        );

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let provider =
            HttpConfigProvider::new(format!("http://{addr}/config"), Duration::from_millis(100))?;

        let config = provider.load_config().await?;
        assert_eq!(config.routes.len(), 1);

        let mut rx = provider.watch().expect("receiver available once");

        // Let the poller record the initial document.
        tokio::time::sleep(Duration::from_millis(250)).await;

        state
            .lock()
            .unwrap()
            .routes
            .push(RouteConfig::new("/static", "http://assets:9100"));

        let notification = tokio::time::timeout(Duration::from_secs(2), rx.recv()).await;
        assert!(notification.is_ok(), "Timed out waiting for config update");
        assert!(notification.unwrap().is_some(), "Channel closed unexpectedly");

        let config = provider.load_config().await?;
        assert_eq!(config.routes.len(), 2);
        Ok(())
    }
}
