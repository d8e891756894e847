use std::{
    path::{Path, PathBuf},
    sync::{Mutex, PoisonError},
};

use async_trait::async_trait;
use eyre::{Context, Result};
use notify::{RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::{
    config::{loader::load_config, models::ServerConfig},
    ports::config_provider::ConfigProvider,
};

/// Loads routes and settings from a local file and signals edits to it.
///
/// The parent directory is watched rather than the file itself so that
/// editors which replace the file on save are still picked up.
pub struct FileConfigProvider {
    path: PathBuf,
    // Dropping the watcher stops notifications.
    _watcher: notify::RecommendedWatcher,
    update_rx: Mutex<Option<mpsc::Receiver<()>>>,
}

impl FileConfigProvider {
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let (tx, rx) = mpsc::channel(1);
        let watcher = Self::spawn_watcher(&path, tx)?;

        Ok(Self {
            path,
            _watcher: watcher,
            update_rx: Mutex::new(Some(rx)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn spawn_watcher(path: &Path, tx: mpsc::Sender<()>) -> Result<notify::RecommendedWatcher> {
        let config_filename = path
            .file_name()
            .ok_or_else(|| eyre::eyre!("Config path has no file name: {}", path.display()))?
            .to_owned();

        let mut watcher =
            notify::recommended_watcher(move |res: Result<notify::Event, notify::Error>| {
                match res {
                    Ok(event) => {
                        let relevant = event.kind.is_modify()
                            || event.kind.is_create()
                            || event.kind.is_remove();
                        if relevant
                            && event
                                .paths
                                .iter()
                                .any(|p| p.file_name() == Some(config_filename.as_os_str()))
                        {
                            tracing::debug!("Config file changed: {:?}", event.kind);
                            // A pending signal already covers this change.
                            let _ = tx.try_send(());
                        }
                    }
                    Err(e) => tracing::error!("File watch error: {:?}", e),
                }
            })
            .wrap_err("Failed to create file watcher")?;

        let watch_dir = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        watcher
            .watch(watch_dir, RecursiveMode::NonRecursive)
            .wrap_err_with(|| format!("Failed to watch config directory {}", watch_dir.display()))?;

        Ok(watcher)
    }
}

#[async_trait]
impl ConfigProvider for FileConfigProvider {
    async fn load_config(&self) -> Result<ServerConfig> {
        let path_str = self
            .path
            .to_str()
            .ok_or_else(|| eyre::eyre!("Invalid UTF-8 path: {}", self.path.display()))?;
        load_config(path_str).await
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
    use std::{fs::File, io::Write};

    use tempfile::tempdir;
    use tokio::time::{Duration, sleep};

    use super::*;

    fn write(path: &Path, content: &str) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(content.as_bytes())?;
        Ok(())
    }

    #[tokio::test]
    async fn test_file_config_provider_signals_changes() -> Result<()> {
        let dir = tempdir()?;
        let file_path = dir.path().join("junction.toml");

        write(
            &file_path,
            r#"
            listen_addr = "127.0.0.1:8080"

            [[routes]]
            pattern = "/api/*"
            target = "http://backend:9000"
            "#,
        )?;

        let provider = FileConfigProvider::new(&file_path)?;
        let config = provider.load_config().await?;
        assert_eq!(config.routes.len(), 1);
        assert_eq!(config.routes[0].pattern, "/api/*");

        let mut rx = provider.watch().expect("first watch call yields a receiver");
        assert!(provider.watch().is_none());

        sleep(Duration::from_millis(100)).await;
        write(
            &file_path,
            r#"
            listen_addr = "127.0.0.1:8080"

            [[routes]]
            pattern = "/api/*"
            target = "http://backend:9000"

            [[routes]]
            pattern = "/static"
            target = "http://assets:9100"
            rewrite = "/files"
            "#,
        )?;

        let notification = tokio::time::timeout(Duration::from_secs(2), rx.recv()).await;
        assert!(notification.is_ok(), "Timed out waiting for config update");
        assert!(notification.unwrap().is_some(), "Channel closed unexpectedly");

        let config = provider.load_config().await?;
        assert_eq!(config.routes.len(), 2);
        assert_eq!(config.routes[1].rewrite.as_deref(), Some("/files"));

        Ok(())
    }
}
