use std::path::Path;

use config::{Config, File, FileFormat};
use eyre::{Context, Result};

use crate::config::models::ServerConfig;

/// Load configuration from a file using the config crate
/// Supports multiple formats: YAML, JSON, TOML.
pub async fn load_config(config_path: &str) -> Result<ServerConfig> {
    load_config_sync(config_path)
}

/// Load configuration synchronously
pub fn load_config_sync(config_path: &str) -> Result<ServerConfig> {
    let config_path = Path::new(config_path);

    // Determine file format based on extension
    let format = match config_path.extension().and_then(|ext| ext.to_str()) {
        Some("yaml") | Some("yml") => FileFormat::Yaml,
        Some("json") => FileFormat::Json,
        _ => FileFormat::Toml,
    };

    let settings = Config::builder()
        .add_source(File::new(
            config_path
                .to_str()
                .ok_or_else(|| eyre::eyre!("Invalid UTF-8 path: {}", config_path.display()))?,
            format,
        ))
        .build()
        .with_context(|| format!("Failed to build config from {}", config_path.display()))?;

    parse_settings(settings)
        .with_context(|| format!("Failed to deserialize config from {}", config_path.display()))
}

/// Parse configuration text of a known format (used by remote providers).
pub fn load_config_from_str(content: &str, format: FileFormat) -> Result<ServerConfig> {
    let settings = Config::builder()
        .add_source(File::from_str(content, format))
        .build()
        .wrap_err("Failed to build config from text")?;
    parse_settings(settings)
}

fn parse_settings(settings: Config) -> Result<ServerConfig> {
    let server_config: ServerConfig = settings.try_deserialize()?;
    Ok(server_config)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;

    #[tokio::test]
    async fn test_load_toml_config_preserves_route_order() {
        let toml_content = r#"
listen_addr = "127.0.0.1:3000"
upstream_timeout = "5s"

[[routes]]
pattern = "/api/*"
target = "http://backend:8080"

[[routes]]
pattern = "/api/v1"
target = "http://v1:8080"
rewrite = "/"
"#;

        let mut temp_file = NamedTempFile::with_suffix(".toml").unwrap();
        write!(temp_file, "{}", toml_content).unwrap();

        let config = load_config(temp_file.path().to_str().unwrap())
            .await
            .unwrap();
        assert_eq!(config.listen_addr, "127.0.0.1:3000");
        assert_eq!(config.upstream_timeout, "5s");
        assert_eq!(config.routes.len(), 2);
        assert_eq!(config.routes[0].pattern, "/api/*");
        assert_eq!(config.routes[1].rewrite.as_deref(), Some("/"));
    }

    #[tokio::test]
    async fn test_load_yaml_config() {
        let yaml_content = r#"
listen_addr: "127.0.0.1:3000"
logging:
  level: "debug"
  format: "pretty"
routes:
  - pattern: "/api"
    target: "http://backend:8080"
"#;

        let mut temp_file = NamedTempFile::with_suffix(".yaml").unwrap();
        write!(temp_file, "{}", yaml_content).unwrap();

        let config = load_config(temp_file.path().to_str().unwrap())
            .await
            .unwrap();
        assert_eq!(config.routes.len(), 1);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.upstream_timeout, "30s");
    }

    #[test]
    fn test_load_json_from_str() {
        let json_content = r#"
{
  "listen_addr": "127.0.0.1:3000",
  "routes": [
    { "pattern": "/a", "target": "http://a:1" }
  ]
}
"#;
        let config = load_config_from_str(json_content, FileFormat::Json).unwrap();
        assert_eq!(config.routes[0].target, "http://a:1");
    }
}
