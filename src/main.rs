use std::{net::SocketAddr, path::Path, sync::Arc, time::Duration};

use clap::Parser;
use color_eyre::{
    Result,
    eyre::{Context, eyre},
};
use junction::{
    adapters::{
        FileConfigProvider, HttpConfigProvider, HttpHandler, HyperTransport, LoggingHook,
        MethodFilterHook, MetricsHook,
    },
    config::{ServerConfig, ServerConfigValidator},
    core::{Dispatcher, Matcher, RouteReloader, RouteTable, reloader::routes_from_config},
    metrics,
    ports::config_provider::ConfigProvider,
    tracing_setup,
    utils::Shutdown,
};

const REMOTE_POLL_INTERVAL: Duration = Duration::from_secs(10);

#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    #[clap(subcommand)]
    command: Option<Commands>,

    /// Configuration file path or http(s) URL
    #[clap(short, long, default_value = "junction.toml")]
    config: String,
}

#[derive(Parser, Debug)]
enum Commands {
    /// Validate a configuration file or URL
    Validate {
        #[clap(short, long, default_value = "junction.toml")]
        config: String,
    },
    /// Write a starter configuration file
    Init {
        #[clap(short, long, default_value = "junction.toml")]
        config: String,
    },
    /// Start the gateway (default)
    Serve {
        #[clap(short, long, default_value = "junction.toml")]
        config: String,
    },
}

fn create_config_provider(config_path: &str) -> Result<Arc<dyn ConfigProvider>> {
    if config_path.starts_with("http://") || config_path.starts_with("https://") {
        Ok(Arc::new(HttpConfigProvider::new(
            config_path,
            REMOTE_POLL_INTERVAL,
        )?))
    } else {
        Ok(Arc::new(FileConfigProvider::new(config_path)?))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let args = Args::parse();

    match args.command {
        Some(Commands::Validate { config }) => validate_config_command(&config).await,
        Some(Commands::Init { config }) => init_config_command(&config).await,
        Some(Commands::Serve { config }) => serve(&config).await,
        None => serve(&args.config).await,
    }
}

async fn serve(config_path: &str) -> Result<()> {
    let provider =
        create_config_provider(config_path).context("Failed to create config provider")?;
    let config: ServerConfig = provider
        .load_config()
        .await
        .with_context(|| format!("Failed to load initial configuration from {config_path}"))?;

    tracing_setup::init_tracing(&config.logging)?;
    ServerConfigValidator::validate(&config).context("Invalid configuration")?;
    metrics::describe_metrics();

    let upstream_timeout = config
        .upstream_timeout()
        .map_err(|e| eyre!("Invalid upstream_timeout '{}': {}", config.upstream_timeout, e))?;

    let table = Arc::new(RouteTable::from_routes(routes_from_config(&config)?)?);
    for route in table.snapshot().routes() {
        tracing::info!(
            pattern = %route.pattern(),
            target = %route.target(),
            rewrite = route.rewrite().unwrap_or("-"),
            "Configured route"
        );
    }

    let transport = Arc::new(HyperTransport::new()?);
    let mut dispatcher = Dispatcher::new(Matcher::new(table.clone()), transport)
        .with_timeout(upstream_timeout);
    if !config.allowed_methods.is_empty() {
        dispatcher = dispatcher.with_hook(Arc::new(MethodFilterHook::from_names(
            &config.allowed_methods,
        )));
    }
    let dispatcher = dispatcher
        .with_hook(Arc::new(LoggingHook::new()))
        .with_hook(Arc::new(MetricsHook::new()));

    let handler = HttpHandler::new(
        Arc::new(dispatcher),
        config.max_body_bytes,
        config.status_path.clone(),
    );

    // Only the route list is reloaded live; other settings need a restart.
    let reloader = RouteReloader::new(provider.clone(), table.clone());
    let reloader_handle = tokio::spawn(async move {
        if let Err(e) = reloader.run().await {
            tracing::error!("Route reloader stopped: {:#}", e);
        }
    });

    let shutdown = Shutdown::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move { shutdown.listen_for_signals().await });
    }

    let addr: SocketAddr = config
        .listen_addr
        .parse()
        .with_context(|| format!("Invalid listen address: {}", config.listen_addr))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {addr}"))?;

    tracing::info!(
        routes = table.len(),
        timeout = ?upstream_timeout,
        "Junction gateway listening on {}",
        addr
    );

    let server_shutdown = shutdown.clone();
    axum::serve(listener, handler.router())
        .with_graceful_shutdown(async move {
            let reason = server_shutdown.wait().await;
            tracing::info!("Stopping server: {:?}", reason);
        })
        .await
        .context("Server error")?;

    reloader_handle.abort();
    tracing::info!("Graceful shutdown completed");
    Ok(())
}

/// Validate configuration and exit
async fn validate_config_command(config_path: &str) -> Result<()> {
    println!("🔍 Validating configuration: {config_path}");

    let is_remote = config_path.starts_with("http://") || config_path.starts_with("https://");
    if !is_remote && !Path::new(config_path).exists() {
        eprintln!("❌ Error: Configuration file '{config_path}' not found");
        std::process::exit(1);
    }

    let provider = create_config_provider(config_path)?;
    let config = match provider.load_config().await {
        Ok(config) => {
            println!("✅ Configuration parsing: OK");
            config
        }
        Err(e) => {
            eprintln!("❌ Configuration parsing failed:");
            eprintln!("   {e:#}");
            std::process::exit(1);
        }
    };

    match ServerConfigValidator::validate(&config) {
        Ok(()) => {
            println!("✅ Configuration validation: OK");
            println!();
            println!("📋 Configuration Summary:");
            println!("   • Listen Address: {}", config.listen_addr);
            println!("   • Upstream Timeout: {}", config.upstream_timeout);
            println!("   • Routes: {}", config.routes.len());
            for route in &config.routes {
                match &route.rewrite {
                    Some(rewrite) => {
                        println!("     {} -> {} (rewrite {})", route.pattern, route.target, rewrite)
                    }
                    None => println!("     {} -> {}", route.pattern, route.target),
                }
            }
            Ok(())
        }
        Err(e) => {
            eprintln!("❌ Configuration validation failed:");
            eprintln!("{e}");
            println!();
            println!("💡 Common fixes:");
            println!("   • Targets must be absolute http:// or https:// URLs");
            println!("   • Wildcards must fill a whole segment, e.g. /api/*/items");
            println!("   • Each pattern may appear only once (trailing slashes are ignored)");
            std::process::exit(1);
        }
    }
}

/// Write a starter configuration file
async fn init_config_command(config_path: &str) -> Result<()> {
    let path = Path::new(config_path);
    if path.exists() {
        eprintln!("❌ Error: Configuration file '{config_path}' already exists");
        std::process::exit(1);
    }

    let default_config = r#"# Junction gateway configuration

listen_addr = "127.0.0.1:8080"

# Upper bound for one upstream exchange (humantime syntax)
upstream_timeout = "30s"

# Requests with larger bodies are refused with 413
max_body_bytes = 2097152

# Leave empty to accept every method
allowed_methods = []

status_path = "/_junction/status"

[logging]
level = "info"
format = "pretty"

# Routes are matched by specificity, not file order.
[[routes]]
pattern = "/api/*"
target = "http://localhost:3000"
rewrite = "/"

[[routes]]
pattern = "/static"
target = "http://localhost:3001"
"#;

    tokio::fs::write(path, default_config)
        .await
        .context("Failed to write config file")?;
    println!("✅ Created default configuration at: {config_path}");
    println!("   Run 'junction serve --config {config_path}' to start the gateway");
    Ok(())
}
