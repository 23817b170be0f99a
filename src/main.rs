// ABOUTME: Entry point for the corral demo server.
// ABOUTME: Loads configuration, initializes tracing, builds the route table, and serves it.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use corral_router::ServerConfig;

/// Serve the corral demo site.
#[derive(Debug, Parser)]
#[command(name = "corral", version, about)]
struct Cli {
    /// Socket address to bind (overrides CORRAL_BIND)
    #[arg(long)]
    bind: Option<SocketAddr>,

    /// Template directory (overrides CORRAL_VIEWS_DIR)
    #[arg(long)]
    views: Option<PathBuf>,

    /// Static file directory (overrides CORRAL_STATIC_DIR)
    #[arg(long = "static")]
    static_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new("corral=debug,corral_router=debug,tower_http=debug")
            }),
        )
        .init();

    let cli = Cli::parse();
    let mut config = ServerConfig::from_env()?;
    if let Some(bind) = cli.bind {
        config.bind = bind;
    }
    if let Some(views) = cli.views {
        config.views_dir = views;
    }
    if let Some(static_dir) = cli.static_dir {
        config.static_dir = static_dir;
    }

    // A broken template directory aborts startup here.
    let app = corral::build_app(&config)?;

    let listener = tokio::net::TcpListener::bind(config.bind).await?;
    tracing::info!(address = %config.bind, "corral listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("corral stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
