//! hearthkey-server: HTTP API for household key distribution.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;

use hearthkey::WriteMode;
use hearthkey_server::{app, AppState, ServerConfig};

#[derive(Parser)]
#[command(name = "hearthkey-server")]
#[command(about = "Household key distribution and membership consistency service")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "hearthkey.toml")]
    config: PathBuf,

    /// Listen address (overrides config file)
    #[arg(short, long, env = "HEARTHKEY_LISTEN")]
    listen: Option<SocketAddr>,

    /// `memory` or a SQLite database path (overrides config file)
    #[arg(short, long, env = "HEARTHKEY_DATABASE")]
    database: Option<String>,

    /// Extra allowed CORS origin, such as the deployed frontend
    #[arg(long, env = "FRONTEND_URL")]
    frontend_url: Option<String>,

    /// Vault write mode (overrides config file)
    #[arg(long, value_parser = parse_write_mode)]
    write_mode: Option<WriteMode>,
}

fn parse_write_mode(value: &str) -> Result<WriteMode, String> {
    match value {
        "record" => Ok(WriteMode::Record),
        "snapshot" => Ok(WriteMode::Snapshot),
        other => Err(format!("unknown write mode `{other}` (expected record or snapshot)")),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("hearthkey=info".parse()?)
                .add_directive("hearthkey_server=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    info!("Starting hearthkey-server");
    let mut config = ServerConfig::load(&cli.config)?;

    if let Some(listen) = cli.listen {
        config.listen_addr = listen;
    }
    if let Some(database) = cli.database {
        config.database = database;
    }
    if let Some(origin) = cli.frontend_url {
        config.allow_origin(origin);
    }
    if let Some(mode) = cli.write_mode {
        config.vault.write_mode = mode;
    }

    info!(
        listen = %config.listen_addr,
        database = %config.database,
        write_mode = ?config.vault.write_mode,
        origins = config.cors_origins.len(),
        "configuration resolved"
    );

    let service = config.open_service()?;
    let router = app(AppState::new(service), &config);

    let listener = TcpListener::bind(config.listen_addr).await?;
    info!("Listening on {}", config.listen_addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("hearthkey-server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Shutdown signal received");
    }
}
