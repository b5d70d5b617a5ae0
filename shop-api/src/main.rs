use anyhow::Result;
use clap::Parser;
use shop_api::{bootstrap::build_app_state, config::AppConfig, server::ApiServer};
use shop_observability::setup_tracing;
use tracing::{error, info};

#[derive(Debug, Parser)]
#[command(name = "shop-api", version, about = "Storefront back-office API")]
struct Cli {
    /// Overrides SERVER_PORT.
    #[arg(long)]
    port: Option<u16>,

    /// Overrides STORAGE_TYPE (memory or postgres).
    #[arg(long)]
    storage: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load_from_env()?;
    if let Some(port) = cli.port {
        config.server_port = port;
    }
    if let Some(storage) = cli.storage {
        config.storage_type = storage;
    }

    setup_tracing(config.tracing())?;

    info!("Starting storefront API with environment-based config");
    let state = build_app_state(&config).await?;
    let server = ApiServer::new(state, config.server());

    if let Err(e) = server.serve().await {
        error!("Server error: {}", e);
        std::process::exit(1);
    }

    Ok(())
}
