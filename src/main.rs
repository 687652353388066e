//! sql-gateway - Runs raw SQL on behalf of callers holding the shared secret.

use sql_gateway::cli::Cli;
use sql_gateway::config::Config;
use sql_gateway::error::Result;
use sql_gateway::service::SqlService;
use sql_gateway::{logging, server};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    // Environment file first so clap sees its values.
    let dotenv = dotenvy::dotenv();

    let cli = Cli::parse_args();
    logging::init(cli.log_file.as_deref());

    match dotenv {
        Ok(path) => info!("Loaded environment from {}", path.display()),
        Err(e) if e.not_found() => {}
        Err(e) => {
            error!("Configuration Error: Could not load .env file: {}", e);
            std::process::exit(1);
        }
    }

    if let Err(e) = run(cli).await {
        error!("{}: {}", e.category(), e.message());
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config_path();
    info!("Loading config from: {}", config_path.display());
    let mut config = Config::load_from_file(&config_path)?;
    cli.apply_to(&mut config)?;
    let gateway = config.into_gateway_config()?;

    info!("Database: {}", gateway.database.display_string());

    let grpc_listener = server::bind(gateway.listen).await?;
    let http_listener = match gateway.http_listen {
        Some(addr) => Some(server::bind(addr).await?),
        None => None,
    };
    let service = SqlService::from_config(&gateway);

    let shutdown = CancellationToken::new();
    let signals = tokio::spawn(server::shutdown_on_signal(shutdown.clone()));

    let served = server::serve(grpc_listener, http_listener, service, shutdown).await;
    signals.abort();
    served?;

    info!("Gateway stopped");
    Ok(())
}
