use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use loan_ledger_sync::config::Config;
use loan_ledger_sync::data_source::DataSourceClient;
use loan_ledger_sync::handlers::{self, AppState};
use loan_ledger_sync::ledger::EthLedgerClient;

/// Main entry point for the application.
///
/// Initializes tracing, loads configuration, connects to the ledger and
/// binds the contract, then starts the Axum server. Any startup failure
/// (missing credentials, missing artifact, unreachable network) aborts.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "loan_ledger_sync=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(
        "Current working directory: {}",
        std::env::current_dir()?.display()
    );

    // Load configuration
    let config = Config::from_env()?;

    // Connect to the ledger and bind the contract
    let ledger = EthLedgerClient::connect(&config).await?;
    tracing::info!("✓ Ledger client initialized (chain id {})", ledger.chain_id());

    let data_source = DataSourceClient::new(&config)?;
    tracing::info!("✓ Data source client initialized: {}", config.data_source_url);

    let port = config.port;
    let app_state = Arc::new(AppState {
        config,
        ledger: Arc::new(ledger),
        data_source,
    });

    let app = handlers::router(app_state);

    // Start server
    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
