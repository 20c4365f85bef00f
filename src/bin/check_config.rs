//! Utility to verify the environment before starting the server.
//!
//! Loads the configuration, connects to the configured ledger and prints a
//! summary of what the server would run against. Secrets are never printed.

use ethers::utils::to_checksum;
use loan_ledger_sync::config::Config;
use loan_ledger_sync::ledger::{EthLedgerClient, Ledger};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    println!("Configuration:");
    println!("  Network:           {} ({})", config.network, config.redacted_rpc_url());
    println!("  Default account:   {}", config.default_account);
    println!("  Private key:       [set, {} chars]", config.private_key.len());
    println!("  Contract artifact: {}", config.contract_artifact.display());
    println!("  Data source:       {}", config.data_source_url);
    println!("  CORS origins:      {}", config.cors_allowed_origins.join(", "));
    println!(
        "  Retry policy:      {} attempts, {:?} delay",
        config.retry.max_attempts, config.retry.delay
    );
    println!();

    let ledger = EthLedgerClient::connect(&config).await?;
    println!("Ledger:");
    println!("  Chain id:          {}", ledger.chain_id());
    println!(
        "  Sender:            {}",
        to_checksum(&ledger.default_account(), None)
    );

    let borrowers = ledger.get_all_borrowers().await?;
    println!("  Borrowers on-chain: {}", borrowers.len());

    Ok(())
}
