use crate::retry::RetryPolicy;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_GANACHE_URL: &str = "http://127.0.0.1:7545";
pub const DEFAULT_DATA_SOURCE_URL: &str = "https://api.mockaroo.com/api/02402ed0";

/// Which preconfigured ledger network to connect to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Network {
    Ganache,
    Sepolia,
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Network::Ganache => write!(f, "ganache"),
            Network::Sepolia => write!(f, "sepolia"),
        }
    }
}

/// What to do when loan eligibility cannot be determined after all retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UndeterminedPolicy {
    /// Submit `Rejected`, the same as an ineligible loan.
    Reject,
    /// Leave the on-chain status untouched.
    Skip,
}

#[derive(Clone)]
pub struct Config {
    pub port: u16,
    pub private_key: String,
    pub default_account: String,
    pub network: Network,
    pub rpc_url: String,
    pub contract_artifact: PathBuf,
    pub cors_allowed_origins: Vec<String>,
    pub data_source_url: String,
    pub data_source_key: Option<String>,
    pub data_source_seed: u64,
    pub sync_batch_size: usize,
    pub retry: RetryPolicy,
    pub gas_limit: u64,
    pub gas_price_gwei: u64,
    pub undetermined_policy: UndeterminedPolicy,
}

// Keeps the signing key out of logs.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("port", &self.port)
            .field("private_key", &"[REDACTED]")
            .field("default_account", &self.default_account)
            .field("network", &self.network)
            .field("rpc_url", &self.redacted_rpc_url())
            .field("contract_artifact", &self.contract_artifact)
            .field("cors_allowed_origins", &self.cors_allowed_origins)
            .field("data_source_url", &self.data_source_url)
            .field(
                "data_source_key",
                &self.data_source_key.as_ref().map(|_| "[REDACTED]"),
            )
            .field("data_source_seed", &self.data_source_seed)
            .field("sync_batch_size", &self.sync_batch_size)
            .field("retry", &self.retry)
            .field("gas_limit", &self.gas_limit)
            .field("gas_price_gwei", &self.gas_price_gwei)
            .field("undetermined_policy", &self.undetermined_policy)
            .finish()
    }
}

impl Config {
    /// RPC endpoint safe for logs. Hosted nodes embed the project key in the path.
    pub fn redacted_rpc_url(&self) -> String {
        redact_url(&self.rpc_url)
    }

    /// Loads configuration from the process environment.
    ///
    /// The env file named by `ENV_FILE` (default `../env/network.env`) and a
    /// local `.env` are loaded first if present. Variables already set in the
    /// environment take precedence.
    pub fn from_env() -> anyhow::Result<Self> {
        let env_file =
            std::env::var("ENV_FILE").unwrap_or_else(|_| "../env/network.env".to_string());
        match dotenvy::from_path(&env_file) {
            Ok(()) => tracing::info!("Loaded environment variables from {}", env_file),
            Err(e) => tracing::debug!("Env file {} not loaded: {}", env_file, e),
        }
        dotenvy::dotenv().ok();

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let network = match var("NETWORK")
            .unwrap_or_else(|| "ganache".to_string())
            .trim()
            .to_ascii_lowercase()
            .as_str()
        {
            "ganache" => Network::Ganache,
            "sepolia" => Network::Sepolia,
            other => anyhow::bail!("NETWORK must be 'ganache' or 'sepolia', got '{}'", other),
        };

        let rpc_url = match network {
            Network::Ganache => {
                var("GANACHE_URL").unwrap_or_else(|| DEFAULT_GANACHE_URL.to_string())
            }
            Network::Sepolia => var("SEPOLIA_URL").ok_or_else(|| {
                anyhow::anyhow!("SEPOLIA_URL environment variable required when NETWORK=sepolia")
            })?,
        };
        let rpc_url = require_http(rpc_url, "RPC URL")?;

        let config = Self {
            port: parse_or(&var, "PORT", 5001)
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number between 1-65535"))?,
            private_key: var("PRIVATE_KEY")
                .ok_or_else(|| anyhow::anyhow!("PRIVATE_KEY environment variable required"))?
                .trim()
                .to_string(),
            default_account: var("SEPOLIA_ACCOUNT")
                .or_else(|| var("DEFAULT_ACCOUNT"))
                .ok_or_else(|| {
                    anyhow::anyhow!(
                        "SEPOLIA_ACCOUNT or DEFAULT_ACCOUNT environment variable required"
                    )
                })?
                .trim()
                .to_string(),
            network,
            rpc_url,
            contract_artifact: var("CONTRACT_ARTIFACT")
                .unwrap_or_else(|| "../blockchain/LoanVerification.json".to_string())
                .into(),
            cors_allowed_origins: var("CORS_ALLOWED_ORIGINS")
                .unwrap_or_else(|| "http://localhost:3000".to_string())
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            data_source_url: require_http(
                var("DATA_SOURCE_URL").unwrap_or_else(|| DEFAULT_DATA_SOURCE_URL.to_string()),
                "DATA_SOURCE_URL",
            )?,
            data_source_key: var("DATA_SOURCE_KEY"),
            data_source_seed: parse_or(&var, "DATA_SOURCE_SEED", 12345)
                .map_err(|_| anyhow::anyhow!("DATA_SOURCE_SEED must be a non-negative integer"))?,
            sync_batch_size: parse_or(&var, "SYNC_BATCH_SIZE", 10)
                .map_err(|_| anyhow::anyhow!("SYNC_BATCH_SIZE must be a positive integer"))?,
            retry: RetryPolicy::new(
                parse_or(&var, "RETRY_MAX_ATTEMPTS", 5).map_err(|_| {
                    anyhow::anyhow!("RETRY_MAX_ATTEMPTS must be a positive integer")
                })?,
                Duration::from_millis(parse_or(&var, "RETRY_DELAY_MS", 2000).map_err(|_| {
                    anyhow::anyhow!("RETRY_DELAY_MS must be a non-negative integer")
                })?),
            ),
            gas_limit: parse_or(&var, "GAS_LIMIT", 300_000)
                .map_err(|_| anyhow::anyhow!("GAS_LIMIT must be a positive integer"))?,
            gas_price_gwei: parse_or(&var, "GAS_PRICE_GWEI", 20)
                .map_err(|_| anyhow::anyhow!("GAS_PRICE_GWEI must be a positive integer"))?,
            undetermined_policy: match var("UNDETERMINED_POLICY")
                .unwrap_or_else(|| "reject".to_string())
                .trim()
                .to_ascii_lowercase()
                .as_str()
            {
                "reject" => UndeterminedPolicy::Reject,
                "skip" => UndeterminedPolicy::Skip,
                other => anyhow::bail!(
                    "UNDETERMINED_POLICY must be 'reject' or 'skip', got '{}'",
                    other
                ),
            },
        };

        if config.sync_batch_size == 0 {
            anyhow::bail!("SYNC_BATCH_SIZE must be a positive integer");
        }
        if config.retry.max_attempts == 0 {
            anyhow::bail!("RETRY_MAX_ATTEMPTS must be a positive integer");
        }

        // Log successful configuration load (without sensitive values)
        tracing::info!("Configuration loaded successfully");
        tracing::debug!("Network: {} ({})", config.network, config.redacted_rpc_url());
        tracing::debug!("Default account: {}", config.default_account);
        tracing::debug!("Contract artifact: {}", config.contract_artifact.display());
        tracing::debug!("Data source URL: {}", config.data_source_url);
        tracing::debug!("CORS origins: {:?}", config.cors_allowed_origins);
        tracing::debug!("Server Port: {}", config.port);

        Ok(config)
    }
}

fn parse_or<T, V>(var: &V, key: &str, default: T) -> Result<T, T::Err>
where
    T: std::str::FromStr,
    V: Fn(&str) -> Option<String>,
{
    match var(key) {
        Some(raw) => raw.trim().parse(),
        None => Ok(default),
    }
}

/// Keeps scheme, host and port; any path or query becomes `/[REDACTED]`.
pub fn redact_url(url: &str) -> String {
    match reqwest::Url::parse(url) {
        Ok(parsed) => {
            let origin = parsed.origin().ascii_serialization();
            if parsed.path() == "/" && parsed.query().is_none() {
                origin
            } else {
                format!("{}/[REDACTED]", origin)
            }
        }
        Err(_) => "[REDACTED]".to_string(),
    }
}

fn require_http(url: String, name: &str) -> anyhow::Result<String> {
    if !url.starts_with("http://") && !url.starts_with("https://") {
        anyhow::bail!("{} must start with http:// or https://", name);
    }
    Ok(url)
}
