//! Ledger client for the loan verification contract.
//!
//! Reads go through `eth_call`. Writes are built as legacy transactions with a
//! fixed gas limit and price, signed locally with the configured key and
//! submitted raw. The nonce is read (including pending transactions) right
//! before each submission, under a lock, so one process never races itself.

use crate::config::Config;
use crate::errors::AppError;
use crate::models::{BorrowerDetails, LoanStatus, LoanTerms, OnChainBorrowers};
use anyhow::{anyhow, Context};
use async_trait::async_trait;
use ethers::abi::{Abi, Token};
use ethers::contract::Contract;
use ethers::providers::{Http, Middleware, Provider};
use ethers::signers::{LocalWallet, Signer};
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, BlockNumber, Bytes, TransactionRequest, H256, U256};
use ethers::utils::to_checksum;
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

const GWEI: u64 = 1_000_000_000;

/// Contract operations the sync and status workflows depend on.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Whether the contract holds a borrower with a non-zero loan amount.
    async fn borrower_exists(&self, address: Address) -> Result<bool, AppError>;

    async fn get_all_borrowers(&self) -> Result<OnChainBorrowers, AppError>;

    /// Submits `addOrUpdateBorrower` and returns the transaction hash.
    async fn submit_add_or_update(
        &self,
        address: Address,
        terms: LoanTerms,
    ) -> Result<String, AppError>;

    /// Read-only eligibility check. The rule lives in the contract.
    async fn validate_loan(&self, terms: LoanTerms) -> Result<bool, AppError>;

    /// Submits `updateLoanStatus` and returns the transaction hash.
    async fn submit_status_update(
        &self,
        address: Address,
        status: LoanStatus,
    ) -> Result<String, AppError>;
}

/// ABI and deployed address, as produced by the contract deployment step.
#[derive(Debug, Deserialize)]
pub struct ContractArtifact {
    pub abi: Abi,
    pub address: String,
}

impl ContractArtifact {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read contract artifact {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Invalid contract artifact {}", path.display()))
    }
}

/// Fixed gas settings applied to every submitted transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GasSettings {
    pub limit: U256,
    pub price: U256,
}

impl GasSettings {
    pub fn new(limit: u64, price_gwei: u64) -> Self {
        Self {
            limit: U256::from(limit),
            price: U256::from(price_gwei) * U256::from(GWEI),
        }
    }
}

/// Parses an account identifier, accepting any case with or without `0x`.
pub fn checksum_address(input: &str) -> Result<Address, AppError> {
    let trimmed = input.trim();
    let hex_part = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);

    if hex_part.len() != 40 || !hex_part.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(AppError::Ledger(format!("Malformed address '{}'", trimmed)));
    }

    hex_part
        .parse::<Address>()
        .map_err(|e| AppError::Ledger(format!("Malformed address '{}': {}", trimmed, e)))
}

/// Renders a transaction hash as `0x`-prefixed lowercase hex.
pub fn format_tx_hash(hash: H256) -> String {
    format!("0x{}", hex::encode(hash.as_bytes()))
}

/// JSON-RPC backed implementation of [`Ledger`].
pub struct EthLedgerClient {
    provider: Provider<Http>,
    contract: Contract<Provider<Http>>,
    wallet: LocalWallet,
    default_account: Address,
    chain_id: u64,
    gas: GasSettings,
    submit_lock: Mutex<()>,
}

impl EthLedgerClient {
    /// Loads the artifact, connects to the configured network and binds the contract.
    ///
    /// Fails if the artifact is missing, credentials are invalid or the RPC
    /// endpoint does not answer.
    pub async fn connect(config: &Config) -> anyhow::Result<Self> {
        let artifact = ContractArtifact::load(&config.contract_artifact)?;
        let contract_address = checksum_address(&artifact.address)
            .map_err(|e| anyhow!("Invalid contract address in artifact: {}", e))?;

        let provider = Provider::<Http>::try_from(config.rpc_url.as_str())
            .map_err(|e| anyhow!("Failed to create HTTP provider: {}", e))?;

        let chain_id = provider
            .get_chainid()
            .await
            .map_err(|e| {
                anyhow!(
                    "Failed to connect to the blockchain network at {}: {}",
                    config.redacted_rpc_url(),
                    e
                )
            })?
            .as_u64();
        tracing::info!("Connected to {} network (chain id {})", config.network, chain_id);

        let key = config
            .private_key
            .strip_prefix("0x")
            .unwrap_or(&config.private_key);
        let key_bytes = hex::decode(key).map_err(|_| anyhow!("PRIVATE_KEY must be hex encoded"))?;
        let wallet = LocalWallet::from_bytes(&key_bytes)
            .map_err(|e| anyhow!("Invalid private key: {}", e))?
            .with_chain_id(chain_id);

        let default_account = checksum_address(&config.default_account)
            .map_err(|e| anyhow!("Invalid default account: {}", e))?;
        if wallet.address() != default_account {
            tracing::warn!(
                "Signing key address {} does not match default account {}",
                to_checksum(&wallet.address(), None),
                to_checksum(&default_account, None)
            );
        }

        let contract = Contract::new(contract_address, artifact.abi, Arc::new(provider.clone()));
        tracing::info!(
            "Contract bound at {}",
            to_checksum(&contract_address, None)
        );

        Ok(Self {
            provider,
            contract,
            wallet,
            default_account,
            chain_id,
            gas: GasSettings::new(config.gas_limit, config.gas_price_gwei),
            submit_lock: Mutex::new(()),
        })
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub fn default_account(&self) -> Address {
        self.default_account
    }

    /// Performs a read-only call and returns the raw decoded output.
    async fn read(&self, function: &str, args: Vec<Token>) -> Result<Token, AppError> {
        self.contract
            .method::<_, Token>(function, args.as_slice())?
            .call()
            .await
            .map_err(|e| AppError::Ledger(format!("{} call failed: {}", function, e)))
    }

    /// Encodes, signs and submits a state-changing call.
    async fn submit(&self, function: &str, args: Vec<Token>) -> Result<String, AppError> {
        let data: Bytes = self
            .contract
            .method::<_, ()>(function, args.as_slice())?
            .calldata()
            .ok_or_else(|| AppError::Ledger(format!("No calldata for {}", function)))?;

        let _guard = self.submit_lock.lock().await;

        let nonce = self
            .provider
            .get_transaction_count(self.default_account, Some(BlockNumber::Pending.into()))
            .await
            .map_err(|e| AppError::Ledger(format!("Failed to fetch nonce: {}", e)))?;

        let tx: TypedTransaction = TransactionRequest::new()
            .from(self.default_account)
            .to(self.contract.address())
            .data(data)
            .nonce(nonce)
            .gas(self.gas.limit)
            .gas_price(self.gas.price)
            .chain_id(self.chain_id)
            .into();

        let signature = self
            .wallet
            .sign_transaction(&tx)
            .await
            .map_err(|e| AppError::Ledger(format!("Failed to sign transaction: {}", e)))?;

        let pending = self
            .provider
            .send_raw_transaction(tx.rlp_signed(&signature))
            .await
            .map_err(|e| AppError::Ledger(format!("Failed to send transaction: {}", e)))?;

        let hash = format_tx_hash(pending.tx_hash());
        tracing::debug!("{} submitted with nonce {}: {}", function, nonce, hash);
        Ok(hash)
    }
}

#[async_trait]
impl Ledger for EthLedgerClient {
    async fn borrower_exists(&self, address: Address) -> Result<bool, AppError> {
        let output = self.read("getBorrower", vec![Token::Address(address)]).await?;
        Ok(!first_uint(&output)?.is_zero())
    }

    async fn get_all_borrowers(&self) -> Result<OnChainBorrowers, AppError> {
        let output = self.read("getAllBorrowers", Vec::new()).await?;
        decode_all_borrowers(output)
    }

    async fn submit_add_or_update(
        &self,
        address: Address,
        terms: LoanTerms,
    ) -> Result<String, AppError> {
        let mut args = vec![Token::Address(address)];
        args.extend(terms_tokens(terms));
        self.submit("addOrUpdateBorrower", args).await
    }

    async fn validate_loan(&self, terms: LoanTerms) -> Result<bool, AppError> {
        match self.read("validateLoan", terms_tokens(terms)).await? {
            Token::Bool(valid) => Ok(valid),
            other => Err(AppError::Ledger(format!(
                "validateLoan returned unexpected output {:?}",
                other
            ))),
        }
    }

    async fn submit_status_update(
        &self,
        address: Address,
        status: LoanStatus,
    ) -> Result<String, AppError> {
        let args = vec![Token::Address(address), Token::Uint(U256::from(status.code()))];
        self.submit("updateLoanStatus", args).await
    }
}

fn terms_tokens(terms: LoanTerms) -> Vec<Token> {
    [
        terms.loan_amount,
        terms.mortgage_value,
        terms.monthly_income,
        terms.credit_score,
    ]
    .into_iter()
    .map(|value| Token::Uint(U256::from(value)))
    .collect()
}

fn saturating_u64(value: U256) -> u64 {
    if value > U256::from(u64::MAX) {
        u64::MAX
    } else {
        value.as_u64()
    }
}

fn expect_uint(token: &Token, field: &str) -> Result<U256, AppError> {
    match token {
        Token::Uint(value) | Token::Int(value) => Ok(*value),
        other => Err(AppError::Ledger(format!(
            "Expected uint for {}, got {:?}",
            field, other
        ))),
    }
}

fn first_uint(token: &Token) -> Result<U256, AppError> {
    match token {
        Token::Tuple(fields) => fields
            .first()
            .ok_or_else(|| AppError::Ledger("Empty borrower tuple".to_string()))
            .and_then(|t| expect_uint(t, "loanAmount")),
        other => expect_uint(other, "loanAmount"),
    }
}

/// Decodes `[loanAmount, loanStatus, mortgageValue, monthlyIncome, creditScore]`.
fn decode_details(token: &Token) -> Result<BorrowerDetails, AppError> {
    let Token::Tuple(fields) = token else {
        return Err(AppError::Ledger(format!(
            "Expected borrower tuple, got {:?}",
            token
        )));
    };
    if fields.len() < 5 {
        return Err(AppError::Ledger(format!(
            "Borrower tuple has {} fields, expected 5",
            fields.len()
        )));
    }

    let status = saturating_u64(expect_uint(&fields[1], "loanStatus")?);
    Ok(BorrowerDetails {
        loan_amount: saturating_u64(expect_uint(&fields[0], "loanAmount")?),
        loan_status: LoanStatus::from_code(u8::try_from(status).unwrap_or(u8::MAX)),
        mortgage_value: saturating_u64(expect_uint(&fields[2], "mortgageValue")?),
        monthly_income: saturating_u64(expect_uint(&fields[3], "monthlyIncome")?),
        credit_score: saturating_u64(expect_uint(&fields[4], "creditScore")?),
    })
}

/// Decodes the `(address[], Borrower[])` output of `getAllBorrowers`.
fn decode_all_borrowers(token: Token) -> Result<OnChainBorrowers, AppError> {
    let Token::Tuple(mut outputs) = token else {
        return Err(AppError::Ledger(format!(
            "getAllBorrowers returned unexpected output {:?}",
            token
        )));
    };
    if outputs.len() != 2 {
        return Err(AppError::Ledger(format!(
            "getAllBorrowers returned {} outputs, expected 2",
            outputs.len()
        )));
    }

    let details_token = outputs.remove(1);
    let addresses_token = outputs.remove(0);

    let addresses = match addresses_token {
        Token::Array(items) | Token::FixedArray(items) => items
            .into_iter()
            .map(|item| match item {
                Token::Address(address) => Ok(address),
                other => Err(AppError::Ledger(format!(
                    "Expected address, got {:?}",
                    other
                ))),
            })
            .collect::<Result<Vec<_>, _>>()?,
        other => {
            return Err(AppError::Ledger(format!(
                "Expected address array, got {:?}",
                other
            )))
        }
    };

    let details = match details_token {
        Token::Array(items) | Token::FixedArray(items) => items
            .iter()
            .map(decode_details)
            .collect::<Result<Vec<_>, _>>()?,
        other => {
            return Err(AppError::Ledger(format!(
                "Expected borrower array, got {:?}",
                other
            )))
        }
    };

    if addresses.len() != details.len() {
        return Err(AppError::Ledger(format!(
            "getAllBorrowers returned {} addresses but {} detail entries",
            addresses.len(),
            details.len()
        )));
    }

    Ok(OnChainBorrowers { addresses, details })
}
