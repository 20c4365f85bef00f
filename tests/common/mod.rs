//! Shared helpers for integration tests: an in-memory ledger and test config.
#![allow(dead_code)]

use async_trait::async_trait;
use ethers::types::{Address, H256};
use loan_ledger_sync::config::Config;
use loan_ledger_sync::errors::AppError;
use loan_ledger_sync::ledger::{format_tx_hash, Ledger};
use loan_ledger_sync::models::{BorrowerDetails, LoanStatus, LoanTerms, OnChainBorrowers};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

pub type ValidateFn = Box<dyn Fn(LoanTerms) -> Result<bool, AppError> + Send + Sync>;

/// In-memory stand-in for the contract.
pub struct FakeLedger {
    pub state: Mutex<FakeState>,
    validate: ValidateFn,
}

#[derive(Default)]
pub struct FakeState {
    pub borrowers: Vec<(Address, BorrowerDetails)>,
    /// Submitted borrowers become visible to later existence checks.
    pub mine_immediately: bool,
    pub fail_exists: HashSet<Address>,
    pub fail_submit: HashSet<Address>,
    /// Remaining failures before `submit_status_update` succeeds, per address.
    pub status_failures: HashMap<Address, u32>,
    pub fail_reads: bool,
    pub exists_calls: u32,
    pub read_calls: u32,
    pub validate_calls: u32,
    pub status_calls: u32,
    pub submitted: Vec<(Address, LoanTerms)>,
    pub status_updates: Vec<(Address, LoanStatus)>,
    tx_counter: u64,
}

impl FakeState {
    fn next_hash(&mut self) -> String {
        self.tx_counter += 1;
        format_tx_hash(H256::from_low_u64_be(self.tx_counter))
    }

    pub fn total_calls(&self) -> u32 {
        self.exists_calls
            + self.read_calls
            + self.validate_calls
            + self.status_calls
            + self.submitted.len() as u32
    }
}

impl FakeLedger {
    pub fn new() -> Self {
        Self::with_validator(Box::new(|_: LoanTerms| Ok(true)))
    }

    pub fn with_validator(validate: ValidateFn) -> Self {
        Self {
            state: Mutex::new(FakeState {
                mine_immediately: true,
                ..FakeState::default()
            }),
            validate,
        }
    }

    pub fn with_borrowers(self, borrowers: Vec<(Address, BorrowerDetails)>) -> Self {
        self.state.lock().unwrap().borrowers = borrowers;
        self
    }

    pub fn state(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }
}

#[async_trait]
impl Ledger for FakeLedger {
    async fn borrower_exists(&self, address: Address) -> Result<bool, AppError> {
        let mut state = self.state();
        state.exists_calls += 1;
        if state.fail_exists.contains(&address) {
            return Err(AppError::Ledger("getBorrower call failed: reverted".to_string()));
        }
        Ok(state
            .borrowers
            .iter()
            .any(|(a, details)| *a == address && details.loan_amount > 0))
    }

    async fn get_all_borrowers(&self) -> Result<OnChainBorrowers, AppError> {
        let mut state = self.state();
        state.read_calls += 1;
        if state.fail_reads {
            return Err(AppError::Ledger("connection refused".to_string()));
        }
        Ok(OnChainBorrowers {
            addresses: state.borrowers.iter().map(|(a, _)| *a).collect(),
            details: state.borrowers.iter().map(|(_, d)| *d).collect(),
        })
    }

    async fn submit_add_or_update(
        &self,
        address: Address,
        terms: LoanTerms,
    ) -> Result<String, AppError> {
        let mut state = self.state();
        if state.fail_submit.contains(&address) {
            return Err(AppError::Ledger("Failed to send transaction: nonce too low".to_string()));
        }
        state.submitted.push((address, terms));
        if state.mine_immediately {
            state.borrowers.push((address, details(terms, LoanStatus::Pending)));
        }
        Ok(state.next_hash())
    }

    async fn validate_loan(&self, terms: LoanTerms) -> Result<bool, AppError> {
        self.state().validate_calls += 1;
        (self.validate)(terms)
    }

    async fn submit_status_update(
        &self,
        address: Address,
        status: LoanStatus,
    ) -> Result<String, AppError> {
        let mut state = self.state();
        state.status_calls += 1;
        if let Some(remaining) = state.status_failures.get_mut(&address) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(AppError::Ledger("Failed to send transaction: timeout".to_string()));
            }
        }
        state.status_updates.push((address, status));
        Ok(state.next_hash())
    }
}

pub fn address(n: u64) -> Address {
    Address::from_low_u64_be(n)
}

/// Lowercase `0x` form, as the provider returns it.
pub fn address_str(n: u64) -> String {
    format!("0x{}", hex::encode(address(n).as_bytes()))
}

pub fn terms(loan_amount: u64) -> LoanTerms {
    LoanTerms {
        loan_amount,
        mortgage_value: loan_amount * 2,
        monthly_income: 4000,
        credit_score: 700,
    }
}

pub fn details(terms: LoanTerms, loan_status: LoanStatus) -> BorrowerDetails {
    BorrowerDetails {
        loan_amount: terms.loan_amount,
        loan_status,
        mortgage_value: terms.mortgage_value,
        monthly_income: terms.monthly_income,
        credit_score: terms.credit_score,
    }
}

pub const CSV_HEADER: &str =
    "id,Borrower_Address,Loan_Amount,Mortgage_Value,Monthly_Income,Credit_Score\n";

/// One CSV line for borrower `n` with valid numeric fields.
pub fn csv_line(n: u64) -> String {
    format!("{},{},{},{},4000,700\n", n, address_str(n), n * 1000, n * 2000)
}

/// Test configuration with zero retry delay.
pub fn test_config(data_source_url: &str) -> Config {
    test_config_with(data_source_url, &[])
}

/// Same as [`test_config`] with additional variables.
pub fn test_config_with(data_source_url: &str, extra: &[(&str, String)]) -> Config {
    let mut vars: HashMap<&str, String> = [
        (
            "PRIVATE_KEY",
            "4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318".to_string(),
        ),
        (
            "SEPOLIA_ACCOUNT",
            "0x2c7536E3605D9C16a7a3D7b1898e529396a65c23".to_string(),
        ),
        ("DATA_SOURCE_URL", data_source_url.to_string()),
        ("RETRY_DELAY_MS", "0".to_string()),
    ]
    .into_iter()
    .collect();
    vars.extend(extra.iter().cloned());

    Config::from_lookup(|key: &str| vars.get(key).cloned()).expect("test config")
}
