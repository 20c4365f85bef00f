use crate::config::UndeterminedPolicy;
use crate::errors::{AppError, ResultExt};
use crate::ledger::Ledger;
use crate::models::{LoanStatus, LoanTerms};
use crate::retry::RetryPolicy;
use ethers::types::Address;
use ethers::utils::to_checksum;
use std::sync::Arc;

/// Outcome of the contract's eligibility check for one borrower.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eligibility {
    Eligible,
    Ineligible,
    /// Every validation attempt failed.
    Undetermined,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusUpdateOutcome {
    pub transactions: Vec<String>,
    pub undetermined: Vec<String>,
}

/// Re-evaluates every on-chain borrower and records the resulting status.
pub struct LoanStatusService {
    ledger: Arc<dyn Ledger>,
    retry: RetryPolicy,
    undetermined_policy: UndeterminedPolicy,
}

impl LoanStatusService {
    pub fn new(
        ledger: Arc<dyn Ledger>,
        retry: RetryPolicy,
        undetermined_policy: UndeterminedPolicy,
    ) -> Self {
        Self {
            ledger,
            retry,
            undetermined_policy,
        }
    }

    /// Validates each borrower in ledger order and submits its new status.
    ///
    /// Only the initial read can fail the whole operation. A borrower whose
    /// submission fails after all retries is skipped.
    pub async fn update_all_loan_statuses(&self) -> Result<StatusUpdateOutcome, AppError> {
        tracing::info!("Starting update of all loan statuses...");

        let borrowers = self
            .retry
            .run("getAllBorrowers", || self.ledger.get_all_borrowers())
            .await
            .context("Failed to read borrowers from ledger")?;

        let mut outcome = StatusUpdateOutcome::default();

        for (address, details) in borrowers.iter() {
            let checksummed = to_checksum(address, None);
            let terms = details.terms();
            tracing::info!("Processing borrower: {} ({:?})", checksummed, terms);

            let status = match self.check_eligibility(&checksummed, terms).await {
                Eligibility::Eligible => LoanStatus::Approved,
                Eligibility::Ineligible => LoanStatus::Rejected,
                Eligibility::Undetermined => {
                    outcome.undetermined.push(checksummed.clone());
                    match self.undetermined_policy {
                        UndeterminedPolicy::Reject => LoanStatus::Rejected,
                        UndeterminedPolicy::Skip => {
                            tracing::warn!(
                                "Eligibility undetermined for {}, leaving status unchanged",
                                checksummed
                            );
                            continue;
                        }
                    }
                }
            };
            tracing::info!("Loan validation result for {}: {:?}", checksummed, status);

            if let Some(tx_hash) = self.submit_status(*address, &checksummed, status).await {
                outcome.transactions.push(tx_hash);
            }
        }

        tracing::info!(
            "Loan status update complete: {} transactions, {} undetermined",
            outcome.transactions.len(),
            outcome.undetermined.len()
        );
        Ok(outcome)
    }

    async fn check_eligibility(&self, checksummed: &str, terms: LoanTerms) -> Eligibility {
        let label = format!("validation for {}", checksummed);
        match self
            .retry
            .run(&label, || self.ledger.validate_loan(terms))
            .await
        {
            Ok(true) => Eligibility::Eligible,
            Ok(false) => Eligibility::Ineligible,
            Err(_) => Eligibility::Undetermined,
        }
    }

    async fn submit_status(
        &self,
        address: Address,
        checksummed: &str,
        status: LoanStatus,
    ) -> Option<String> {
        let label = format!("transaction for {}", checksummed);
        match self
            .retry
            .run(&label, || self.ledger.submit_status_update(address, status))
            .await
        {
            Ok(tx_hash) => {
                tracing::info!("Transaction successful for {}, Tx Hash: {}", checksummed, tx_hash);
                Some(tx_hash)
            }
            Err(e) => {
                tracing::error!("Error processing borrower {}: {}", checksummed, e);
                None
            }
        }
    }
}
