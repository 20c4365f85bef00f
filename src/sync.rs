use crate::data_source::DataSourceClient;
use crate::ledger::{checksum_address, Ledger};
use crate::models::{RawSourceRow, SourceBorrower};
use ethers::types::Address;
use ethers::utils::to_checksum;
use std::collections::HashSet;
use std::sync::Arc;

/// Why a source record did not produce a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    MissingAddress,
    MalformedAddress,
    AlreadyOnChain,
    DuplicateInBatch,
    InvalidData,
    SubmissionFailed,
}

/// Copies provider records onto the ledger, creating borrowers that are not there yet.
pub struct SyncService {
    data_source: DataSourceClient,
    ledger: Arc<dyn Ledger>,
    batch_size: usize,
}

impl SyncService {
    pub fn new(data_source: DataSourceClient, ledger: Arc<dyn Ledger>, batch_size: usize) -> Self {
        Self {
            data_source,
            ledger,
            batch_size,
        }
    }

    /// Fetches one batch from the provider and syncs it.
    ///
    /// Returns the transaction hashes in submission order. Per-record failures
    /// are logged and skipped.
    pub async fn sync_all(&self) -> Vec<String> {
        tracing::info!("Starting sync-all process...");
        let rows = self.data_source.fetch_records(self.batch_size).await;
        tracing::info!("Loaded {} borrowers from data source", rows.len());
        self.sync_rows(rows).await
    }

    pub async fn sync_rows(&self, rows: Vec<RawSourceRow>) -> Vec<String> {
        let batch = sorted_batch(rows, self.batch_size);
        let mut submitted = HashSet::new();
        let mut transactions = Vec::new();

        for borrower in &batch {
            match self.sync_one(borrower, &submitted).await {
                Ok((address, tx_hash)) => {
                    submitted.insert(address);
                    transactions.push(tx_hash);
                }
                Err(reason) => {
                    tracing::debug!("Borrower '{}' skipped: {:?}", borrower.address, reason);
                }
            }
        }

        tracing::info!(
            "Sync complete: {} of {} borrowers submitted",
            transactions.len(),
            batch.len()
        );
        transactions
    }

    async fn sync_one(
        &self,
        borrower: &SourceBorrower,
        submitted: &HashSet<Address>,
    ) -> Result<(Address, String), SkipReason> {
        if borrower.address.is_empty() {
            tracing::info!("Skipping borrower due to missing address: {:?}", borrower);
            return Err(SkipReason::MissingAddress);
        }

        let address = checksum_address(&borrower.address).map_err(|e| {
            tracing::warn!("Skipping borrower: {}", e);
            SkipReason::MalformedAddress
        })?;
        let checksummed = to_checksum(&address, None);

        if submitted.contains(&address) {
            tracing::info!("Skipping duplicate borrower in this batch: {}", checksummed);
            return Err(SkipReason::DuplicateInBatch);
        }

        match self.ledger.borrower_exists(address).await {
            Ok(true) => {
                tracing::info!("Skipping existing borrower: {}", checksummed);
                return Err(SkipReason::AlreadyOnChain);
            }
            Ok(false) => {}
            Err(e) => {
                tracing::warn!(
                    "Existence check failed for {}, adding as new. Error: {}",
                    checksummed,
                    e
                );
            }
        }

        if borrower.is_all_zero() {
            tracing::info!("Skipping borrower due to invalid data: {:?}", borrower);
            return Err(SkipReason::InvalidData);
        }

        match self.ledger.submit_add_or_update(address, borrower.terms()).await {
            Ok(tx_hash) => {
                tracing::info!("Transaction successful for {}, Tx Hash: {}", checksummed, tx_hash);
                Ok((address, tx_hash))
            }
            Err(e) => {
                tracing::error!("Error processing borrower {}: {}", checksummed, e);
                Err(SkipReason::SubmissionFailed)
            }
        }
    }
}

/// Normalizes, sorts by address and bounds a fetched batch.
///
/// The sort key is the trimmed address compared case-insensitively, ties
/// broken by the trimmed address itself, so the order is fully deterministic.
pub fn sorted_batch(rows: Vec<RawSourceRow>, limit: usize) -> Vec<SourceBorrower> {
    let mut batch: Vec<SourceBorrower> = rows.iter().map(SourceBorrower::from_row).collect();
    batch.sort_by(|a, b| {
        a.address
            .to_ascii_lowercase()
            .cmp(&b.address.to_ascii_lowercase())
            .then_with(|| a.address.cmp(&b.address))
    });
    batch.truncate(limit);
    batch
}
