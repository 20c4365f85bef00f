use crate::normalizer::to_non_negative_int;
use ethers::types::Address;
use ethers::utils::to_checksum;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ============ Ledger Models ============

/// Loan status as stored by the contract (`uint8`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoanStatus {
    Pending,
    Approved,
    Rejected,
}

impl LoanStatus {
    /// Maps an on-chain code to a status. Unknown codes read back as `Rejected`.
    pub fn from_code(code: u8) -> Self {
        match code {
            0 => LoanStatus::Pending,
            1 => LoanStatus::Approved,
            _ => LoanStatus::Rejected,
        }
    }

    /// The code passed to `updateLoanStatus`.
    pub fn code(self) -> u8 {
        match self {
            LoanStatus::Pending => 0,
            LoanStatus::Approved => 1,
            LoanStatus::Rejected => 2,
        }
    }
}

/// The four numeric inputs to the contract's loan rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoanTerms {
    pub loan_amount: u64,
    pub mortgage_value: u64,
    pub monthly_income: u64,
    pub credit_score: u64,
}

/// Loan attributes of one borrower as held by the contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BorrowerDetails {
    pub loan_amount: u64,
    pub loan_status: LoanStatus,
    pub mortgage_value: u64,
    pub monthly_income: u64,
    pub credit_score: u64,
}

impl BorrowerDetails {
    pub fn terms(&self) -> LoanTerms {
        LoanTerms {
            loan_amount: self.loan_amount,
            mortgage_value: self.mortgage_value,
            monthly_income: self.monthly_income,
            credit_score: self.credit_score,
        }
    }
}

/// Result of `getAllBorrowers()`: parallel address and detail lists.
#[derive(Debug, Clone, Default)]
pub struct OnChainBorrowers {
    pub addresses: Vec<Address>,
    pub details: Vec<BorrowerDetails>,
}

impl OnChainBorrowers {
    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }

    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    /// Pairs each address with its details, in ledger order.
    pub fn iter(&self) -> impl Iterator<Item = (&Address, &BorrowerDetails)> {
        self.addresses.iter().zip(self.details.iter())
    }

    pub fn into_records(self) -> Vec<BorrowerRecord> {
        self.addresses
            .into_iter()
            .zip(self.details)
            .map(|(address, details)| BorrowerRecord::from_ledger(&address, details))
            .collect()
    }
}

/// A borrower as exposed over the HTTP API.
///
/// The address is the unique key both off-chain and on-chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BorrowerRecord {
    /// EIP-55 checksummed address.
    pub address: String,
    pub loan_amount: u64,
    pub loan_status: LoanStatus,
    pub mortgage_value: u64,
    pub monthly_income: u64,
    pub credit_score: u64,
}

impl BorrowerRecord {
    pub fn from_ledger(address: &Address, details: BorrowerDetails) -> Self {
        Self {
            address: to_checksum(address, None),
            loan_amount: details.loan_amount,
            loan_status: details.loan_status,
            mortgage_value: details.mortgage_value,
            monthly_income: details.monthly_income,
            credit_score: details.credit_score,
        }
    }
}

// ============ Data Source Models ============

pub const COL_ADDRESS: &str = "Borrower_Address";
pub const COL_LOAN_AMOUNT: &str = "Loan_Amount";
pub const COL_MORTGAGE_VALUE: &str = "Mortgage_Value";
pub const COL_MONTHLY_INCOME: &str = "Monthly_Income";
pub const COL_CREDIT_SCORE: &str = "Credit_Score";

/// One untyped row as received from the data provider.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawSourceRow {
    pub columns: BTreeMap<String, String>,
}

impl RawSourceRow {
    pub fn get(&self, column: &str) -> Option<&str> {
        self.columns.get(column).map(String::as_str)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for RawSourceRow {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            columns: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Fixed-shape borrower record built from a [`RawSourceRow`].
///
/// The address is trimmed but not yet validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceBorrower {
    pub address: String,
    pub loan_amount: u64,
    pub mortgage_value: u64,
    pub monthly_income: u64,
    pub credit_score: u64,
}

impl SourceBorrower {
    pub fn from_row(row: &RawSourceRow) -> Self {
        Self {
            address: row.get(COL_ADDRESS).unwrap_or_default().trim().to_string(),
            loan_amount: to_non_negative_int(row.get(COL_LOAN_AMOUNT)),
            mortgage_value: to_non_negative_int(row.get(COL_MORTGAGE_VALUE)),
            monthly_income: to_non_negative_int(row.get(COL_MONTHLY_INCOME)),
            credit_score: to_non_negative_int(row.get(COL_CREDIT_SCORE)),
        }
    }

    pub fn terms(&self) -> LoanTerms {
        LoanTerms {
            loan_amount: self.loan_amount,
            mortgage_value: self.mortgage_value,
            monthly_income: self.monthly_income,
            credit_score: self.credit_score,
        }
    }

    /// True when every numeric field normalized to 0, which we treat as garbage.
    pub fn is_all_zero(&self) -> bool {
        self.loan_amount == 0
            && self.mortgage_value == 0
            && self.monthly_income == 0
            && self.credit_score == 0
    }
}

// ============ API Models ============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncResponse {
    pub message: String,
    pub transactions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusUpdateResponse {
    pub message: String,
    pub transactions: Vec<String>,
    /// Borrowers whose eligibility could not be determined after all retries.
    pub undetermined: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BorrowersResponse {
    pub borrowers: Vec<BorrowerRecord>,
}
