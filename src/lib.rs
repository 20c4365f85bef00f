//! Loan Ledger Sync Library
//!
//! This library syncs borrower records from an external mock-data provider
//! into the loan verification contract and exposes read/update endpoints
//! over HTTP.
//!
//! # Modules
//!
//! - `config`: Configuration management.
//! - `data_source`: Client for the external data provider.
//! - `errors`: Error handling types.
//! - `handlers`: HTTP request handlers and router.
//! - `ledger`: Contract client (reads, signed transactions, nonce handling).
//! - `loan_status`: Loan status re-validation workflow.
//! - `models`: Borrower, row and response models.
//! - `normalizer`: Field coercion for provider data.
//! - `retry`: Fixed-delay retry policy.
//! - `sync`: Provider-to-ledger sync workflow.

pub mod config;
pub mod data_source;
pub mod errors;
pub mod handlers;
pub mod ledger;
pub mod loan_status;
pub mod models;
pub mod normalizer;
pub mod retry;
pub mod sync;
