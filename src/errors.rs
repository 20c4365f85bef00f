use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::fmt;

/// Failures surfaced by the ledger client, the data provider and the handlers.
#[derive(Debug, Clone)]
pub enum AppError {
    /// Ledger-side failure: the RPC node refused or timed out, ABI
    /// encoding or decoding failed, signing failed, or a contract call
    /// reverted. Carries the underlying message.
    Ledger(String),
    /// Error fetching or decoding data from the external provider.
    ///
    /// The sync workflow absorbs these into an empty batch, so they only
    /// reach a response through code that calls the provider directly.
    DataSource(String),
    /// An error wrapped with the operation that was being attempted.
    WithContext {
        /// The error being wrapped.
        source: Box<AppError>,
        /// Description of the failed operation, printed before the source.
        context: String,
    },
}

impl fmt::Display for AppError {
    /// Formats the error for API responses and logs.
    ///
    /// Context chains print outermost first, e.g.
    /// `Failed to read borrowers: Ledger error: connection refused`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Ledger(msg) => write!(f, "Ledger error: {}", msg),
            AppError::DataSource(msg) => write!(f, "Data source error: {}", msg),
            AppError::WithContext { source, context } => {
                write!(f, "{}: {}", context, source)
            }
        }
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    /// Converts the error into an HTTP response.
    ///
    /// Logs the error, then answers 500 with a JSON body of the form
    /// `{ "error": "<message>" }`. Every variant maps to the same status.
    ///
    /// # Returns
    ///
    /// * `Response` - HTTP 500 with the error message as JSON.
    fn into_response(self) -> Response {
        match &self {
            AppError::Ledger(msg) => tracing::error!("Ledger error: {}", msg),
            AppError::DataSource(msg) => tracing::error!("Data source error: {}", msg),
            AppError::WithContext { source, context } => {
                tracing::error!("Error with context: {} -> {}", context, source)
            }
        }

        let body = Json(json!({
            "error": self.to_string(),
        }));

        (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
    }
}

impl From<ethers::abi::AbiError> for AppError {
    /// ABI failures are ledger failures.
    fn from(err: ethers::abi::AbiError) -> Self {
        AppError::Ledger(format!("ABI error: {}", err))
    }
}

/// Prefixes an `AppError` with the operation that failed.
pub trait ResultExt<T> {
    /// Wraps the error, if any, in `AppError::WithContext`.
    ///
    /// # Arguments
    ///
    /// * `context` - Description of the operation that was being attempted.
    ///
    /// # Returns
    ///
    /// * `Result<T, AppError>` - The value unchanged, or the wrapped error.
    fn context(self, context: impl Into<String>) -> Result<T, AppError>;
}

impl<T> ResultExt<T> for Result<T, AppError> {
    fn context(self, context: impl Into<String>) -> Result<T, AppError> {
        self.map_err(|e| AppError::WithContext {
            source: Box::new(e),
            context: context.into(),
        })
    }
}
