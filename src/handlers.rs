use crate::config::Config;
use crate::data_source::DataSourceClient;
use crate::errors::{AppError, ResultExt};
use crate::ledger::Ledger;
use crate::loan_status::LoanStatusService;
use crate::models::{BorrowersResponse, StatusUpdateResponse, SyncResponse};
use crate::sync::SyncService;
use axum::{
    extract::State,
    http::{HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    trace::TraceLayer,
};

/// Shared application state injected into handlers.
///
/// Built once at startup and read-only afterwards.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Config,
    /// Ledger the borrowers are synced to.
    pub ledger: Arc<dyn Ledger>,
    /// Client for the external mock-data provider.
    pub data_source: DataSourceClient,
}

/// Builds the HTTP application with all routes and middleware.
///
/// # Arguments
///
/// * `state` - Shared state handed to every handler.
///
/// # Returns
///
/// * `Router` - `/health` plus the three `/api` routes, wrapped in tracing
///   and CORS layers. CORS answers browser preflights before routing.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = cors_layer(&state.config.cors_allowed_origins);

    let api_routes = Router::new()
        .route("/api/sync-all", post(sync_all).options(preflight))
        .route(
            "/api/get-all-borrowers",
            get(get_all_borrowers).options(preflight),
        )
        .route(
            "/api/update-all-loan-statuses",
            post(update_all_loan_statuses).options(preflight),
        )
        // Endpoints take no body
        .layer(ServiceBuilder::new().layer(RequestBodyLimitLayer::new(64 * 1024)));

    Router::new()
        .route("/health", get(health))
        .merge(api_routes)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

/// CORS for the configured origins. `*` allows any origin.
///
/// Origins that are not valid header values are skipped with a warning.
///
/// # Returns
///
/// * `CorsLayer` - Allows the listed origins, any header and the common methods.
pub fn cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(origins.iter().filter_map(|origin| {
            match HeaderValue::from_str(origin) {
                Ok(value) => Some(value),
                Err(_) => {
                    tracing::warn!("Ignoring invalid CORS origin: {}", origin);
                    None
                }
            }
        }))
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([
            Method::OPTIONS,
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
        ])
        .allow_headers(Any)
}

/// Health check endpoint.
///
/// Reports the service name and version. Does not contact the ledger.
///
/// # Returns
///
/// * `(StatusCode, Json<serde_json::Value>)` - HTTP 200 OK with health status JSON.
pub async fn health() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "loan-ledger-sync",
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
}

/// OPTIONS on any API route. Never touches the ledger or data source.
///
/// # Returns
///
/// * `(StatusCode, Json<serde_json::Value>)` - HTTP 200 OK with a confirmation message.
pub async fn preflight() -> (StatusCode, Json<serde_json::Value>) {
    tracing::debug!("CORS preflight request received");
    (
        StatusCode::OK,
        Json(json!({ "message": "CORS preflight successful" })),
    )
}

/// POST /api/sync-all
///
/// Pulls one batch from the data provider and creates the borrowers missing
/// on-chain. Provider and per-borrower failures are logged and skipped.
///
/// # Arguments
///
/// * `state` - Shared state with the ledger, data source and batch size.
///
/// # Returns
///
/// * `Json<SyncResponse>` - HTTP 200 with the submitted transaction hashes,
///   possibly empty.
pub async fn sync_all(State(state): State<Arc<AppState>>) -> Json<SyncResponse> {
    let service = SyncService::new(
        state.data_source.clone(),
        state.ledger.clone(),
        state.config.sync_batch_size,
    );
    let transactions = service.sync_all().await;

    Json(SyncResponse {
        message: "All borrowers synced successfully".to_string(),
        transactions,
    })
}

/// GET /api/get-all-borrowers
///
/// An empty ledger is not an error: it answers 200 with a message instead
/// of a borrower list.
///
/// # Arguments
///
/// * `state` - Shared state with the ledger and retry policy.
///
/// # Returns
///
/// * `Result<Response, AppError>` - The borrower records, the empty-ledger
///   message, or a 500 once the retries are exhausted.
pub async fn get_all_borrowers(State(state): State<Arc<AppState>>) -> Result<Response, AppError> {
    let borrowers = state
        .config
        .retry
        .run("getAllBorrowers", || state.ledger.get_all_borrowers())
        .await
        .context("Failed to read borrowers from ledger")?;

    tracing::debug!("Fetched {} borrowers from ledger", borrowers.len());

    if borrowers.is_empty() {
        return Ok((
            StatusCode::OK,
            Json(json!({ "message": "No borrowers found" })),
        )
            .into_response());
    }

    Ok(Json(BorrowersResponse {
        borrowers: borrowers.into_records(),
    })
    .into_response())
}

/// POST /api/update-all-loan-statuses
///
/// Re-evaluates every borrower on the ledger against the contract's eligibility
/// rule and submits the resulting status.
///
/// # Arguments
///
/// * `state` - Shared state with the ledger, retry policy and undetermined policy.
///
/// # Returns
///
/// * `Result<Json<StatusUpdateResponse>, AppError>` - The submitted hashes and
///   the borrowers left undetermined, or an error if the borrower list could
///   not be read.
pub async fn update_all_loan_statuses(
    State(state): State<Arc<AppState>>,
) -> Result<Json<StatusUpdateResponse>, AppError> {
    let service = LoanStatusService::new(
        state.ledger.clone(),
        state.config.retry,
        state.config.undetermined_policy,
    );
    let outcome = service.update_all_loan_statuses().await?;

    Ok(Json(StatusUpdateResponse {
        message: "All loan statuses updated successfully".to_string(),
        transactions: outcome.transactions,
        undetermined: outcome.undetermined,
    }))
}
