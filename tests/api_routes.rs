/// HTTP route tests driven through the router without a listening socket
mod common;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use common::*;
use loan_ledger_sync::data_source::DataSourceClient;
use loan_ledger_sync::handlers::{router, AppState};
use loan_ledger_sync::models::LoanStatus;
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

fn app(ledger: Arc<FakeLedger>, data_source_url: &str) -> Router {
    let config = test_config(data_source_url);
    let data_source = DataSourceClient::new(&config).unwrap();
    router(Arc::new(AppState {
        config,
        ledger,
        data_source,
    }))
}

async fn send(app: Router, method: Method, uri: &str) -> (StatusCode, Value) {
    let response = app
        .oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

#[tokio::test]
async fn test_health() {
    let app = app(Arc::new(FakeLedger::new()), "http://127.0.0.1:9");

    let (status, body) = send(app, Method::GET, "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "loan-ledger-sync");
}

#[tokio::test]
async fn test_options_never_touches_ledger_or_provider() {
    let provider = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string(CSV_HEADER))
        .expect(0)
        .mount(&provider)
        .await;
    let ledger = Arc::new(FakeLedger::new());

    for uri in [
        "/api/sync-all",
        "/api/get-all-borrowers",
        "/api/update-all-loan-statuses",
    ] {
        let (status, _) = send(app(ledger.clone(), &provider.uri()), Method::OPTIONS, uri).await;
        assert_eq!(status, StatusCode::OK, "OPTIONS {}", uri);
    }

    assert_eq!(ledger.state().total_calls(), 0);
    assert!(provider.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_browser_preflight_allows_configured_origin() {
    let app = app(Arc::new(FakeLedger::new()), "http://127.0.0.1:9");

    let response = app
        .oneshot(
            Request::builder()
                .method(Method::OPTIONS)
                .uri("/api/sync-all")
                .header(header::ORIGIN, "http://localhost:3000")
                .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .unwrap(),
        "http://localhost:3000"
    );
}

#[tokio::test]
async fn test_get_all_borrowers_empty_ledger() {
    let app = app(Arc::new(FakeLedger::new()), "http://127.0.0.1:9");

    let (status, body) = send(app, Method::GET, "/api/get-all-borrowers").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "No borrowers found");
    assert!(body.get("borrowers").is_none());
}

#[tokio::test]
async fn test_get_all_borrowers_lists_records() {
    let ledger = Arc::new(FakeLedger::new().with_borrowers(vec![
        (address(1), details(terms(10_000), LoanStatus::Pending)),
        (address(2), details(terms(20_000), LoanStatus::Approved)),
    ]));
    let app = app(ledger, "http://127.0.0.1:9");

    let (status, body) = send(app, Method::GET, "/api/get-all-borrowers").await;

    assert_eq!(status, StatusCode::OK);
    let borrowers = body["borrowers"].as_array().unwrap();
    assert_eq!(borrowers.len(), 2);
    assert_eq!(
        borrowers[0]["address"].as_str().unwrap().to_lowercase(),
        address_str(1)
    );
    assert_eq!(borrowers[0]["loanAmount"], 10_000);
    assert_eq!(borrowers[0]["mortgageValue"], 20_000);
    assert_eq!(borrowers[1]["loanStatus"], "Approved");
}

#[tokio::test]
async fn test_get_all_borrowers_ledger_failure_is_500() {
    let ledger = Arc::new(FakeLedger::new());
    ledger.state().fail_reads = true;
    let app = app(ledger.clone(), "http://127.0.0.1:9");

    let (status, body) = send(app, Method::GET, "/api/get-all-borrowers").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"]
        .as_str()
        .unwrap()
        .contains("Failed to read borrowers from ledger"));
    assert_eq!(ledger.state().read_calls, 5);
}

#[tokio::test]
async fn test_sync_all_returns_transactions() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/csv")
                .set_body_string(format!("{}{}{}", CSV_HEADER, csv_line(1), csv_line(2))),
        )
        .mount(&mock_server)
        .await;
    let ledger = Arc::new(FakeLedger::new());
    let app = app(ledger.clone(), &mock_server.uri());

    let (status, body) = send(app, Method::POST, "/api/sync-all").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "All borrowers synced successfully");
    assert_eq!(body["transactions"].as_array().unwrap().len(), 2);
    assert_eq!(ledger.state().submitted.len(), 2);
}

#[tokio::test]
async fn test_sync_all_with_unreachable_provider_still_succeeds() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&mock_server)
        .await;
    let app = app(Arc::new(FakeLedger::new()), &mock_server.uri());

    let (status, body) = send(app, Method::POST, "/api/sync-all").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["transactions"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_update_all_loan_statuses() {
    let ledger = Arc::new(FakeLedger::new().with_borrowers(vec![(
        address(1),
        details(terms(10_000), LoanStatus::Pending),
    )]));
    let app = app(ledger.clone(), "http://127.0.0.1:9");

    let (status, body) = send(app, Method::POST, "/api/update-all-loan-statuses").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "All loan statuses updated successfully");
    assert_eq!(body["transactions"].as_array().unwrap().len(), 1);
    assert_eq!(body["undetermined"].as_array().unwrap().len(), 0);
    assert_eq!(
        ledger.state().status_updates,
        vec![(address(1), LoanStatus::Approved)]
    );
}

#[tokio::test]
async fn test_update_all_loan_statuses_read_failure_is_500() {
    let ledger = Arc::new(FakeLedger::new());
    ledger.state().fail_reads = true;
    let app = app(ledger, "http://127.0.0.1:9");

    let (status, body) = send(app, Method::POST, "/api/update-all-loan-statuses").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_wrong_method_rejected() {
    let app = app(Arc::new(FakeLedger::new()), "http://127.0.0.1:9");

    let (status, _) = send(app, Method::GET, "/api/sync-all").await;

    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
}
