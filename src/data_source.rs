use crate::config::Config;
use crate::errors::AppError;
use crate::models::RawSourceRow;
use reqwest::header::CONTENT_TYPE;
use serde_json::{Map, Value};
use std::time::Duration;

/// Client for the external mock-data provider.
///
/// Failures never propagate: an unreachable provider or unreadable body yields
/// an empty batch, which callers treat as "nothing to sync".
#[derive(Clone)]
pub struct DataSourceClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    seed: u64,
}

impl DataSourceClient {
    pub fn new(config: &Config) -> Result<Self, AppError> {
        Self::with_base_url(
            config.data_source_url.clone(),
            config.data_source_key.clone(),
            config.data_source_seed,
        )
    }

    pub fn with_base_url(
        base_url: String,
        api_key: Option<String>,
        seed: u64,
    ) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| {
                AppError::DataSource(format!("Failed to create data source client: {}", e))
            })?;

        Ok(Self {
            client,
            base_url,
            api_key,
            seed,
        })
    }

    /// Requests `limit` rows from the provider.
    ///
    /// Every row the provider returns is kept. Bounding happens after sorting,
    /// in the sync workflow.
    pub async fn fetch_records(&self, limit: usize) -> Vec<RawSourceRow> {
        match self.try_fetch(limit).await {
            Ok(rows) => {
                tracing::info!("Successfully fetched {} borrowers from data source", rows.len());
                rows
            }
            Err(e) => {
                tracing::error!("Error fetching data from data source: {}", e);
                Vec::new()
            }
        }
    }

    async fn try_fetch(&self, limit: usize) -> Result<Vec<RawSourceRow>, AppError> {
        let mut params = vec![
            ("count", limit.to_string()),
            ("seed", self.seed.to_string()),
        ];
        if let Some(key) = &self.api_key {
            params.push(("key", key.clone()));
        }

        let url = reqwest::Url::parse_with_params(&self.base_url, &params)
            .map_err(|e| AppError::DataSource(format!("Failed to build URL: {}", e)))?;

        // Redact key from logs
        tracing::debug!(
            "Data source URL: {}?count={}&seed={}{}",
            self.base_url,
            limit,
            self.seed,
            if self.api_key.is_some() { "&key=[REDACTED]" } else { "" }
        );

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| AppError::DataSource(format!("Data source request failed: {}", e)))?;

        tracing::info!("Data source response status: {}", response.status());

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::DataSource(format!(
                "Data source returned status {}: {}",
                status, error_text
            )));
        }

        let is_json = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.contains("json"));

        let body = response.text().await.map_err(|e| {
            AppError::DataSource(format!("Failed to read data source response: {}", e))
        })?;

        if is_json {
            parse_json(&body)
        } else {
            Ok(parse_csv(&body))
        }
    }
}

/// Parses a CSV body with a header row.
///
/// Records that cannot be read (e.g. a wrong field count) are skipped.
pub fn parse_csv(body: &str) -> Vec<RawSourceRow> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::Headers)
        .from_reader(body.as_bytes());

    let headers = match reader.headers() {
        Ok(headers) => headers.clone(),
        Err(e) => {
            tracing::warn!("Data source CSV has no readable header: {}", e);
            return Vec::new();
        }
    };

    reader
        .records()
        .enumerate()
        .filter_map(|(index, record)| match record {
            Ok(record) => Some(
                headers
                    .iter()
                    .zip(record.iter())
                    .collect::<RawSourceRow>(),
            ),
            Err(e) => {
                tracing::warn!("Skipping unreadable CSV record {}: {}", index + 1, e);
                None
            }
        })
        .collect()
}

/// Parses a JSON array of flat objects.
pub fn parse_json(body: &str) -> Result<Vec<RawSourceRow>, AppError> {
    let objects: Vec<Map<String, Value>> = serde_json::from_str(body).map_err(|e| {
        AppError::DataSource(format!("Failed to parse data source JSON: {}", e))
    })?;

    Ok(objects
        .into_iter()
        .map(|object| {
            object
                .into_iter()
                .filter_map(|(column, value)| {
                    let text = match value {
                        Value::String(s) => s,
                        Value::Null => return None,
                        other => other.to_string(),
                    };
                    Some((column, text))
                })
                .collect::<RawSourceRow>()
        })
        .collect())
}
