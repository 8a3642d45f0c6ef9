//! Graph client over the Neo4j HTTP transactional endpoint.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{GraphQuery, Record};
use crate::config::GraphConfig;

#[derive(Debug, Deserialize)]
struct TxResponse {
    results: Vec<TxResult>,
    #[serde(default)]
    errors: Vec<TxError>,
}

#[derive(Debug, Deserialize)]
struct TxResult {
    columns: Vec<String>,
    data: Vec<TxRow>,
}

#[derive(Debug, Deserialize)]
struct TxRow {
    row: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct TxError {
    code: String,
    message: String,
}

pub struct HttpGraphClient {
    client: Client,
    commit_url: String,
    username: String,
    password: String,
}

impl HttpGraphClient {
    pub fn new(config: &GraphConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(std::time::Duration::from_secs(10))
            .timeout(std::time::Duration::from_secs(60))
            .tcp_nodelay(true)
            .build()?;

        let password = std::env::var(&config.password_env).unwrap_or_default();
        let commit_url = format!(
            "{}/db/{}/tx/commit",
            config.endpoint.trim_end_matches('/'),
            config.database
        );

        tracing::info!(url = %commit_url, "Creating graph HTTP client");

        Ok(Self {
            client,
            commit_url,
            username: config.username.clone(),
            password,
        })
    }

    async fn execute(&self, query: &str, params: Value) -> Result<Vec<Record>> {
        let payload = json!({
            "statements": [{
                "statement": query,
                "parameters": params,
            }]
        });

        let response = self
            .client
            .post(&self.commit_url)
            .basic_auth(&self.username, Some(&self.password))
            .json(&payload)
            .send()
            .await
            .map_err(|e| anyhow!("graph request to {} failed: {}", self.commit_url, e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| anyhow!("failed to read graph response body: {}", e))?;

        // Gateways sometimes answer with an HTML error page and a 200.
        let trimmed = body.trim_start();
        if trimmed.starts_with('<') {
            let preview: String = trimmed.chars().take(200).collect();
            return Err(anyhow!(
                "graph endpoint returned HTML instead of JSON (HTTP {}): {}",
                status,
                preview
            ));
        }

        let parsed: TxResponse = serde_json::from_str(&body).map_err(|e| {
            let preview: String = body.chars().take(300).collect();
            anyhow!("failed to parse graph response (HTTP {}): {}. Body: {}", status, e, preview)
        })?;

        if let Some(err) = parsed.errors.first() {
            return Err(anyhow!("graph error {}: {}", err.code, err.message));
        }

        let mut records = Vec::new();
        if let Some(result) = parsed.results.first() {
            for row in &result.data {
                let mut record = Record::new();
                for (column, value) in result.columns.iter().zip(&row.row) {
                    record.insert(column.clone(), value.clone());
                }
                records.push(record);
            }
        }
        Ok(records)
    }
}

#[async_trait]
impl GraphQuery for HttpGraphClient {
    async fn run(&self, query: &str, params: Value) -> Vec<Record> {
        match self.execute(query, params).await {
            Ok(records) => records,
            Err(e) => {
                tracing::warn!(error = %e, "Graph query failed, returning empty result");
                Vec::new()
            }
        }
    }
}
