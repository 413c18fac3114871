//! Staging-then-merge upsert of one enriched municipality row.
//!
//! The client trait covers exactly the three warehouse operations the stage
//! needs: a full-replace load into a named staging table, one atomic merge
//! statement, and staging deletion. The staging table is removed after every
//! attempt, merge success or not.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{Value as JsonValue, json};
use thiserror::Error;
use tracing::{info, warn};

use crate::config::WarehouseConfig;
use crate::paths::{AppPaths, PathError};
use crate::pipeline::row::{MunicipalityRow, RowError, merge_statement, schema_json};

#[derive(Debug, Error)]
pub enum WarehouseError {
    #[error("enriched CSV not found at {path}")]
    EnrichedMissing { path: PathBuf },
    #[error("failed to read enriched CSV {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("enriched CSV at {path} holds no rows")]
    EmptyCsv { path: PathBuf },
    #[error(transparent)]
    Row(#[from] RowError),
    #[error("staging load failed: {0}")]
    Load(String),
    #[error("merge failed: {0}")]
    Merge(String),
    #[error("staging cleanup failed: {0}")]
    Cleanup(String),
    #[error("warehouse request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error(transparent)]
    Paths(#[from] PathError),
}

/// Persistent tabular store collaborator.
#[async_trait]
pub trait WarehouseClient: Send + Sync {
    /// Load one row into `table` with the explicit schema, replacing any
    /// previous content.
    async fn load_staging(
        &self,
        table: &str,
        schema: &JsonValue,
        row: &MunicipalityRow,
    ) -> Result<(), WarehouseError>;

    /// Execute one atomic merge statement.
    async fn execute_merge(&self, statement: &str) -> Result<(), WarehouseError>;

    /// Delete a staging table; an absent table is not an error.
    async fn delete_table(&self, table: &str) -> Result<(), WarehouseError>;
}

/// The merge stage: enriched CSV → typed row → staged load → upsert-by-key.
pub struct WarehouseMerger {
    paths: AppPaths,
    client: Arc<dyn WarehouseClient>,
    config: WarehouseConfig,
}

impl WarehouseMerger {
    pub fn new(paths: AppPaths, client: Arc<dyn WarehouseClient>, config: WarehouseConfig) -> Self {
        Self {
            paths,
            client,
            config,
        }
    }

    pub async fn update_table(&self, city: &str) -> Result<(), WarehouseError> {
        let row = self.read_enriched_row(city)?;
        let staging = format!("{}_temp", self.config.table_id);

        let result = self.load_and_merge(&staging, &row).await;

        // Best-effort cleanup regardless of merge outcome.
        if let Err(err) = self.client.delete_table(&staging).await {
            warn!(%staging, %err, "failed to drop staging table");
        }

        if result.is_ok() {
            info!(%city, table = %self.config.table_id, "warehouse table updated");
        }
        result
    }

    async fn load_and_merge(
        &self,
        staging: &str,
        row: &MunicipalityRow,
    ) -> Result<(), WarehouseError> {
        self.client
            .load_staging(staging, &schema_json(), row)
            .await?;

        let statement = merge_statement(
            &self.config.project_id,
            &self.config.dataset_id,
            &self.config.table_id,
            staging,
        );
        self.client.execute_merge(&statement).await
    }

    fn read_enriched_row(&self, city: &str) -> Result<MunicipalityRow, WarehouseError> {
        let path = self.paths.enriched_csv(city)?;
        if !path.exists() {
            return Err(WarehouseError::EnrichedMissing { path });
        }

        let mut reader = csv::Reader::from_path(&path).map_err(|source| WarehouseError::Csv {
            path: path.clone(),
            source,
        })?;
        let headers = reader
            .headers()
            .map_err(|source| WarehouseError::Csv {
                path: path.clone(),
                source,
            })?
            .clone();

        let record = reader
            .records()
            .next()
            .ok_or(WarehouseError::EmptyCsv { path: path.clone() })?
            .map_err(|source| WarehouseError::Csv {
                path: path.clone(),
                source,
            })?;

        Ok(MunicipalityRow::from_csv(&headers, &record)?)
    }
}

/// BigQuery REST implementation. Token minting lives outside the application;
/// the configured bearer token is used as-is.
pub struct BigQueryRestClient {
    http: Client,
    base_url: String,
    config: WarehouseConfig,
}

impl BigQueryRestClient {
    pub fn new(config: WarehouseConfig) -> Self {
        Self::with_base_url("https://bigquery.googleapis.com/bigquery/v2", config)
    }

    pub fn with_base_url(base_url: impl Into<String>, config: WarehouseConfig) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into(),
            config,
        }
    }

    fn tables_url(&self) -> String {
        format!(
            "{}/projects/{}/datasets/{}/tables",
            self.base_url, self.config.project_id, self.config.dataset_id
        )
    }
}

#[async_trait]
impl WarehouseClient for BigQueryRestClient {
    async fn load_staging(
        &self,
        table: &str,
        schema: &JsonValue,
        row: &MunicipalityRow,
    ) -> Result<(), WarehouseError> {
        // Full-replace disposition: drop any leftover staging table first.
        self.delete_table(table).await?;

        let create = self
            .http
            .post(self.tables_url())
            .bearer_auth(&self.config.access_token)
            .json(&json!({
                "tableReference": {
                    "projectId": self.config.project_id,
                    "datasetId": self.config.dataset_id,
                    "tableId": table,
                },
                "schema": schema,
            }))
            .send()
            .await?;
        if !create.status().is_success() {
            return Err(WarehouseError::Load(response_detail(create).await));
        }

        let insert = self
            .http
            .post(format!("{}/{}/insertAll", self.tables_url(), table))
            .bearer_auth(&self.config.access_token)
            .json(&json!({ "rows": [ { "json": JsonValue::Object(row.to_json()) } ] }))
            .send()
            .await?;
        if !insert.status().is_success() {
            return Err(WarehouseError::Load(response_detail(insert).await));
        }
        let body: JsonValue = insert.json().await.unwrap_or(JsonValue::Null);
        if body
            .get("insertErrors")
            .is_some_and(|errors| !errors.as_array().is_none_or(|a| a.is_empty()))
        {
            return Err(WarehouseError::Load(body.to_string()));
        }

        Ok(())
    }

    async fn execute_merge(&self, statement: &str) -> Result<(), WarehouseError> {
        let response = self
            .http
            .post(format!(
                "{}/projects/{}/queries",
                self.base_url, self.config.project_id
            ))
            .bearer_auth(&self.config.access_token)
            .json(&json!({ "query": statement, "useLegacySql": false }))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(WarehouseError::Merge(response_detail(response).await));
        }
        Ok(())
    }

    async fn delete_table(&self, table: &str) -> Result<(), WarehouseError> {
        let response = self
            .http
            .delete(format!("{}/{}", self.tables_url(), table))
            .bearer_auth(&self.config.access_token)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() && status != StatusCode::NOT_FOUND {
            return Err(WarehouseError::Cleanup(response_detail(response).await));
        }
        Ok(())
    }
}

async fn response_detail(response: reqwest::Response) -> String {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    format!("status {status}: {body}")
}
