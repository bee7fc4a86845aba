//! InfluxDB 1.x sink
//!
//! Talks to the HTTP API directly:
//! - `POST /query?q=...` for schema statements
//! - `POST /write?db=...&precision=ns` with a line-protocol body
//!
//! The only way to obtain an `InfluxSink` is `InfluxSink::initialize`,
//! which provisions the database and the continuous-query ladder first.
//! A sink value therefore always points at a provisioned database.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::time::Instant;
use tracing::{debug, info, warn};

use tick_types::batch::Batch;

use crate::downsample::{self, quote_ident, ContinuousQuery};
use crate::error::{BackendError, ProvisioningError, WriteFailure};
use crate::point::encode_batch;
use crate::sink::StorageSink;
use crate::target::{ConnectionTarget, InfluxOptions};

// ── Query responses ─────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    results: Vec<StatementResult>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct StatementResult {
    #[serde(default)]
    series: Vec<Series>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Series {
    #[serde(default)]
    name: String,
    #[serde(default)]
    columns: Vec<String>,
    #[serde(default)]
    values: Vec<Vec<serde_json::Value>>,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
}

impl QueryResponse {
    fn into_result(self) -> Result<Vec<StatementResult>, BackendError> {
        if let Some(error) = self.error {
            return Err(BackendError::Backend(error));
        }
        if let Some(error) = self.results.iter().find_map(|r| r.error.clone()) {
            return Err(BackendError::Backend(error));
        }
        Ok(self.results)
    }
}

// ── Sink ────────────────────────────────────────────────────────────

/// Provisioned InfluxDB sink.
#[derive(Debug, Clone)]
pub struct InfluxSink {
    http: Client,
    target: ConnectionTarget,
    measurement: String,
}

impl InfluxSink {
    /// Resolve the target, create the database if missing and install
    /// every continuous query of the ladder that is not already there.
    ///
    /// Safe to call repeatedly against the same database.
    pub async fn initialize(options: &InfluxOptions) -> Result<Self, ProvisioningError> {
        let target = options.resolve()?;
        let http = Client::builder()
            .timeout(options.timeout())
            .build()
            .map_err(ProvisioningError::Client)?;

        let sink = Self {
            http,
            target,
            measurement: options.measurement.clone(),
        };

        info!(backend = %sink.target, measurement = %sink.measurement, "Provisioning tick storage");
        sink.provision().await?;
        Ok(sink)
    }

    pub fn target(&self) -> &ConnectionTarget {
        &self.target
    }

    pub fn measurement(&self) -> &str {
        &self.measurement
    }

    async fn provision(&self) -> Result<(), ProvisioningError> {
        let database = self.target.database().to_string();

        self.query(&format!("CREATE DATABASE {}", quote_ident(&database)))
            .await
            .map_err(|source| ProvisioningError::CreateDatabase {
                database: database.clone(),
                source,
            })?;

        let existing = self
            .existing_queries()
            .await
            .map_err(|source| ProvisioningError::ListContinuousQueries { source })?;

        let ladder = downsample::ladder(&database, &self.measurement);
        let mut created = 0usize;
        for cq in &ladder {
            if existing.contains(&cq.name) {
                debug!(name = %cq.name, "Continuous query already present");
                continue;
            }
            self.create_query(cq).await?;
            created += 1;
        }

        info!(
            database = %database,
            created,
            present = ladder.len() - created,
            "Continuous query ladder ready"
        );
        Ok(())
    }

    async fn create_query(&self, cq: &ContinuousQuery) -> Result<(), ProvisioningError> {
        self.query(&cq.statement)
            .await
            .map_err(|source| ProvisioningError::CreateContinuousQuery {
                name: cq.name.clone(),
                source,
            })?;
        info!(name = %cq.name, interval = cq.interval, "Created continuous query");
        Ok(())
    }

    /// Names of the continuous queries defined on this sink's database.
    async fn existing_queries(&self) -> Result<BTreeSet<String>, BackendError> {
        let results = self.query("SHOW CONTINUOUS QUERIES").await?;

        let mut names = BTreeSet::new();
        for series in results
            .iter()
            .flat_map(|r| r.series.iter())
            .filter(|s| s.name == self.target.database())
        {
            let column = series.columns.iter().position(|c| c == "name").unwrap_or(0);
            for row in &series.values {
                if let Some(name) = row.get(column).and_then(|v| v.as_str()) {
                    names.insert(name.to_string());
                }
            }
        }
        Ok(names)
    }

    async fn query(&self, statement: &str) -> Result<Vec<StatementResult>, BackendError> {
        let url = self
            .target
            .endpoint("query")
            .map_err(|e| BackendError::Response(e.to_string()))?;

        let resp = self
            .http
            .post(url)
            .query(&[
                ("q", statement),
                ("u", self.target.username()),
                ("p", self.target.password()),
            ])
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await?;

        if !status.is_success() {
            return Err(status_error(status, &body));
        }

        let parsed: QueryResponse = serde_json::from_str(&body)
            .map_err(|e| BackendError::Response(format!("query response: {e}")))?;
        parsed.into_result()
    }

    async fn post_lines(&self, body: String) -> Result<(), BackendError> {
        let url = self
            .target
            .endpoint("write")
            .map_err(|e| BackendError::Response(e.to_string()))?;

        let resp = self
            .http
            .post(url)
            .query(&[
                ("db", self.target.database()),
                ("precision", "ns"),
                ("u", self.target.username()),
                ("p", self.target.password()),
            ])
            .body(body)
            .send()
            .await?;

        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }
        let body = resp.text().await.unwrap_or_default();
        Err(status_error(status, &body))
    }
}

#[async_trait]
impl StorageSink for InfluxSink {
    async fn write(&self, batch: &Batch) -> Result<(), WriteFailure> {
        let started = Instant::now();
        let body =
            encode_batch(&self.measurement, batch).map_err(|e| WriteFailure::new(batch.len(), e))?;

        match self.post_lines(body).await {
            Ok(()) => {
                debug!(
                    batch_id = %batch.id(),
                    points = batch.len(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Batch written"
                );
                Ok(())
            }
            Err(cause) => {
                warn!(batch_id = %batch.id(), points = batch.len(), error = %cause, "Batch write rejected");
                Err(WriteFailure::new(batch.len(), cause))
            }
        }
    }

    fn name(&self) -> &'static str {
        "influxdb"
    }
}

/// Map a non-2xx response, preferring the backend's own error text.
fn status_error(status: StatusCode, body: &str) -> BackendError {
    let message = serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.error)
        .unwrap_or_else(|| body.trim().to_string());
    BackendError::Status {
        status: status.as_u16(),
        body: message,
    }
}
