use super::{ExportResult, Exporter};
use crate::buffer::Batch;
use async_trait::async_trait;
use flate2::Compression;
use flate2::write::GzEncoder;
use reqwest::header::{CONTENT_ENCODING, CONTENT_TYPE};
use reqwest::{Client, ClientBuilder, StatusCode};
use std::io::Write;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, warn};
use url::Url;

#[derive(Error, Debug)]
pub enum ExporterError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

#[derive(Debug, Clone)]
pub struct HttpExporterConfig {
    pub endpoint: String,
    pub timeout: Duration,
    pub connection_timeout: Duration,
    pub user_agent: String,
    pub enable_compression: bool,
    /// Batches with more records than this are gzipped when compression is on.
    pub compress_threshold: usize,
}

impl Default for HttpExporterConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:9600/v1/telemetry".to_string(),
            timeout: Duration::from_secs(30),
            connection_timeout: Duration::from_secs(10),
            user_agent: concat!("telemetry-relay/", env!("CARGO_PKG_VERSION")).to_string(),
            enable_compression: false,
            compress_threshold: 100,
        }
    }
}

/// Exporter POSTing batches as NDJSON to a collector endpoint.
///
/// Status mapping: 2xx is success; 408, 429, 5xx and transport errors are
/// retryable; any other status is not.
pub struct HttpExporter {
    client: Client,
    endpoint: Url,
    config: HttpExporterConfig,
}

impl HttpExporter {
    pub fn new(config: HttpExporterConfig) -> Result<Self, ExporterError> {
        let endpoint: Url = config.endpoint.parse().map_err(|e| {
            ExporterError::InvalidConfiguration(format!(
                "Invalid endpoint URL '{}': {e}",
                config.endpoint
            ))
        })?;

        let client = ClientBuilder::new()
            .timeout(config.timeout)
            .connect_timeout(config.connection_timeout)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| ExporterError::InvalidConfiguration(format!("HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint,
            config,
        })
    }

    fn encode_ndjson(&self, batch: &Batch) -> Result<Vec<u8>, serde_json::Error> {
        let mut buffer = Vec::with_capacity(batch.len() * 256);
        for record in batch.records() {
            serde_json::to_writer(&mut buffer, record)?;
            buffer.push(b'\n');
        }
        Ok(buffer)
    }

    fn gzip(payload: &[u8]) -> std::io::Result<Vec<u8>> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::fast());
        encoder.write_all(payload)?;
        encoder.finish()
    }
}

#[async_trait]
impl Exporter for HttpExporter {
    async fn export(&self, batch: Batch) -> ExportResult {
        let payload = match self.encode_ndjson(&batch) {
            Ok(payload) => payload,
            Err(e) => {
                error!(batch = %batch.id(), "failed to serialize batch: {e}");
                return ExportResult::FailedNotRetryable;
            }
        };

        let compress =
            self.config.enable_compression && batch.len() > self.config.compress_threshold;
        let body = if compress {
            match Self::gzip(&payload) {
                Ok(compressed) => compressed,
                Err(e) => {
                    warn!(batch = %batch.id(), "compression failed, sending uncompressed: {e}");
                    payload
                }
            }
        } else {
            payload
        };

        let mut request = self
            .client
            .post(self.endpoint.clone())
            .header(CONTENT_TYPE, "application/x-ndjson")
            .header("x-batch-id", batch.id())
            .header("x-batch-size", batch.len().to_string());
        if compress {
            request = request.header(CONTENT_ENCODING, "gzip");
        }

        match request.body(body).send().await {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    debug!(batch = %batch.id(), records = batch.len(), "batch delivered");
                    ExportResult::Success
                } else if status == StatusCode::REQUEST_TIMEOUT
                    || status == StatusCode::TOO_MANY_REQUESTS
                    || status.is_server_error()
                {
                    warn!(batch = %batch.id(), %status, "collector rejected batch (retryable)");
                    ExportResult::FailedRetryable
                } else {
                    warn!(batch = %batch.id(), %status, "collector rejected batch");
                    ExportResult::FailedNotRetryable
                }
            }
            Err(e) => {
                warn!(batch = %batch.id(), "transport error: {e}");
                ExportResult::FailedRetryable
            }
        }
    }

    fn name(&self) -> &str {
        "http"
    }
}
