//! Mapping from the flat CLI/file configuration onto per-component configs.

use super::Config;
use crate::buffer::ProcessorConfig;
use crate::export::HttpExporterConfig;
use crate::reliability::{DrainConfig, RetryConfig};
use crate::storage::StorageConfig;
use std::time::Duration;

impl Config {
    pub fn processor_config(&self) -> ProcessorConfig {
        ProcessorConfig {
            max_queue_size: self.max_queue_size,
            max_export_batch_size: self.max_export_batch_size,
            scheduled_delay: Duration::from_millis(self.scheduled_delay_ms),
            export_timeout: Duration::from_millis(self.export_timeout_ms),
        }
    }

    pub fn storage_config(&self) -> StorageConfig {
        StorageConfig {
            directory: self.storage_dir.clone(),
            max_size_bytes: self.max_storage_bytes,
            maintenance_interval: Duration::from_secs(self.maintenance_interval_secs),
            retention_period: Duration::from_secs(self.retention_secs),
            write_timeout: Duration::from_secs(self.write_timeout_secs),
        }
    }

    pub fn drain_config(&self) -> DrainConfig {
        let interval = Duration::from_secs(self.drain_interval_secs);
        DrainConfig {
            interval,
            lease_period: Duration::from_secs(self.lease_secs),
            export_timeout: Duration::from_millis(self.export_timeout_ms),
            // The first failed cycle backs off from the normal pace.
            retry: RetryConfig {
                base_delay: interval,
                ..self.retry_config.clone()
            },
        }
    }

    pub fn exporter_config(&self) -> HttpExporterConfig {
        HttpExporterConfig {
            endpoint: self.endpoint.clone(),
            timeout: Duration::from_millis(self.export_timeout_ms),
            enable_compression: self.enable_compression,
            ..HttpExporterConfig::default()
        }
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }
}
