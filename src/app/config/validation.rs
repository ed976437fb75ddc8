use super::{Config, ConfigError};
use url::Url;

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        Url::parse(&self.endpoint).map_err(|e| {
            ConfigError::InvalidUrl(format!("Invalid endpoint URL '{}': {e}", self.endpoint))
        })?;

        if self.max_queue_size == 0 {
            return Err(ConfigError::InvalidConfig(
                "Max queue size must be greater than 0".to_string(),
            ));
        }

        if self.max_export_batch_size == 0 || self.max_export_batch_size > self.max_queue_size {
            return Err(ConfigError::InvalidConfig(format!(
                "Max export batch size ({}) must be between 1 and max queue size ({})",
                self.max_export_batch_size, self.max_queue_size
            )));
        }

        if self.scheduled_delay_ms == 0 {
            return Err(ConfigError::InvalidConfig(
                "Scheduled delay must be greater than 0".to_string(),
            ));
        }

        if self.max_storage_bytes == 0 {
            return Err(ConfigError::InvalidConfig(
                "Storage quota must be greater than 0".to_string(),
            ));
        }

        if self.maintenance_interval_secs == 0 || self.drain_interval_secs == 0 {
            return Err(ConfigError::InvalidConfig(
                "Maintenance and drain intervals must be greater than 0".to_string(),
            ));
        }

        if self.lease_secs == 0 {
            return Err(ConfigError::InvalidConfig(
                "Lease period must be greater than 0".to_string(),
            ));
        }

        if self.retry_config.max_attempts == 0 {
            return Err(ConfigError::InvalidConfig(
                "Retry max attempts must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}
