pub mod config;
pub mod ingest;
pub mod logging;
pub mod service;
pub mod shutdown;

pub use config::{Config, ConfigError, LogLevel};
pub use logging::LoggingError;
pub use service::{ServiceError, ServiceManager};

use tracing::info;

pub struct App {
    service: ServiceManager,
}

impl App {
    pub async fn from_args<I, T>(args: I) -> anyhow::Result<Self>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let config = Config::from_args(args)?;
        logging::init_logging(config.log_level)?;

        info!("Starting telemetry-relay v{}", env!("CARGO_PKG_VERSION"));
        info!(
            endpoint = %config.endpoint,
            queue = config.max_queue_size,
            batch = config.max_export_batch_size,
            storage = %config.storage_dir.display(),
            "configuration loaded"
        );

        let service = ServiceManager::start(config).await?;
        Ok(Self { service })
    }

    /// Runs until a termination signal arrives, then tears down in order.
    pub async fn run(self) {
        info!("telemetry-relay is running. Press Ctrl+C to stop.");
        shutdown::wait_for_signal().await;
        self.service.shutdown().await;
        info!("telemetry-relay stopped.");
    }
}

// Main entry point for the application
pub async fn main() -> anyhow::Result<()> {
    let app = App::from_args(std::env::args()).await?;
    app.run().await;
    Ok(())
}
