pub mod drain;
pub mod persist;
pub mod retry;

pub use drain::{DrainConfig, DrainStats, StorageDrainer};
pub use persist::{DeliveryPipeline, PersistError, decode_batch, encode_batch};
pub use retry::RetryConfig;
