pub mod config;
pub mod reading;
pub mod topics;

pub use config::{ConfigUpdate, DocumentError, GatewayConfig, MAX_DOCUMENT_BYTES};
pub use reading::SensorReading;
pub use topics::{data_topic, status_topic};
