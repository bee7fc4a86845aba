//! Pipeline startup errors
//!
//! Only startup can fail. Once a pipeline runs, rejected ticks and
//! failed writes are contained and reported, never returned.

use thiserror::Error;

use tick_store::ProvisioningError;

use crate::config::ConfigError;

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage provisioning failed: {0}")]
    Provisioning(#[from] ProvisioningError),
}
