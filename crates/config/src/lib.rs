//! Configuration plane for hearth
//!
//! Supports loading configuration from:
//! - TOML files
//! - Environment variables (HEARTH_ prefix plus well-known plain names)
//! - The admin store over HTTP, cached per kind with push invalidation
//!
//! Config snapshots are published as immutable values behind `Arc`; readers
//! grab a reference, writers swap the reference. No reader holds a lock
//! during I/O.

pub mod settings;
pub mod backends;
pub mod pricing;
pub mod flags;
pub mod admin;

pub use settings::{load_settings, Settings};
pub use backends::{BackendDescriptor, BackendType, ModelConfig};
pub use pricing::ModelPricing;
pub use flags::{FeatureFlag, FeatureFlagCache};
pub use admin::{AdminClient, ComponentModel, ProviderCredentials};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Admin API error: {0}")]
    Admin(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}

impl From<reqwest::Error> for ConfigError {
    fn from(err: reqwest::Error) -> Self {
        ConfigError::Admin(err.to_string())
    }
}

impl From<ConfigError> for hearth_core::Error {
    fn from(err: ConfigError) -> Self {
        hearth_core::Error::Config(err.to_string())
    }
}
