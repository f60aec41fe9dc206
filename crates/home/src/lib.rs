//! Smart-home controller
//!
//! Translates free-text device commands into structured intents and
//! executes them through the home-automation API:
//! - A prioritised fast-path rule engine covers the common command
//!   families without touching the LLM
//! - An LLM fallback extracts structured intent for everything else
//! - A sequence detector handles timed/looping multi-step requests
//! - Execution fans device calls out in parallel per target entity

pub mod colors;
pub mod controller;
pub mod device;
pub mod entities;
pub mod intent;
pub mod responses;
pub mod rules;
pub mod sequence;

pub use controller::{PreviousTurn, SmartHomeController};
pub use device::{DeviceApi, HaClient};
pub use entities::{HaEntityManager, LightGroup};
pub use intent::{DeviceType, HomeAction, HomeIntent, IntentParams, TargetScope};
pub use sequence::{SequenceIntent, SequenceStep};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum HomeError {
    #[error("Device API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("No entities found for {0}")]
    NoEntities(String),

    #[error("Intent extraction failed: {0}")]
    Extraction(String),
}

impl From<reqwest::Error> for HomeError {
    fn from(err: reqwest::Error) -> Self {
        HomeError::Network(err.to_string())
    }
}

impl From<HomeError> for hearth_core::Error {
    fn from(err: HomeError) -> Self {
        match err {
            HomeError::Api { status, body } if status < 500 => {
                hearth_core::Error::BadRequest(format!("{status}: {body}"))
            }
            HomeError::Extraction(msg) => hearth_core::Error::ParseFailure(msg),
            other => hearth_core::Error::Upstream(other.to_string()),
        }
    }
}
