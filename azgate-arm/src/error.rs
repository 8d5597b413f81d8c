//! Error types for ARM operations.

use azgate_wait::{SpecError, WaitError};
use thiserror::Error;

use crate::config::ConfigError;

/// Errors that can occur talking to Azure Resource Manager.
#[derive(Debug, Error)]
pub enum ArmError {
    /// Transport failure or unreadable response body.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The resource does not exist (HTTP 404).
    #[error("not found: {0}")]
    NotFound(String),

    /// Non-success response with an Azure error body.
    #[error("Azure API error {status} ({code}): {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },

    #[error("failed to encode request body: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("failed to decode response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("response is missing {0}")]
    MissingField(&'static str),

    #[error("invalid resource ID '{id}': {reason}")]
    InvalidResourceId { id: String, reason: String },

    /// Operation needs an ID but the resource has none yet.
    #[error("resource has no ID")]
    MissingId,

    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A force-new field differs from the existing resource.
    #[error("changing '{field}' from '{current}' to '{desired}' requires replacing the resource")]
    RequiresReplacement {
        field: &'static str,
        current: String,
        desired: String,
    },

    #[error("invalid wait parameters: {0}")]
    Spec(#[from] SpecError),

    /// The resource did not converge.
    #[error("error waiting for {kind} '{name}' (resource group '{resource_group}'): {source}")]
    Wait {
        kind: &'static str,
        name: String,
        resource_group: String,
        #[source]
        source: WaitError<Box<ArmError>>,
    },
}

impl ArmError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Result type for ARM operations.
pub type Result<T> = std::result::Result<T, ArmError>;
