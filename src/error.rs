//! Error types for PetalSonic emitters

use crate::backend::InstanceHandle;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PetalSonicError {
    #[error("Event not found: {0}")]
    EventNotFound(String),

    #[error("Event reference is not set")]
    UnresolvedReference,

    #[error("Invalid instance handle: {0}")]
    InvalidHandle(InstanceHandle),

    #[error("Parameter not found: {0}")]
    ParameterNotFound(String),

    /// Any other failure reported by an [`AudioBackend`](crate::AudioBackend) implementation
    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

pub type Result<T> = std::result::Result<T, PetalSonicError>;
