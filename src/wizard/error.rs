//! Error types for the wizard.
//!
//! Step navigation never produces errors; anomalies there are corrected in
//! place. These types cover the two seams where failure is real: the
//! key/value store and controller construction.

use thiserror::Error;

/// Errors reported by a [`KeyValueStore`](super::KeyValueStore) implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Writing would exceed the store's capacity.
    #[error("Storage quota exceeded: {needed} bytes needed, {available} available")]
    QuotaExceeded { needed: usize, available: usize },

    /// The backing store cannot be reached.
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    /// IO error for file-backed stores.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that can occur when building or feeding a wizard.
#[derive(Debug, Error)]
pub enum WizardError {
    #[error("Invalid step declaration: {0}")]
    InvalidSteps(String),

    #[error("Unknown step key: {0}")]
    UnknownStep(String),

    #[error("Step '{0}' was completed without data")]
    EmptyStepData(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
