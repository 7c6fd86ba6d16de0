// Copyright 2025
// SPDX-License-Identifier: Apache-2.0
//
// Error types for PII Shield

use thiserror::Error;

/// Errors raised by detection, fusion, redaction and evaluation
#[derive(Debug, Error)]
pub enum ShieldError {
    /// Malformed span (bad offsets, bad score, overlap inside a checked set)
    #[error("Invalid entity [{start}, {end}) of type '{entity_type}': {reason}")]
    InvalidEntity {
        start: usize,
        end: usize,
        entity_type: String,
        reason: String,
    },

    /// Entity does not fit the text it is being applied to
    #[error("Entity [{start}, {end}) exceeds text length {text_len}")]
    OutOfBounds {
        start: usize,
        end: usize,
        text_len: usize,
    },

    /// A detector backend could not produce a result
    #[error("Detector '{detector}' unavailable: {reason}")]
    DetectionUnavailable { detector: String, reason: String },

    /// Invalid or inconsistent configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Regex compilation failure
    #[error("Invalid pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    /// Serialization/deserialization failure
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Corpus file could not be read or written
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ShieldError {
    /// Wrap any failure reported by a detector as `DetectionUnavailable`.
    ///
    /// Failures that already carry that shape are passed through untouched.
    pub fn unavailable(detector: &str, err: ShieldError) -> Self {
        match err {
            ShieldError::DetectionUnavailable { .. } => err,
            other => ShieldError::DetectionUnavailable {
                detector: detector.to_string(),
                reason: other.to_string(),
            },
        }
    }
}

/// Result type alias for shield operations
pub type Result<T> = std::result::Result<T, ShieldError>;
