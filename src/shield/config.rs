// Copyright 2025
// SPDX-License-Identifier: Apache-2.0
//
// Configuration types for PII Shield

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::error::{Result, ShieldError};

/// Rewrite strategies for detected PII
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MaskingStrategy {
    #[default]
    Mask, // Replace every character with the mask character (****)
    Replace, // Replace with a type label (<EMAIL_ADDRESS>)
    Redact,  // Remove entirely
    Hash,    // Replace with a salted SHA-256 digest
}

impl MaskingStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            MaskingStrategy::Mask => "mask",
            MaskingStrategy::Replace => "replace",
            MaskingStrategy::Redact => "redact",
            MaskingStrategy::Hash => "hash",
        }
    }
}

impl fmt::Display for MaskingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MaskingStrategy {
    type Err = ShieldError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "mask" => Ok(MaskingStrategy::Mask),
            "replace" => Ok(MaskingStrategy::Replace),
            "redact" => Ok(MaskingStrategy::Redact),
            "hash" => Ok(MaskingStrategy::Hash),
            other => Err(ShieldError::Config(format!(
                "unknown masking strategy '{other}'"
            ))),
        }
    }
}

/// What to do when a detector call fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FallbackPolicy {
    /// Continue with the detectors that succeeded; fail only if all fail
    #[default]
    Fallback,
    /// Any detector failure fails the whole operation
    Strict,
}

/// User-supplied recognizer for the pattern detector
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomPattern {
    pub pattern: String,
    pub entity_type: String,
    #[serde(default = "default_custom_score")]
    pub score: f64,
    /// Languages the pattern applies to; empty means all
    #[serde(default)]
    pub languages: Vec<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_custom_score() -> f64 {
    0.85
}

fn default_enabled() -> bool {
    true
}

/// Configuration for the local pattern detector
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternConfig {
    /// Source tag stamped on every entity this detector produces
    pub source: String,
    pub languages: Vec<String>,
    pub custom_patterns: Vec<CustomPattern>,
    /// Regexes; a match whose text matches any of these is dropped
    pub whitelist_patterns: Vec<String>,
}

impl Default for PatternConfig {
    fn default() -> Self {
        Self {
            source: "local".to_string(),
            languages: vec!["en".to_string(), "ko".to_string()],
            custom_patterns: Vec::new(),
            whitelist_patterns: Vec::new(),
        }
    }
}

/// Configuration consumed by fusion, redaction and evaluation
///
/// Passed by value into each engine; nothing here is read from the process
/// environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShieldConfig {
    pub default_language: String,
    pub default_strategy: MaskingStrategy,
    pub mask_char: char,
    pub hash_salt: String,

    /// Tie-break order for fusion, highest priority first
    pub source_priority: Vec<String>,
    pub fallback: FallbackPolicy,

    /// Entities scoring below this are dropped before fusion
    pub score_threshold: f64,
    /// Restrict output to these entity types (None = all)
    pub entity_types: Option<Vec<String>>,

    /// Fraction of expected masked characters that may be missed and still
    /// count as a partial match
    pub partial_match_tolerance: f64,

    pub patterns: PatternConfig,
}

impl Default for ShieldConfig {
    fn default() -> Self {
        Self {
            default_language: "en".to_string(),
            default_strategy: MaskingStrategy::Mask,
            mask_char: '*',
            hash_salt: String::new(),

            source_priority: vec!["cloud".to_string(), "local".to_string()],
            fallback: FallbackPolicy::Fallback,

            score_threshold: 0.5,
            entity_types: None,

            partial_match_tolerance: 0.3,

            patterns: PatternConfig::default(),
        }
    }
}

impl ShieldConfig {
    /// Parse configuration from JSON; missing keys take their defaults
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.score_threshold) {
            return Err(ShieldError::Config(format!(
                "score_threshold {} outside [0, 1]",
                self.score_threshold
            )));
        }
        if !(0.0..=1.0).contains(&self.partial_match_tolerance) {
            return Err(ShieldError::Config(format!(
                "partial_match_tolerance {} outside [0, 1]",
                self.partial_match_tolerance
            )));
        }
        if self.default_language.is_empty() {
            return Err(ShieldError::Config("default_language is empty".into()));
        }
        for custom in &self.patterns.custom_patterns {
            if !(0.0..=1.0).contains(&custom.score) {
                return Err(ShieldError::Config(format!(
                    "custom pattern '{}' score {} outside [0, 1]",
                    custom.entity_type, custom.score
                )));
            }
        }
        Ok(())
    }

    /// Whether an entity type passes the configured allowlist
    pub fn allows_type(&self, entity_type: &str) -> bool {
        match &self.entity_types {
            Some(types) => types.iter().any(|t| t == entity_type),
            None => true,
        }
    }
}
