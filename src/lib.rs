// Copyright 2025
// SPDX-License-Identifier: Apache-2.0
//
// PII detection, masking and evaluation
// Merges the output of several PII detectors and rewrites text offset-safely

//! # Examples
//!
//! ```
//! use pii_shield::{MaskingStrategy, Shield, ShieldConfig};
//!
//! # futures::executor::block_on(async {
//! let shield = Shield::with_pattern_detector(ShieldConfig::default()).unwrap();
//! let result = shield
//!     .protect("Mail me at ann@corp.io", None, Some(MaskingStrategy::Replace))
//!     .await
//!     .unwrap();
//! assert_eq!(result.masked_text, "Mail me at <EMAIL_ADDRESS>");
//! # });
//! ```

pub mod shield;

pub use shield::eval::{
    render_markdown, render_text, Corpus, EvaluationResult, Evaluator, LabeledEntity,
    LabeledSample, MatchOutcome,
};
pub use shield::{
    Detector, Entity, EntitySet, FallbackPolicy, FusionResolver, MaskedResult, MaskingStrategy,
    PatternConfig, PatternDetector, Redactor, Result, Shield, ShieldConfig, ShieldError,
    SourcePriority,
};
