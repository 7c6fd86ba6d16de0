// Copyright 2025
// SPDX-License-Identifier: Apache-2.0
//
// PII Shield
//
// Detection fan-out, fusion and offset-safe redaction using:
// - RegexSet pre-filtering for the local pattern detector
// - Interval-union clustering to merge overlapping detector output
// - Copy-on-write strings for zero-copy rewriting

pub mod config;
pub mod detector;
pub mod entity;
pub mod error;
pub mod eval;
pub mod fusion;
pub mod masking;
pub mod patterns;
pub mod pipeline;

pub use config::{CustomPattern, FallbackPolicy, MaskingStrategy, PatternConfig, ShieldConfig};
pub use detector::{Detector, PatternDetector};
pub use entity::{Entity, EntityKey, EntitySet};
pub use error::{Result, ShieldError};
pub use fusion::{FusionResolver, SourcePriority};
pub use masking::{MaskedResult, Redactor};
pub use pipeline::Shield;
