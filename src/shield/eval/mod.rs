// Copyright 2025
// SPDX-License-Identifier: Apache-2.0
//
// Evaluation of detection and masking against labeled data

pub mod dataset;
pub mod evaluator;
pub mod metrics;
pub mod report;

pub use dataset::{Corpus, CorpusStatistics, LabeledEntity, LabeledSample, GROUND_TRUTH_SOURCE};
pub use evaluator::{
    Anomaly, EvaluationResult, Evaluator, LanguageSummary, MatchOutcome, SampleOutcome,
};
pub use metrics::{match_entities, Coverage, DetectionMetrics};
pub use report::{render_markdown, render_text};
