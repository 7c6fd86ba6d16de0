// Copyright 2025
// SPDX-License-Identifier: Apache-2.0
//
// Scoring of detection and masking output against a labeled corpus

use serde::Serialize;
use std::collections::BTreeMap;

use super::dataset::{Corpus, LabeledSample};
use super::metrics::{match_entities, overall, ratio, Coverage, DetectionMetrics};
use crate::shield::config::{MaskingStrategy, ShieldConfig};
use crate::shield::entity::EntitySet;
use crate::shield::error::{Result, ShieldError};
use crate::shield::masking::Redactor;

/// Per-sample comparison outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchOutcome {
    /// Masked text identical to the expected masked text
    Exact,
    /// Enough of the expected characters were masked
    Partial,
    Miss,
}

/// Scoring detail for one sample
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SampleOutcome {
    pub index: usize,
    pub language: String,
    pub outcome: MatchOutcome,
    pub expected_masked: String,
    pub predicted_masked: String,
    pub coverage: Coverage,
    pub predicted_count: usize,
    pub expected_count: usize,
    pub entity_metrics: BTreeMap<String, DetectionMetrics>,
}

/// A sample that could not be scored
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Anomaly {
    pub index: usize,
    pub reason: String,
}

/// Per-language rollup
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LanguageSummary {
    pub samples: usize,
    pub exact_matches: usize,
    pub partial_matches: usize,
    pub misses: usize,
    pub entity: DetectionMetrics,
}

impl LanguageSummary {
    pub fn exact_accuracy(&self) -> f64 {
        ratio(self.exact_matches, self.samples)
    }

    pub fn partial_accuracy(&self) -> f64 {
        ratio(self.exact_matches + self.partial_matches, self.samples)
    }
}

/// Aggregate result of one evaluation run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationResult {
    pub strategy: MaskingStrategy,
    pub total_samples: usize,
    /// Samples that were scored (total minus anomalies)
    pub scored_samples: usize,
    pub exact_matches: usize,
    pub partial_matches: usize,
    pub misses: usize,
    /// Entity-level confusion counts over all scored samples
    pub entity: DetectionMetrics,
    /// Sample-level confusion counts (does the sample contain PII at all)
    pub sample: DetectionMetrics,
    pub per_entity_type: BTreeMap<String, DetectionMetrics>,
    pub per_language: BTreeMap<String, LanguageSummary>,
    pub outcomes: Vec<SampleOutcome>,
    pub anomalies: Vec<Anomaly>,
}

impl EvaluationResult {
    pub fn exact_accuracy(&self) -> f64 {
        ratio(self.exact_matches, self.scored_samples)
    }

    pub fn partial_accuracy(&self) -> f64 {
        ratio(self.exact_matches + self.partial_matches, self.scored_samples)
    }
}

/// Compares predicted entity sets with labeled ground truth
#[derive(Debug, Clone)]
pub struct Evaluator {
    redactor: Redactor,
    strategy: MaskingStrategy,
    tolerance: f64,
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new(Redactor::default(), MaskingStrategy::Mask, 0.3)
    }
}

impl Evaluator {
    pub fn new(redactor: Redactor, strategy: MaskingStrategy, tolerance: f64) -> Self {
        Self {
            redactor,
            strategy,
            tolerance,
        }
    }

    pub fn from_config(config: &ShieldConfig) -> Self {
        Self::new(
            Redactor::from_config(config),
            config.default_strategy,
            config.partial_match_tolerance,
        )
    }

    pub fn with_strategy(mut self, strategy: MaskingStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Score one prediction per corpus sample, in corpus order
    pub fn evaluate(&self, corpus: &Corpus, predictions: &[EntitySet]) -> Result<EvaluationResult> {
        if corpus.len() != predictions.len() {
            return Err(ShieldError::Config(format!(
                "{} predictions for {} samples",
                predictions.len(),
                corpus.len()
            )));
        }

        let mut result = EvaluationResult {
            strategy: self.strategy,
            total_samples: corpus.len(),
            scored_samples: 0,
            exact_matches: 0,
            partial_matches: 0,
            misses: 0,
            entity: DetectionMetrics::default(),
            sample: DetectionMetrics::default(),
            per_entity_type: BTreeMap::new(),
            per_language: BTreeMap::new(),
            outcomes: Vec::with_capacity(corpus.len()),
            anomalies: Vec::new(),
        };

        for (index, (sample, predicted)) in corpus.iter().zip(predictions).enumerate() {
            let outcome = match self.score_sample(index, sample, predicted) {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::warn!(sample = index, error = %e, "Sample not scored");
                    result.anomalies.push(Anomaly {
                        index,
                        reason: e.to_string(),
                    });
                    continue;
                }
            };

            let sample_entity = overall(&outcome.entity_metrics);
            for (entity_type, metrics) in &outcome.entity_metrics {
                *result
                    .per_entity_type
                    .entry(entity_type.clone())
                    .or_default() += *metrics;
            }
            result.entity += sample_entity;

            match (outcome.expected_count > 0, outcome.predicted_count > 0) {
                (true, true) => result.sample.true_positives += 1,
                (false, true) => result.sample.false_positives += 1,
                (true, false) => result.sample.false_negatives += 1,
                (false, false) => {}
            }

            let language = result
                .per_language
                .entry(outcome.language.clone())
                .or_default();
            language.samples += 1;
            language.entity += sample_entity;

            match outcome.outcome {
                MatchOutcome::Exact => {
                    result.exact_matches += 1;
                    language.exact_matches += 1;
                }
                MatchOutcome::Partial => {
                    result.partial_matches += 1;
                    language.partial_matches += 1;
                }
                MatchOutcome::Miss => {
                    result.misses += 1;
                    language.misses += 1;
                }
            }

            result.scored_samples += 1;
            result.outcomes.push(outcome);
        }

        tracing::info!(
            samples = result.total_samples,
            exact = result.exact_matches,
            partial = result.partial_matches,
            anomalies = result.anomalies.len(),
            "Evaluation complete"
        );

        Ok(result)
    }

    /// Compare one prediction with its sample's ground truth
    pub fn score_sample(
        &self,
        index: usize,
        sample: &LabeledSample,
        predicted: &EntitySet,
    ) -> Result<SampleOutcome> {
        let truth = sample.ground_truth()?;

        let expected_masked = self
            .redactor
            .rewrite(&sample.text, &truth, self.strategy)?
            .into_owned();
        let predicted_masked = self
            .redactor
            .rewrite(&sample.text, predicted, self.strategy)?
            .into_owned();

        let coverage = Coverage::measure(predicted, &truth);
        let outcome = if predicted_masked == expected_masked {
            MatchOutcome::Exact
        } else if self.is_partial(&coverage) {
            MatchOutcome::Partial
        } else {
            MatchOutcome::Miss
        };

        Ok(SampleOutcome {
            index,
            language: sample.language.clone(),
            outcome,
            expected_masked,
            predicted_masked,
            coverage,
            predicted_count: predicted.len(),
            expected_count: truth.len(),
            entity_metrics: match_entities(predicted, &truth),
        })
    }

    /// At least one overlap and at most `tolerance` of expected chars missed
    fn is_partial(&self, coverage: &Coverage) -> bool {
        if !coverage.any_overlap || coverage.expected == 0 {
            return false;
        }
        let missed = coverage.expected - coverage.found;
        // Small epsilon so that e.g. 14/20 at 30% tolerance counts
        missed as f64 <= self.tolerance * coverage.expected as f64 + 1e-9
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shield::entity::Entity;
    use crate::shield::eval::dataset::LabeledEntity;

    fn predicted(text: &str, spans: &[(usize, usize, &str)]) -> EntitySet {
        let entities = spans
            .iter()
            .map(|(s, e, t)| Entity::new(*s, *e, *t, 0.9, "local"))
            .collect();
        EntitySet::from_entities(entities, text).unwrap()
    }

    #[test]
    fn test_exact_match_with_replace() {
        let text = "Contact john@example.com";
        let sample = LabeledSample::new(
            text,
            vec![LabeledEntity::new(8, 24, "EMAIL_ADDRESS").with_text("john@example.com")],
            "en",
        );
        let evaluator = Evaluator::default().with_strategy(MaskingStrategy::Replace);

        let outcome = evaluator
            .score_sample(0, &sample, &predicted(text, &[(8, 24, "EMAIL_ADDRESS")]))
            .unwrap();

        assert_eq!(outcome.expected_masked, "Contact <EMAIL_ADDRESS>");
        assert_eq!(outcome.predicted_masked, "Contact <EMAIL_ADDRESS>");
        assert_eq!(outcome.outcome, MatchOutcome::Exact);
        assert_eq!(
            outcome.entity_metrics["EMAIL_ADDRESS"],
            DetectionMetrics::new(1, 0, 0)
        );
    }

    #[test]
    fn test_partial_match_within_tolerance() {
        let text = "AAAAAAAAAA BBBBBBBBBB";
        let sample = LabeledSample::new(
            text,
            vec![
                LabeledEntity::new(0, 10, "PERSON"),
                LabeledEntity::new(11, 21, "PERSON"),
            ],
            "en",
        );

        let outcome = Evaluator::default()
            .score_sample(
                0,
                &sample,
                &predicted(text, &[(0, 10, "PERSON"), (11, 16, "PERSON")]),
            )
            .unwrap();

        assert_eq!(outcome.predicted_masked, "********** *****BBBBB");
        assert_eq!(outcome.coverage.found, 15);
        assert_eq!(outcome.outcome, MatchOutcome::Partial);
    }

    #[test]
    fn test_partial_threshold_is_inclusive() {
        let text = "AAAAAAAAAA BBBBBBBBBB";
        let sample = LabeledSample::new(
            text,
            vec![
                LabeledEntity::new(0, 10, "PERSON"),
                LabeledEntity::new(11, 21, "PERSON"),
            ],
            "en",
        );
        let evaluator = Evaluator::default();

        // 14 of 20 is exactly 70%
        let at_threshold = evaluator
            .score_sample(0, &sample, &predicted(text, &[(0, 10, "PERSON"), (11, 15, "PERSON")]))
            .unwrap();
        assert_eq!(at_threshold.outcome, MatchOutcome::Partial);

        let below = evaluator
            .score_sample(0, &sample, &predicted(text, &[(0, 10, "PERSON"), (11, 14, "PERSON")]))
            .unwrap();
        assert_eq!(below.outcome, MatchOutcome::Miss);
    }

    #[test]
    fn test_tolerance_comes_from_config() {
        let text = "AAAAAAAAAA BBBBBBBBBB";
        let sample = LabeledSample::new(
            text,
            vec![
                LabeledEntity::new(0, 10, "PERSON"),
                LabeledEntity::new(11, 21, "PERSON"),
            ],
            "en",
        );
        let prediction = predicted(text, &[(0, 10, "PERSON"), (11, 16, "PERSON")]);

        let strict = Evaluator::from_config(&ShieldConfig {
            partial_match_tolerance: 0.1,
            ..Default::default()
        });
        let outcome = strict.score_sample(0, &sample, &prediction).unwrap();
        assert_eq!(outcome.coverage.found, 15);
        assert_eq!(outcome.outcome, MatchOutcome::Miss);

        let lenient = Evaluator::from_config(&ShieldConfig {
            partial_match_tolerance: 0.25,
            ..Default::default()
        });
        let outcome = lenient.score_sample(0, &sample, &prediction).unwrap();
        assert_eq!(outcome.outcome, MatchOutcome::Partial);
    }

    #[test]
    fn test_no_overlap_is_miss() {
        let text = "Hi John, mail me";
        let sample = LabeledSample::new(text, vec![LabeledEntity::new(3, 7, "PERSON")], "en");

        let outcome = Evaluator::default()
            .score_sample(0, &sample, &predicted(text, &[(9, 13, "PERSON")]))
            .unwrap();
        assert_eq!(outcome.outcome, MatchOutcome::Miss);

        let nothing = Evaluator::default()
            .score_sample(0, &sample, &EntitySet::empty())
            .unwrap();
        assert_eq!(nothing.outcome, MatchOutcome::Miss);
    }

    #[test]
    fn test_clean_sample_with_no_predictions_is_exact() {
        let sample = LabeledSample::new("Nothing to see", vec![], "en");
        let outcome = Evaluator::default()
            .score_sample(0, &sample, &EntitySet::empty())
            .unwrap();
        assert_eq!(outcome.outcome, MatchOutcome::Exact);
    }

    #[test]
    fn test_evaluate_aggregates_and_reports_anomalies() {
        let corpus = Corpus::new(vec![
            LabeledSample::new(
                "Contact john@example.com",
                vec![LabeledEntity::new(8, 24, "EMAIL_ADDRESS")],
                "en",
            ),
            LabeledSample::new(
                "AAAAAAAAAA BBBBBBBBBB",
                vec![
                    LabeledEntity::new(0, 10, "PERSON"),
                    LabeledEntity::new(11, 21, "PERSON"),
                ],
                "ko",
            ),
            LabeledSample::new("Broken", vec![LabeledEntity::new(2, 40, "PERSON")], "en"),
            LabeledSample::new("Clean text", vec![], "en"),
        ]);
        let predictions = vec![
            predicted("Contact john@example.com", &[(8, 24, "EMAIL_ADDRESS")]),
            predicted(
                "AAAAAAAAAA BBBBBBBBBB",
                &[(0, 10, "PERSON"), (11, 16, "PERSON")],
            ),
            EntitySet::empty(),
            predicted("Clean text", &[(0, 5, "PERSON")]),
        ];

        let result = Evaluator::default().evaluate(&corpus, &predictions).unwrap();

        assert_eq!(result.total_samples, 4);
        assert_eq!(result.scored_samples, 3);
        assert_eq!(result.exact_matches, 1);
        assert_eq!(result.partial_matches, 1);
        assert_eq!(result.misses, 1);
        assert_eq!(result.anomalies.len(), 1);
        assert_eq!(result.anomalies[0].index, 2);

        assert_eq!(result.entity, DetectionMetrics::new(2, 2, 1));
        assert_eq!(result.sample, DetectionMetrics::new(2, 1, 0));
        assert_eq!(result.per_entity_type["PERSON"], DetectionMetrics::new(1, 2, 1));

        let en = result.per_language["en"];
        assert_eq!(en.samples, 2);
        assert_eq!(en.exact_matches, 1);
        assert_eq!(result.per_language["ko"].partial_matches, 1);

        assert!((result.exact_accuracy() - 1.0 / 3.0).abs() < 1e-9);
        assert!((result.partial_accuracy() - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_prediction_out_of_bounds_is_anomaly() {
        let corpus = Corpus::new(vec![LabeledSample::new("short", vec![], "en")]);
        let predictions = vec![predicted("a much longer text", &[(10, 15, "PERSON")])];

        let result = Evaluator::default().evaluate(&corpus, &predictions).unwrap();
        assert_eq!(result.scored_samples, 0);
        assert!(result.anomalies[0].reason.contains("exceeds text length"));
    }

    #[test]
    fn test_prediction_count_must_match() {
        let corpus = Corpus::new(vec![LabeledSample::new("a", vec![], "en")]);
        assert!(matches!(
            Evaluator::default().evaluate(&corpus, &[]),
            Err(ShieldError::Config(_))
        ));
    }
}
