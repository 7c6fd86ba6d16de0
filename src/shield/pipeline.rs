// Copyright 2025
// SPDX-License-Identifier: Apache-2.0
//
// Shield orchestrator: detectors -> filter -> fusion -> redaction

use futures::future::join_all;
use std::sync::Arc;

use super::config::{FallbackPolicy, MaskingStrategy, ShieldConfig};
use super::detector::{Detector, PatternDetector};
use super::entity::{Entity, EntitySet};
use super::error::{Result, ShieldError};
use super::eval::{Corpus, EvaluationResult, Evaluator};
use super::fusion::{FusionResolver, SourcePriority};
use super::masking::{MaskedResult, Redactor};

/// Detect, fuse and rewrite PII using a fixed configuration
pub struct Shield {
    config: ShieldConfig,
    detectors: Vec<Arc<dyn Detector>>,
    resolver: FusionResolver,
    redactor: Redactor,
    evaluator: Evaluator,
}

impl Shield {
    /// Shield with no detectors registered yet
    pub fn new(config: ShieldConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            resolver: FusionResolver::new(SourcePriority::new(config.source_priority.clone())),
            redactor: Redactor::from_config(&config),
            evaluator: Evaluator::from_config(&config),
            detectors: Vec::new(),
            config,
        })
    }

    /// Shield backed by the local pattern detector built from `config.patterns`
    pub fn with_pattern_detector(config: ShieldConfig) -> Result<Self> {
        let detector = PatternDetector::new(&config.patterns)?;
        Ok(Self::new(config)?.with_detector(detector))
    }

    pub fn with_detector(mut self, detector: impl Detector + 'static) -> Self {
        self.register(Arc::new(detector));
        self
    }

    pub fn register(&mut self, detector: Arc<dyn Detector>) {
        tracing::debug!(source = detector.source(), "Registered detector");
        self.detectors.push(detector);
    }

    pub fn config(&self) -> &ShieldConfig {
        &self.config
    }

    pub fn detector_sources(&self) -> Vec<&str> {
        self.detectors.iter().map(|d| d.source()).collect()
    }

    /// Union of entity types the registered detectors report for `language`
    pub fn supported_entities(&self, language: Option<&str>) -> Vec<String> {
        let language = language.unwrap_or(self.config.default_language.as_str());
        let mut types: Vec<String> = self
            .detectors
            .iter()
            .flat_map(|d| d.supported_entities(language))
            .filter(|t| self.config.allows_type(t))
            .collect();
        types.sort();
        types.dedup();
        types
    }

    /// Canonical entities for `text` without rewriting it
    pub async fn detect_only(&self, text: &str, language: Option<&str>) -> Result<EntitySet> {
        let language = language.unwrap_or(self.config.default_language.as_str());
        let raw = self.collect(text, language).await?;
        self.resolver.resolve(text, raw)
    }

    /// Detect and rewrite PII in `text`
    pub async fn protect(
        &self,
        text: &str,
        language: Option<&str>,
        strategy: Option<MaskingStrategy>,
    ) -> Result<MaskedResult> {
        let entities = self.detect_only(text, language).await?;
        let strategy = strategy.unwrap_or(self.config.default_strategy);
        self.redactor.redact(text, &entities, strategy)
    }

    /// `protect` over many texts; fails on the first failing text
    pub async fn protect_batch<S: AsRef<str>>(
        &self,
        texts: &[S],
        language: Option<&str>,
        strategy: Option<MaskingStrategy>,
    ) -> Result<Vec<MaskedResult>> {
        let results = join_all(
            texts
                .iter()
                .map(|text| self.protect(text.as_ref(), language, strategy)),
        )
        .await;

        tracing::debug!(texts = texts.len(), "Protected batch");
        results.into_iter().collect()
    }

    /// Run detection on every corpus sample and score it
    pub async fn evaluate(&self, corpus: &Corpus) -> Result<EvaluationResult> {
        let predictions = join_all(
            corpus
                .iter()
                .map(|sample| self.detect_only(&sample.text, Some(sample.language.as_str()))),
        )
        .await
        .into_iter()
        .collect::<Result<Vec<_>>>()?;

        self.evaluator.evaluate(corpus, &predictions)
    }

    /// Run every detector concurrently and apply the fallback policy
    async fn collect(&self, text: &str, language: &str) -> Result<Vec<Vec<Entity>>> {
        if self.detectors.is_empty() {
            return Err(ShieldError::Config("no detectors configured".into()));
        }

        let outputs = join_all(
            self.detectors
                .iter()
                .map(|detector| detector.detect(text, language)),
        )
        .await;

        let text_len = text.chars().count();
        let mut accepted = Vec::with_capacity(outputs.len());
        let mut last_failure = None;

        for (detector, output) in self.detectors.iter().zip(outputs) {
            match output {
                Ok(entities) => accepted.push(self.admit(entities, text_len)?),
                Err(e) => {
                    let err = ShieldError::unavailable(detector.source(), e);
                    if self.config.fallback == FallbackPolicy::Strict {
                        return Err(err);
                    }
                    tracing::warn!(
                        source = detector.source(),
                        language,
                        error = %err,
                        "Detector failed, continuing with remaining sources"
                    );
                    last_failure = Some(err);
                }
            }
        }

        match last_failure {
            Some(err) if accepted.is_empty() => Err(err),
            _ => Ok(accepted),
        }
    }

    /// Validate raw output, then drop low scores and disallowed types
    fn admit(&self, entities: Vec<Entity>, text_len: usize) -> Result<Vec<Entity>> {
        for entity in &entities {
            entity.validate(text_len)?;
        }

        Ok(entities
            .into_iter()
            .filter(|e| e.score >= self.config.score_threshold)
            .filter(|e| self.config.allows_type(&e.entity_type))
            .collect())
    }
}
