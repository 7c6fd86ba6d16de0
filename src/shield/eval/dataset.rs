// Copyright 2025
// SPDX-License-Identifier: Apache-2.0
//
// Labeled evaluation corpus

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::shield::entity::{CharIndex, Entity, EntitySet};
use crate::shield::error::Result;

/// Source tag given to ground-truth entities
pub const GROUND_TRUTH_SOURCE: &str = "ground_truth";

/// A labeled PII span
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledEntity {
    pub start: usize,
    pub end: usize,
    pub entity_type: String,
    /// Covered text, checked against the sample text when present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl LabeledEntity {
    pub fn new(start: usize, end: usize, entity_type: impl Into<String>) -> Self {
        Self {
            start,
            end,
            entity_type: entity_type.into(),
            text: None,
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn to_entity(&self) -> Entity {
        Entity::new(
            self.start,
            self.end,
            self.entity_type.clone(),
            1.0,
            GROUND_TRUTH_SOURCE,
        )
    }
}

/// One labeled text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledSample {
    pub text: String,
    #[serde(default)]
    pub entities: Vec<LabeledEntity>,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

fn default_language() -> String {
    "en".to_string()
}

impl LabeledSample {
    pub fn new(text: impl Into<String>, entities: Vec<LabeledEntity>, language: &str) -> Self {
        Self {
            text: text.into(),
            entities,
            language: language.to_string(),
            metadata: BTreeMap::new(),
        }
    }

    /// Ground truth as a checked entity set
    ///
    /// Fails when a label is out of bounds, empty, overlaps another label,
    /// or carries a `text` that differs from the span it covers.
    pub fn ground_truth(&self) -> Result<EntitySet> {
        let entities: Vec<Entity> = self.entities.iter().map(LabeledEntity::to_entity).collect();
        let set = EntitySet::from_entities(entities, &self.text)?;

        let index = CharIndex::new(&self.text);
        for label in &self.entities {
            if let Some(expected) = &label.text {
                let covered = index
                    .byte_range(label.start, label.end)
                    .map(|range| &self.text[range]);
                if covered != Some(expected.as_str()) {
                    return Err(label
                        .to_entity()
                        .invalid("labeled text does not match span"));
                }
            }
        }

        Ok(set)
    }
}

/// Summary counts over a corpus
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CorpusStatistics {
    pub total_samples: usize,
    pub total_entities: usize,
    pub entity_counts: BTreeMap<String, usize>,
    pub language_counts: BTreeMap<String, usize>,
}

/// Ordered collection of labeled samples
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Corpus {
    #[serde(default)]
    pub samples: Vec<LabeledSample>,
}

impl Corpus {
    pub fn new(samples: Vec<LabeledSample>) -> Self {
        Self { samples }
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, LabeledSample> {
        self.samples.iter()
    }

    pub fn push(&mut self, sample: LabeledSample) {
        self.samples.push(sample);
    }

    pub fn filter_by_language(&self, language: &str) -> Corpus {
        Corpus::new(
            self.samples
                .iter()
                .filter(|s| s.language == language)
                .cloned()
                .collect(),
        )
    }

    /// Samples carrying at least one label of `entity_type`
    pub fn filter_by_entity_type(&self, entity_type: &str) -> Corpus {
        Corpus::new(
            self.samples
                .iter()
                .filter(|s| s.entities.iter().any(|e| e.entity_type == entity_type))
                .cloned()
                .collect(),
        )
    }

    /// Sorted unique entity types across the corpus
    pub fn entity_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self
            .samples
            .iter()
            .flat_map(|s| s.entities.iter().map(|e| e.entity_type.clone()))
            .collect();
        types.sort();
        types.dedup();
        types
    }

    pub fn statistics(&self) -> CorpusStatistics {
        let mut stats = CorpusStatistics {
            total_samples: self.samples.len(),
            ..Default::default()
        };

        for sample in &self.samples {
            *stats
                .language_counts
                .entry(sample.language.clone())
                .or_insert(0) += 1;
            for entity in &sample.entities {
                *stats
                    .entity_counts
                    .entry(entity.entity_type.clone())
                    .or_insert(0) += 1;
                stats.total_entities += 1;
            }
        }

        stats
    }
}

impl<'a> IntoIterator for &'a Corpus {
    type Item = &'a LabeledSample;
    type IntoIter = std::slice::Iter<'a, LabeledSample>;

    fn into_iter(self) -> Self::IntoIter {
        self.samples.iter()
    }
}
