// Copyright 2025
// SPDX-License-Identifier: Apache-2.0
//
// Entity model shared by detectors, fusion, redaction and evaluation
//
// All offsets are character (Unicode scalar) positions, never byte positions.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::Range;

use super::error::{Result, ShieldError};

/// Ordering/equality key of an entity: `(start, end, entity_type)`
pub type EntityKey<'a> = (usize, usize, &'a str);

/// A detected span of text tagged with a PII category
///
/// An entity is only meaningful paired with the text it was produced from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub start: usize,
    pub end: usize,
    pub entity_type: String,
    pub score: f64,
    pub source: String,
}

impl Entity {
    pub fn new(
        start: usize,
        end: usize,
        entity_type: impl Into<String>,
        score: f64,
        source: impl Into<String>,
    ) -> Self {
        Self {
            start,
            end,
            entity_type: entity_type.into(),
            score,
            source: source.into(),
        }
    }

    /// Number of characters covered by the span
    pub fn span_len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn key(&self) -> EntityKey<'_> {
        (self.start, self.end, self.entity_type.as_str())
    }

    /// True when the two half-open ranges share at least one character
    pub fn overlaps(&self, other: &Entity) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Check the span invariant `start < end <= text_len` and the score range
    pub fn validate(&self, text_len: usize) -> Result<()> {
        if self.start >= self.end {
            return Err(self.invalid("start must be before end"));
        }
        if self.end > text_len {
            return Err(self.invalid(&format!("end exceeds text length {text_len}")));
        }
        if !self.score.is_finite() || !(0.0..=1.0).contains(&self.score) {
            return Err(self.invalid(&format!("score {} outside [0, 1]", self.score)));
        }
        Ok(())
    }

    /// Substring covered by this entity, or `None` if it does not fit `text`
    pub fn text<'a>(&self, text: &'a str) -> Option<&'a str> {
        let index = CharIndex::new(text);
        index.byte_range(self.start, self.end).map(|r| &text[r])
    }

    pub(crate) fn invalid(&self, reason: &str) -> ShieldError {
        ShieldError::InvalidEntity {
            start: self.start,
            end: self.end,
            entity_type: self.entity_type.clone(),
            reason: reason.to_string(),
        }
    }
}

/// Sorted, non-overlapping entities for one text buffer
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct EntitySet {
    entities: Vec<Entity>,
}

impl EntitySet {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a set from arbitrary entities, rejecting anything that would
    /// break the set invariant instead of repairing it.
    pub fn from_entities(mut entities: Vec<Entity>, text: &str) -> Result<Self> {
        let text_len = text.chars().count();
        for entity in &entities {
            entity.validate(text_len)?;
        }

        entities.sort_by(|a, b| a.start.cmp(&b.start).then(a.end.cmp(&b.end)));

        for pair in entities.windows(2) {
            if pair[0].end > pair[1].start {
                return Err(pair[1].invalid(&format!(
                    "overlaps entity [{}, {})",
                    pair[0].start, pair[0].end
                )));
            }
        }

        Ok(Self { entities })
    }

    /// Caller guarantees entities are validated, sorted by start and disjoint
    pub(crate) fn from_sorted_unchecked(entities: Vec<Entity>) -> Self {
        debug_assert!(entities.windows(2).all(|p| p[0].end <= p[1].start));
        Self { entities }
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Entity> {
        self.entities.iter()
    }

    pub fn as_slice(&self) -> &[Entity] {
        &self.entities
    }

    pub fn into_vec(self) -> Vec<Entity> {
        self.entities
    }

    /// Occurrences of each entity type in the set
    pub fn entity_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for entity in &self.entities {
            *counts.entry(entity.entity_type.clone()).or_insert(0) += 1;
        }
        counts
    }

    /// Total characters covered by the set
    pub fn covered_chars(&self) -> usize {
        self.entities.iter().map(Entity::span_len).sum()
    }
}

impl<'a> IntoIterator for &'a EntitySet {
    type Item = &'a Entity;
    type IntoIter = std::slice::Iter<'a, Entity>;

    fn into_iter(self) -> Self::IntoIter {
        self.entities.iter()
    }
}

/// Character-offset to byte-offset lookup for one text buffer
pub(crate) struct CharIndex {
    // Byte offset of every char boundary, including the end of the text
    offsets: Vec<usize>,
}

impl CharIndex {
    pub(crate) fn new(text: &str) -> Self {
        let mut offsets: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
        offsets.push(text.len());
        Self { offsets }
    }

    pub(crate) fn char_len(&self) -> usize {
        self.offsets.len() - 1
    }

    pub(crate) fn byte_range(&self, start: usize, end: usize) -> Option<Range<usize>> {
        if start > end {
            return None;
        }
        Some(*self.offsets.get(start)?..*self.offsets.get(end)?)
    }

    /// Char offset of a byte position that sits on a char boundary
    pub(crate) fn char_offset(&self, byte: usize) -> Option<usize> {
        self.offsets.binary_search(&byte).ok()
    }
}
