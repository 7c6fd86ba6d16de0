// Copyright 2025
// SPDX-License-Identifier: Apache-2.0
//
// Offset-safe rewriting of detected PII

use serde::Serialize;
use sha2::{Digest, Sha256};
use std::borrow::Cow;
use std::collections::BTreeMap;

use super::config::{MaskingStrategy, ShieldConfig};
use super::entity::{CharIndex, Entity, EntitySet};
use super::error::{Result, ShieldError};

/// Outcome of one protect call
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MaskedResult {
    pub original_text: String,
    pub masked_text: String,
    /// Canonical entities that were actually rewritten
    pub entities: EntitySet,
    pub entity_count: BTreeMap<String, usize>,
    pub strategy: MaskingStrategy,
}

/// Rewrites canonical entity spans according to a masking strategy
#[derive(Debug, Clone)]
pub struct Redactor {
    mask_char: char,
    hash_salt: String,
}

impl Default for Redactor {
    fn default() -> Self {
        Self::new('*', "")
    }
}

impl Redactor {
    pub fn new(mask_char: char, hash_salt: impl Into<String>) -> Self {
        Self {
            mask_char,
            hash_salt: hash_salt.into(),
        }
    }

    pub fn from_config(config: &ShieldConfig) -> Self {
        Self::new(config.mask_char, config.hash_salt.clone())
    }

    /// Rewrite `text` and tally the entity types that were applied
    pub fn redact(
        &self,
        text: &str,
        entities: &EntitySet,
        strategy: MaskingStrategy,
    ) -> Result<MaskedResult> {
        let masked_text = self.rewrite(text, entities, strategy)?.into_owned();

        Ok(MaskedResult {
            original_text: text.to_string(),
            masked_text,
            entities: entities.clone(),
            entity_count: entities.entity_counts(),
            strategy,
        })
    }

    /// Apply masking to the entity spans in `text`
    ///
    /// Output is assembled in one left-to-right pass over the original text,
    /// so each span is located by its original offsets no matter how much
    /// earlier replacements grew or shrank the output.
    ///
    /// # Returns
    /// The original text borrowed when there is nothing to mask, otherwise
    /// the rewritten text
    pub fn rewrite<'a>(
        &self,
        text: &'a str,
        entities: &EntitySet,
        strategy: MaskingStrategy,
    ) -> Result<Cow<'a, str>> {
        if entities.is_empty() {
            // Zero-copy when no masking needed
            return Ok(Cow::Borrowed(text));
        }

        let index = CharIndex::new(text);
        let text_len = index.char_len();

        // Check every span before writing anything
        let mut spans = Vec::with_capacity(entities.len());
        let mut previous_end = 0usize;
        for entity in entities {
            let range = index
                .byte_range(entity.start, entity.end)
                .ok_or(ShieldError::OutOfBounds {
                    start: entity.start,
                    end: entity.end,
                    text_len,
                })?;
            if entity.start < previous_end {
                return Err(entity.invalid("overlaps a preceding entity"));
            }
            previous_end = entity.end;
            spans.push((entity, range));
        }

        let mut result = String::with_capacity(text.len());
        let mut cursor = 0usize;
        for (entity, range) in spans {
            result.push_str(&text[cursor..range.start]);
            self.push_replacement(&mut result, &text[range.clone()], entity, strategy);
            cursor = range.end;
        }
        result.push_str(&text[cursor..]);

        Ok(Cow::Owned(result))
    }

    fn push_replacement(
        &self,
        out: &mut String,
        value: &str,
        entity: &Entity,
        strategy: MaskingStrategy,
    ) {
        match strategy {
            MaskingStrategy::Mask => {
                out.extend(std::iter::repeat(self.mask_char).take(entity.span_len()))
            }
            MaskingStrategy::Replace => {
                out.push('<');
                out.push_str(&entity.entity_type);
                out.push('>');
            }
            MaskingStrategy::Redact => {}
            MaskingStrategy::Hash => out.push_str(&self.hash_value(value)),
        }
    }

    /// Salted SHA256 of a value, lowercase hex
    pub fn hash_value(&self, value: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.hash_salt.as_bytes());
        hasher.update(value.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}
