// Copyright 2025
// SPDX-License-Identifier: Apache-2.0
//
// Detector contract and the local pattern-based detector

use async_trait::async_trait;

use super::config::PatternConfig;
use super::entity::{CharIndex, Entity};
use super::error::{Result, ShieldError};
use super::patterns::{compile_patterns, CompiledPatterns};

/// A PII detection backend
///
/// Backends only produce raw, possibly overlapping entities; merging is
/// done by the fusion resolver. Any failure to reach or use the backend
/// should be reported as `ShieldError::DetectionUnavailable`.
#[async_trait]
pub trait Detector: Send + Sync {
    /// Tag stamped on every entity this backend produces
    fn source(&self) -> &str;

    /// Detect PII in `text`, offsets in characters
    async fn detect(&self, text: &str, language: &str) -> Result<Vec<Entity>>;

    /// Entity types this backend can report for `language`, if known
    fn supported_entities(&self, _language: &str) -> Vec<String> {
        Vec::new()
    }
}

/// Local detector built from regex recognizers
///
/// # Example
/// ```
/// use pii_shield::{PatternConfig, PatternDetector};
///
/// let detector = PatternDetector::new(&PatternConfig::default()).unwrap();
/// let entities = detector.scan("Contact john@example.com", "en").unwrap();
/// assert_eq!(entities[0].entity_type, "EMAIL_ADDRESS");
/// assert_eq!((entities[0].start, entities[0].end), (8, 24));
/// ```
pub struct PatternDetector {
    patterns: CompiledPatterns,
    source: String,
    languages: Vec<String>,
}

impl PatternDetector {
    pub fn new(config: &PatternConfig) -> Result<Self> {
        let patterns = compile_patterns(config)?;
        Ok(Self {
            patterns,
            source: config.source.clone(),
            languages: config.languages.clone(),
        })
    }

    pub fn supports_language(&self, language: &str) -> bool {
        self.languages.iter().any(|l| l == language)
    }

    /// Entity types this detector can emit for `language`
    pub fn supported_entities(&self, language: &str) -> Vec<String> {
        let mut types: Vec<String> = self
            .patterns
            .patterns
            .iter()
            .filter(|p| p.supports(language))
            .map(|p| p.entity_type.clone())
            .collect();
        types.sort();
        types.dedup();
        types
    }

    /// Synchronous detection used by the async contract
    pub fn scan(&self, text: &str, language: &str) -> Result<Vec<Entity>> {
        if !self.supports_language(language) {
            return Err(ShieldError::DetectionUnavailable {
                detector: self.source.clone(),
                reason: format!("language '{language}' not supported"),
            });
        }

        let index = CharIndex::new(text);
        let mut entities = Vec::new();

        // RegexSet tells us which recognizers can match at all
        let matches = self.patterns.regex_set.matches(text);

        for pattern_idx in matches.iter() {
            let pattern = &self.patterns.patterns[pattern_idx];
            if !pattern.supports(language) {
                continue;
            }

            for mat in pattern.regex.find_iter(text) {
                let value = mat.as_str();

                if pattern.digit_bounded && !digit_bounded(text, mat.start(), mat.end()) {
                    continue;
                }
                if !pattern.validator.accepts(value) {
                    continue;
                }
                if self.is_whitelisted(value) {
                    continue;
                }

                // Regex offsets always sit on char boundaries
                let (Some(start), Some(end)) =
                    (index.char_offset(mat.start()), index.char_offset(mat.end()))
                else {
                    continue;
                };

                entities.push(Entity::new(
                    start,
                    end,
                    pattern.entity_type.clone(),
                    pattern.score,
                    self.source.clone(),
                ));
            }
        }

        entities.sort_by_key(|e| (e.start, e.end));

        tracing::debug!(
            source = %self.source,
            language,
            found = entities.len(),
            "Pattern scan complete"
        );

        Ok(entities)
    }

    fn is_whitelisted(&self, value: &str) -> bool {
        self.patterns
            .whitelist
            .iter()
            .any(|pattern| pattern.is_match(value))
    }
}

#[async_trait]
impl Detector for PatternDetector {
    fn source(&self) -> &str {
        &self.source
    }

    async fn detect(&self, text: &str, language: &str) -> Result<Vec<Entity>> {
        self.scan(text, language)
    }

    fn supported_entities(&self, language: &str) -> Vec<String> {
        PatternDetector::supported_entities(self, language)
    }
}

/// True when the bytes around `[start, end)` are not ASCII digits
fn digit_bounded(text: &str, start: usize, end: usize) -> bool {
    let bytes = text.as_bytes();
    let before = start
        .checked_sub(1)
        .and_then(|i| bytes.get(i))
        .is_some_and(u8::is_ascii_digit);
    let after = bytes.get(end).is_some_and(u8::is_ascii_digit);
    !before && !after
}
