// Copyright 2025
// SPDX-License-Identifier: Apache-2.0
//
// Regex recognizers for the local pattern detector
// Uses RegexSet to pick the recognizers worth running on a text

use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder, RegexSet};

use super::config::PatternConfig;
use super::error::Result;

/// Extra check applied to a regex match before it is reported
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Validator {
    None,
    /// Luhn checksum over the digits of the match
    Luhn,
    /// Korean resident registration number checksum
    KrRrn,
}

impl Validator {
    pub fn accepts(&self, value: &str) -> bool {
        match self {
            Validator::None => true,
            Validator::Luhn => luhn_valid(value),
            Validator::KrRrn => kr_rrn_valid(value),
        }
    }
}

/// Compiled recognizer with metadata
#[derive(Debug, Clone)]
pub struct CompiledPattern {
    pub entity_type: String,
    pub regex: Regex,
    pub score: f64,
    /// Empty means the recognizer applies to every language
    pub languages: Vec<String>,
    pub validator: Validator,
    /// Neighbouring characters must not be ASCII digits
    pub digit_bounded: bool,
}

impl CompiledPattern {
    pub fn supports(&self, language: &str) -> bool {
        self.languages.is_empty() || self.languages.iter().any(|l| l == language)
    }
}

/// All compiled recognizers with a RegexSet pre-filter
pub struct CompiledPatterns {
    pub regex_set: RegexSet,
    pub patterns: Vec<CompiledPattern>,
    pub whitelist: Vec<Regex>,
}

/// Built-in recognizer definition
struct PatternDef {
    entity_type: &'static str,
    pattern: &'static str,
    score: f64,
    languages: &'static [&'static str],
    validator: Validator,
    digit_bounded: bool,
}

const ALL: &[&str] = &[];
const EN: &[&str] = &["en"];
const KO: &[&str] = &["ko"];

static BUILTIN_PATTERNS: Lazy<Vec<PatternDef>> = Lazy::new(|| {
    vec![
        PatternDef {
            entity_type: "EMAIL_ADDRESS",
            pattern: r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b",
            score: 0.85,
            languages: ALL,
            validator: Validator::None,
            digit_bounded: false,
        },
        PatternDef {
            entity_type: "IP_ADDRESS",
            pattern: r"\b(?:(?:25[0-5]|2[0-4][0-9]|[01]?[0-9][0-9]?)\.){3}(?:25[0-5]|2[0-4][0-9]|[01]?[0-9][0-9]?)\b",
            score: 0.85,
            languages: ALL,
            validator: Validator::None,
            digit_bounded: false,
        },
        PatternDef {
            entity_type: "IP_ADDRESS",
            pattern: r"\b(?:[A-Fa-f0-9]{1,4}:){7}[A-Fa-f0-9]{1,4}\b",
            score: 0.85,
            languages: ALL,
            validator: Validator::None,
            digit_bounded: false,
        },
        PatternDef {
            entity_type: "CREDIT_CARD",
            pattern: r"\b(?:[0-9]{4}[-\s]?){3}[0-9]{4}\b",
            score: 0.8,
            languages: ALL,
            validator: Validator::Luhn,
            digit_bounded: false,
        },
        PatternDef {
            entity_type: "IBAN_CODE",
            pattern: r"\b[A-Z]{2}[0-9]{2}[A-Z0-9]{4}[0-9]{7}(?:[A-Z0-9]{0,16})\b",
            score: 0.7,
            languages: ALL,
            validator: Validator::None,
            digit_bounded: false,
        },
        PatternDef {
            entity_type: "URL",
            pattern: r#"\bhttps?://[^\s<>"']+"#,
            score: 0.6,
            languages: ALL,
            validator: Validator::None,
            digit_bounded: false,
        },
        PatternDef {
            entity_type: "US_SSN",
            pattern: r"\b[0-9]{3}-[0-9]{2}-[0-9]{4}\b",
            score: 0.85,
            languages: EN,
            validator: Validator::None,
            digit_bounded: false,
        },
        PatternDef {
            entity_type: "PHONE_NUMBER",
            pattern: r"(?:(?:\+|\b)1[-.\s]?)?(?:\([0-9]{3}\)\s?|\b[0-9]{3}[-.\s])[0-9]{3}[-.\s][0-9]{4}\b",
            score: 0.75,
            languages: EN,
            validator: Validator::None,
            digit_bounded: false,
        },
        PatternDef {
            entity_type: "KR_RESIDENT_REGISTRATION_NUMBER",
            pattern: r"[0-9]{6}-[1-8][0-9]{6}",
            score: 0.85,
            languages: KO,
            validator: Validator::KrRrn,
            digit_bounded: true,
        },
        PatternDef {
            entity_type: "KR_RESIDENT_REGISTRATION_NUMBER",
            pattern: r"[0-9]{13}",
            score: 0.5,
            languages: KO,
            validator: Validator::KrRrn,
            digit_bounded: true,
        },
        PatternDef {
            entity_type: "KR_PHONE_NUMBER",
            pattern: r"01[016789]-[0-9]{3,4}-[0-9]{4}",
            score: 0.85,
            languages: KO,
            validator: Validator::None,
            digit_bounded: true,
        },
        PatternDef {
            entity_type: "KR_PHONE_NUMBER",
            pattern: r"01[016789][0-9]{7,8}",
            score: 0.6,
            languages: KO,
            validator: Validator::None,
            digit_bounded: true,
        },
        PatternDef {
            entity_type: "KR_PHONE_NUMBER",
            pattern: r"0[0-9]{1,2}-[0-9]{3,4}-[0-9]{4}",
            score: 0.8,
            languages: KO,
            validator: Validator::None,
            digit_bounded: true,
        },
    ]
});

fn build_regex(pattern: &str) -> Result<Regex> {
    Ok(RegexBuilder::new(pattern).case_insensitive(true).build()?)
}

/// Compile built-in and custom recognizers plus the whitelist
pub fn compile_patterns(config: &PatternConfig) -> Result<CompiledPatterns> {
    let mut pattern_strings = Vec::new();
    let mut patterns = Vec::new();

    for def in BUILTIN_PATTERNS.iter() {
        pattern_strings.push(format!("(?i){}", def.pattern));
        patterns.push(CompiledPattern {
            entity_type: def.entity_type.to_string(),
            regex: build_regex(def.pattern)?,
            score: def.score,
            languages: def.languages.iter().map(|l| l.to_string()).collect(),
            validator: def.validator,
            digit_bounded: def.digit_bounded,
        });
    }

    for custom in config.custom_patterns.iter().filter(|c| c.enabled) {
        pattern_strings.push(format!("(?i){}", custom.pattern));
        patterns.push(CompiledPattern {
            entity_type: custom.entity_type.clone(),
            regex: build_regex(&custom.pattern)?,
            score: custom.score,
            languages: custom.languages.clone(),
            validator: Validator::None,
            digit_bounded: false,
        });
    }

    let regex_set = if pattern_strings.is_empty() {
        RegexSet::empty()
    } else {
        RegexSet::new(&pattern_strings)?
    };

    let whitelist = config
        .whitelist_patterns
        .iter()
        .map(|p| build_regex(p))
        .collect::<Result<Vec<_>>>()?;

    tracing::debug!(
        recognizers = patterns.len(),
        whitelist = whitelist.len(),
        "Compiled PII recognizers"
    );

    Ok(CompiledPatterns {
        regex_set,
        patterns,
        whitelist,
    })
}

fn luhn_valid(value: &str) -> bool {
    let digits: Vec<u32> = value.chars().filter_map(|c| c.to_digit(10)).collect();
    if digits.len() < 12 {
        return false;
    }

    let sum: u32 = digits
        .iter()
        .rev()
        .enumerate()
        .map(|(i, &d)| {
            if i % 2 == 1 {
                let doubled = d * 2;
                if doubled > 9 {
                    doubled - 9
                } else {
                    doubled
                }
            } else {
                d
            }
        })
        .sum();

    sum % 10 == 0
}

fn kr_rrn_valid(value: &str) -> bool {
    const WEIGHTS: [u32; 12] = [2, 3, 4, 5, 6, 7, 8, 9, 2, 3, 4, 5];

    let digits: Vec<u32> = value.chars().filter_map(|c| c.to_digit(10)).collect();
    if digits.len() != 13 {
        return false;
    }

    let total: u32 = digits.iter().zip(WEIGHTS.iter()).map(|(d, w)| d * w).sum();
    let check = (11 - total % 11) % 10;
    check == digits[12]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shield::config::CustomPattern;

    #[test]
    fn test_compile_patterns() {
        let compiled = compile_patterns(&PatternConfig::default()).unwrap();

        assert!(!compiled.patterns.is_empty());
        assert_eq!(compiled.regex_set.len(), compiled.patterns.len());
        assert!(compiled.whitelist.is_empty());
    }

    #[test]
    fn test_email_pattern() {
        let compiled = compile_patterns(&PatternConfig::default()).unwrap();
        let text = "Contact me at john.doe@example.com";
        let matches: Vec<_> = compiled.regex_set.matches(text).into_iter().collect();

        assert!(matches
            .iter()
            .any(|&i| compiled.patterns[i].entity_type == "EMAIL_ADDRESS"));
    }

    #[test]
    fn test_language_support() {
        let compiled = compile_patterns(&PatternConfig::default()).unwrap();
        let ssn = compiled
            .patterns
            .iter()
            .find(|p| p.entity_type == "US_SSN")
            .unwrap();
        assert!(ssn.supports("en"));
        assert!(!ssn.supports("ko"));

        let email = compiled
            .patterns
            .iter()
            .find(|p| p.entity_type == "EMAIL_ADDRESS")
            .unwrap();
        assert!(email.supports("ko"));
    }

    #[test]
    fn test_custom_and_disabled_patterns() {
        let config = PatternConfig {
            custom_patterns: vec![
                CustomPattern {
                    pattern: r"EMP-\d{6}".into(),
                    entity_type: "EMPLOYEE_ID".into(),
                    score: 0.9,
                    languages: vec![],
                    enabled: true,
                },
                CustomPattern {
                    pattern: r"TMP-\d+".into(),
                    entity_type: "TEMP_ID".into(),
                    score: 0.9,
                    languages: vec![],
                    enabled: false,
                },
            ],
            ..Default::default()
        };
        let compiled = compile_patterns(&config).unwrap();

        assert!(compiled.patterns.iter().any(|p| p.entity_type == "EMPLOYEE_ID"));
        assert!(!compiled.patterns.iter().any(|p| p.entity_type == "TEMP_ID"));
    }

    #[test]
    fn test_invalid_whitelist_rejected() {
        let config = PatternConfig {
            whitelist_patterns: vec!["(unclosed".into()],
            ..Default::default()
        };
        assert!(compile_patterns(&config).is_err());
    }

    #[test]
    fn test_luhn() {
        assert!(luhn_valid("4111-1111-1111-1111"));
        assert!(luhn_valid("4532015112830366"));
        assert!(!luhn_valid("4111-1111-1111-1112"));
        assert!(!luhn_valid("1234"));
    }

    #[test]
    fn test_kr_rrn_checksum() {
        assert!(kr_rrn_valid("900101-1234568"));
        assert!(!kr_rrn_valid("900101-1234567"));
        assert!(!kr_rrn_valid("900101-123456"));
        assert!(Validator::None.accepts("anything"));
        assert!(Validator::KrRrn.accepts("900101-1234568"));
    }
}
