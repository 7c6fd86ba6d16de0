// Copyright 2025
// SPDX-License-Identifier: Apache-2.0
//
// Precision/recall bookkeeping for PII detection

use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::ops::AddAssign;

use crate::shield::entity::{Entity, EntitySet};

/// Confusion counts with derived ratios
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DetectionMetrics {
    pub true_positives: usize,
    pub false_positives: usize,
    pub false_negatives: usize,
}

impl DetectionMetrics {
    pub fn new(true_positives: usize, false_positives: usize, false_negatives: usize) -> Self {
        Self {
            true_positives,
            false_positives,
            false_negatives,
        }
    }

    /// TP / (TP + FP)
    pub fn precision(&self) -> f64 {
        ratio(self.true_positives, self.true_positives + self.false_positives)
    }

    /// TP / (TP + FN)
    pub fn recall(&self) -> f64 {
        ratio(self.true_positives, self.true_positives + self.false_negatives)
    }

    pub fn f1(&self) -> f64 {
        let (p, r) = (self.precision(), self.recall());
        if p + r > 0.0 {
            2.0 * p * r / (p + r)
        } else {
            0.0
        }
    }

    /// TP / (TP + FP + FN)
    pub fn accuracy(&self) -> f64 {
        ratio(
            self.true_positives,
            self.true_positives + self.false_positives + self.false_negatives,
        )
    }
}

impl AddAssign for DetectionMetrics {
    fn add_assign(&mut self, other: Self) {
        self.true_positives += other.true_positives;
        self.false_positives += other.false_positives;
        self.false_negatives += other.false_negatives;
    }
}

pub(crate) fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

/// Exact `(start, end, entity_type)` matching of predictions to ground truth
///
/// Matching is one-to-one: a ground-truth entity absorbs at most one
/// prediction with the same key.
pub fn match_entities(
    predicted: &EntitySet,
    ground_truth: &EntitySet,
) -> BTreeMap<String, DetectionMetrics> {
    let mut unmatched: HashMap<(usize, usize, &str), usize> = HashMap::new();
    for entity in ground_truth {
        *unmatched.entry(entity.key()).or_insert(0) += 1;
    }

    let mut per_type: BTreeMap<String, DetectionMetrics> = BTreeMap::new();

    for entity in predicted {
        let metrics = per_type.entry(entity.entity_type.clone()).or_default();
        match unmatched.get_mut(&entity.key()) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                metrics.true_positives += 1;
            }
            _ => metrics.false_positives += 1,
        }
    }

    for entity in ground_truth {
        if let Some(remaining) = unmatched.get_mut(&entity.key()) {
            if *remaining > 0 {
                *remaining -= 1;
                per_type
                    .entry(entity.entity_type.clone())
                    .or_default()
                    .false_negatives += 1;
            }
        }
    }

    per_type
}

/// Sum per-type metrics into one total
pub fn overall(per_type: &BTreeMap<String, DetectionMetrics>) -> DetectionMetrics {
    per_type
        .values()
        .fold(DetectionMetrics::default(), |mut acc, m| {
            acc += *m;
            acc
        })
}

/// Character coverage of ground truth by predictions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Coverage {
    /// Characters covered by ground truth
    pub expected: usize,
    /// Ground-truth characters also covered by a prediction
    pub found: usize,
    /// Whether any prediction overlaps any ground-truth entity
    pub any_overlap: bool,
}

impl Coverage {
    pub fn measure(predicted: &EntitySet, ground_truth: &EntitySet) -> Self {
        let expected = ground_truth.covered_chars();
        let mut found = 0usize;
        let mut any_overlap = false;

        // Both sets are sorted and disjoint, so a merge walk suffices
        let gt: &[Entity] = ground_truth.as_slice();
        let mut j = 0usize;
        for pred in predicted {
            while j < gt.len() && gt[j].end <= pred.start {
                j += 1;
            }
            let mut k = j;
            while k < gt.len() && gt[k].start < pred.end {
                let lo = pred.start.max(gt[k].start);
                let hi = pred.end.min(gt[k].end);
                if lo < hi {
                    found += hi - lo;
                    any_overlap = true;
                }
                k += 1;
            }
        }

        Self {
            expected,
            found,
            any_overlap,
        }
    }

    /// found / expected, 0 when nothing was expected
    pub fn ratio(&self) -> f64 {
        ratio(self.found, self.expected)
    }
}
