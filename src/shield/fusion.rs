// Copyright 2025
// SPDX-License-Identifier: Apache-2.0
//
// Fusion of raw detector output into one canonical entity set
//
// Interval-union clustering followed by a pure per-cluster reduction:
// O(n log n) for the sort, O(n) for clustering and winner selection.

use std::cmp::Ordering;

use super::entity::{Entity, EntitySet};
use super::error::Result;

/// Fixed tie-break ranking of detector sources, highest priority first
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourcePriority {
    order: Vec<String>,
}

impl SourcePriority {
    pub fn new<I, S>(order: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            order: order.into_iter().map(Into::into).collect(),
        }
    }

    /// Lower is better; unlisted sources rank after every listed one
    pub fn rank(&self, source: &str) -> usize {
        self.order
            .iter()
            .position(|s| s == source)
            .unwrap_or(self.order.len())
    }
}

impl Default for SourcePriority {
    fn default() -> Self {
        Self::new(["cloud", "local"])
    }
}

/// Merges overlapping entity lists from several detectors
#[derive(Debug, Clone, Default)]
pub struct FusionResolver {
    priority: SourcePriority,
}

impl FusionResolver {
    pub fn new(priority: SourcePriority) -> Self {
        Self { priority }
    }

    /// Fuse raw entity lists produced for `text` into a non-overlapping set.
    ///
    /// Every cluster of transitively overlapping entities collapses to a
    /// single winner; losers are dropped whole, never clipped. The result
    /// does not depend on the order of `sources` or of entities within them.
    pub fn resolve<I>(&self, text: &str, sources: I) -> Result<EntitySet>
    where
        I: IntoIterator<Item = Vec<Entity>>,
    {
        let text_len = text.chars().count();
        let mut all: Vec<Entity> = sources.into_iter().flatten().collect();

        for entity in &all {
            entity.validate(text_len)?;
        }

        if all.is_empty() {
            return Ok(EntitySet::empty());
        }

        let raw_count = all.len();
        all.sort_by(|a, b| {
            a.start
                .cmp(&b.start)
                .then_with(|| b.span_len().cmp(&a.span_len()))
        });

        let clusters = overlap_clusters(all);
        let cluster_count = clusters.len();

        let mut winners: Vec<Entity> = clusters
            .into_iter()
            .filter_map(|cluster| self.pick_winner(cluster))
            .collect();
        winners.sort_by_key(|e| e.start);

        tracing::debug!(
            raw = raw_count,
            clusters = cluster_count,
            kept = winners.len(),
            "Fused detector output"
        );

        Ok(EntitySet::from_sorted_unchecked(winners))
    }

    fn pick_winner(&self, cluster: Vec<Entity>) -> Option<Entity> {
        cluster.into_iter().reduce(|best, candidate| {
            if self.precedence(&candidate, &best) == Ordering::Greater {
                candidate
            } else {
                best
            }
        })
    }

    /// `Greater` when `a` should win over `b`
    fn precedence(&self, a: &Entity, b: &Entity) -> Ordering {
        a.span_len()
            .cmp(&b.span_len())
            .then_with(|| a.score.total_cmp(&b.score))
            .then_with(|| {
                self.priority
                    .rank(&b.source)
                    .cmp(&self.priority.rank(&a.source))
            })
            .then_with(|| b.start.cmp(&a.start))
            .then_with(|| b.entity_type.cmp(&a.entity_type))
            .then_with(|| b.source.cmp(&a.source))
    }
}

/// Group start-sorted entities into clusters of transitive overlap
fn overlap_clusters(sorted: Vec<Entity>) -> Vec<Vec<Entity>> {
    let mut clusters: Vec<Vec<Entity>> = Vec::new();
    let mut cluster_end = 0usize;

    for entity in sorted {
        match clusters.last_mut() {
            Some(current) if entity.start < cluster_end => {
                cluster_end = cluster_end.max(entity.end);
                current.push(entity);
            }
            _ => {
                cluster_end = entity.end;
                clusters.push(vec![entity]);
            }
        }
    }

    clusters
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shield::error::ShieldError;
    use proptest::prelude::*;

    const TEXT: &str = "0123456789abcdefghijklmnopqrstuvwxyz";

    fn entity(start: usize, end: usize, entity_type: &str, score: f64, source: &str) -> Entity {
        Entity::new(start, end, entity_type, score, source)
    }

    fn spans(set: &EntitySet) -> Vec<(usize, usize)> {
        set.iter().map(|e| (e.start, e.end)).collect()
    }

    #[test]
    fn test_widest_wins_regardless_of_order() {
        let resolver = FusionResolver::default();
        let a = entity(0, 4, "PERSON", 0.7, "x");
        let b = entity(0, 8, "PERSON", 0.6, "y");

        let forward = resolver
            .resolve(TEXT, vec![vec![a.clone()], vec![b.clone()]])
            .unwrap();
        let backward = resolver.resolve(TEXT, vec![vec![b], vec![a]]).unwrap();

        assert_eq!(spans(&forward), vec![(0, 8)]);
        assert_eq!(forward, backward);
        assert_eq!(forward.as_slice()[0].source, "y");
    }

    #[test]
    fn test_three_way_chain_collapses_to_one() {
        let resolver = FusionResolver::default();
        let set = resolver
            .resolve(
                TEXT,
                vec![vec![
                    entity(0, 5, "PERSON", 0.9, "local"),
                    entity(3, 10, "LOCATION", 0.5, "local"),
                    entity(8, 12, "PERSON", 0.9, "cloud"),
                ]],
            )
            .unwrap();

        assert_eq!(spans(&set), vec![(3, 10)]);
    }

    #[test]
    fn test_adjacent_entities_are_independent() {
        let resolver = FusionResolver::default();
        let set = resolver
            .resolve(
                TEXT,
                vec![
                    vec![entity(0, 4, "PERSON", 0.9, "local")],
                    vec![entity(4, 9, "PERSON", 0.9, "cloud")],
                ],
            )
            .unwrap();

        assert_eq!(spans(&set), vec![(0, 4), (4, 9)]);
    }

    #[test]
    fn test_score_breaks_width_tie() {
        let resolver = FusionResolver::default();
        let set = resolver
            .resolve(
                TEXT,
                vec![
                    vec![entity(2, 6, "PERSON", 0.6, "cloud")],
                    vec![entity(3, 7, "LOCATION", 0.8, "local")],
                ],
            )
            .unwrap();

        assert_eq!(set.as_slice()[0].entity_type, "LOCATION");
    }

    #[test]
    fn test_source_priority_breaks_score_tie() {
        let set = FusionResolver::default()
            .resolve(
                TEXT,
                vec![
                    vec![entity(0, 5, "PERSON", 0.8, "local")],
                    vec![entity(0, 5, "LOCATION", 0.8, "cloud")],
                ],
            )
            .unwrap();
        assert_eq!(set.as_slice()[0].source, "cloud");

        let local_first = FusionResolver::new(SourcePriority::new(["local", "cloud"]));
        let set = local_first
            .resolve(
                TEXT,
                vec![
                    vec![entity(0, 5, "PERSON", 0.8, "local")],
                    vec![entity(0, 5, "LOCATION", 0.8, "cloud")],
                ],
            )
            .unwrap();
        assert_eq!(set.as_slice()[0].source, "local");
    }

    #[test]
    fn test_start_then_type_break_remaining_ties() {
        let resolver = FusionResolver::default();
        let set = resolver
            .resolve(
                TEXT,
                vec![vec![
                    entity(4, 8, "PERSON", 0.8, "local"),
                    entity(2, 6, "PERSON", 0.8, "local"),
                ]],
            )
            .unwrap();
        assert_eq!(spans(&set), vec![(2, 6)]);

        let set = resolver
            .resolve(
                TEXT,
                vec![vec![
                    entity(2, 6, "PERSON", 0.8, "local"),
                    entity(2, 6, "LOCATION", 0.8, "local"),
                ]],
            )
            .unwrap();
        assert_eq!(set.as_slice()[0].entity_type, "LOCATION");
    }

    #[test]
    fn test_unlisted_source_ranks_last() {
        let priority = SourcePriority::default();
        assert_eq!(priority.rank("cloud"), 0);
        assert_eq!(priority.rank("local"), 1);
        assert_eq!(priority.rank("custom"), 2);
    }

    #[test]
    fn test_empty_input() {
        let resolver = FusionResolver::default();
        assert!(resolver.resolve(TEXT, Vec::<Vec<Entity>>::new()).unwrap().is_empty());
        assert!(resolver.resolve("", vec![Vec::new(), Vec::new()]).unwrap().is_empty());
    }

    #[test]
    fn test_invalid_entity_rejected() {
        let resolver = FusionResolver::default();
        let err = resolver
            .resolve("short", vec![vec![entity(0, 10, "PERSON", 0.9, "local")]])
            .unwrap_err();
        assert!(matches!(err, ShieldError::InvalidEntity { .. }));

        let err = resolver
            .resolve(TEXT, vec![vec![entity(3, 3, "PERSON", 0.9, "local")]])
            .unwrap_err();
        assert!(matches!(err, ShieldError::InvalidEntity { .. }));
    }

    fn arb_entity() -> impl Strategy<Value = Entity> {
        (0usize..30, 1usize..8, 0u8..3, 0u32..=10, 0u8..3).prop_map(
            |(start, len, kind, score, source)| {
                let entity_type = ["PERSON", "EMAIL_ADDRESS", "LOCATION"][kind as usize];
                let source = ["cloud", "local", "other"][source as usize];
                entity(start, start + len, entity_type, f64::from(score) / 10.0, source)
            },
        )
    }

    proptest! {
        #[test]
        fn prop_fused_set_never_overlaps(
            raw in proptest::collection::vec(arb_entity(), 0..40)
        ) {
            let set = FusionResolver::default().resolve(TEXT, vec![raw]).unwrap();
            for pair in set.as_slice().windows(2) {
                prop_assert!(pair[0].end <= pair[1].start);
            }
        }

        #[test]
        fn prop_fusion_ignores_input_order(
            raw in proptest::collection::vec(arb_entity(), 0..40)
        ) {
            let resolver = FusionResolver::default();
            let mut reversed = raw.clone();
            reversed.reverse();

            let forward = resolver.resolve(TEXT, vec![raw]).unwrap();
            let backward = resolver.resolve(TEXT, vec![reversed]).unwrap();
            prop_assert_eq!(forward, backward);
        }
    }
}
