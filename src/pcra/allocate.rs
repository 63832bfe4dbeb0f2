//! The two resource-flow passes over the adjacency

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use rayon::prelude::*;
use tracing::info;

use super::adjacency::Adjacency;
use super::tables::ConfidenceKey;
use crate::types::{EntityId, EntityPair, RelationId, RelationPath};

/// Occurrence counters shared by both passes
#[derive(Debug, Default)]
pub(crate) struct PathCounts {
    /// path → number of (head, tail) instances
    pub occurrences: HashMap<RelationPath, u64>,
    /// (path, relation) → instances whose endpoints are also linked by relation
    pub related: HashMap<ConfidenceKey, u64>,
}

impl PathCounts {
    fn absorb(&mut self, other: PathCounts) {
        for (path, count) in other.occurrences {
            *self.occurrences.entry(path).or_insert(0) += count;
        }
        for (key, count) in other.related {
            *self.related.entry(key).or_insert(0) += count;
        }
    }

    fn count(&mut self, path: &RelationPath, direct: Option<&BTreeSet<RelationId>>) {
        *self.occurrences.entry(path.clone()).or_insert(0) += 1;
        for &relation in direct.into_iter().flatten() {
            *self
                .related
                .entry(ConfidenceKey::new(path.clone(), relation))
                .or_insert(0) += 1;
        }
    }
}

/// Raw (unnormalized) resource keyed by pair, then path
pub(crate) type RawResources = BTreeMap<(EntityPair, RelationPath), f32>;

/// Per-head result of one pass
#[derive(Debug, Default)]
struct HeadTally {
    counts: PathCounts,
    flows: Vec<(EntityPair, RelationPath, f32)>,
}

/// Progress logger for per-head parallel passes
struct Progress<'a> {
    pass: &'a str,
    total: usize,
    every: usize,
    done: AtomicUsize,
    started: Instant,
}

impl<'a> Progress<'a> {
    fn new(pass: &'a str, total: usize, every: usize) -> Self {
        Self {
            pass,
            total,
            every,
            done: AtomicUsize::new(0),
            started: Instant::now(),
        }
    }

    fn tick(&self) {
        let done = self.done.fetch_add(1, Ordering::Relaxed) + 1;
        if self.every > 0 && done % self.every == 0 {
            info!(
                pass = self.pass,
                heads = done,
                total = self.total,
                elapsed_ms = self.started.elapsed().as_millis() as u64,
                "PCRA progress"
            );
        }
    }
}

/// 1-hop pass: count every edge as a path and flow `1 / |tails|` from each
/// head into each of its (head, tail) pairs
pub(crate) fn one_hop(adjacency: &Adjacency, log_every: usize) -> (PathCounts, RawResources) {
    let heads = adjacency.heads();
    let progress = Progress::new("1-hop", heads.len(), log_every);

    let tallies: Vec<HeadTally> = heads
        .par_iter()
        .map(|&head| {
            let tally = one_hop_from(adjacency, head);
            progress.tick();
            tally
        })
        .collect();

    merge(tallies)
}

fn one_hop_from(adjacency: &Adjacency, head: EntityId) -> HeadTally {
    let mut tally = HeadTally::default();
    let Some(outgoing) = adjacency.outgoing(head) else {
        return tally;
    };

    for (&relation, tails) in outgoing {
        let path = RelationPath::single(relation);
        let delta = 1.0 / tails.len() as f32;
        for &tail in tails {
            let pair = EntityPair::new(head, tail);
            tally.counts.count(&path, adjacency.direct(&pair));
            tally.flows.push((pair, path.clone(), delta));
        }
    }
    tally
}

/// 2-hop pass: extend every 1-hop edge through the tail's outgoing edges
///
/// Composite paths are always counted; resource only flows into pairs that
/// already share a direct relation.
pub(crate) fn two_hop(
    adjacency: &Adjacency,
    one_hop: &RawResources,
    log_every: usize,
) -> (PathCounts, RawResources) {
    let heads = adjacency.heads();
    let progress = Progress::new("2-hop", heads.len(), log_every);

    let tallies: Vec<HeadTally> = heads
        .par_iter()
        .map(|&head| {
            let tally = two_hop_from(adjacency, one_hop, head);
            progress.tick();
            tally
        })
        .collect();

    merge(tallies)
}

fn two_hop_from(adjacency: &Adjacency, one_hop: &RawResources, head: EntityId) -> HeadTally {
    let mut tally = HeadTally::default();
    let Some(outgoing) = adjacency.outgoing(head) else {
        return tally;
    };

    for (&relation, tails) in outgoing {
        let first = RelationPath::single(relation);
        for &tail in tails {
            let Some(next) = adjacency.outgoing(tail) else {
                continue;
            };
            let parent = one_hop
                .get(&(EntityPair::new(head, tail), first.clone()))
                .copied()
                .unwrap_or(0.0);

            for (&second, tails2) in next {
                let path = RelationPath::compose(relation, second);
                let delta = parent / tails2.len() as f32;
                for &tail2 in tails2 {
                    let pair = EntityPair::new(head, tail2);
                    let direct = adjacency.direct(&pair);
                    tally.counts.count(&path, direct);
                    if direct.is_some() {
                        tally.flows.push((pair, path.clone(), delta));
                    }
                }
            }
        }
    }
    tally
}

/// Merge per-head tallies in head order
fn merge(tallies: Vec<HeadTally>) -> (PathCounts, RawResources) {
    let mut counts = PathCounts::default();
    let mut resources = RawResources::new();
    for tally in tallies {
        counts.absorb(tally.counts);
        for (pair, path, delta) in tally.flows {
            *resources.entry((pair, path)).or_insert(0.0) += delta;
        }
    }
    (counts, resources)
}

/// Add `other`'s counters and resources into `counts`/`resources`
pub(crate) fn combine(
    counts: &mut PathCounts,
    resources: &mut RawResources,
    other_counts: PathCounts,
    other_resources: RawResources,
) {
    counts.absorb(other_counts);
    for (key, delta) in other_resources {
        *resources.entry(key).or_insert(0.0) += delta;
    }
}
