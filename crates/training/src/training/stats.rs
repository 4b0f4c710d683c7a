//! Live pair statistics for training.
//!
//! Three structures cooperate here. `stats` is the live working set of pair
//! frequencies, kept small by evicting rare pairs into `big_stats`, a shadow
//! that is never discarded and is used to refill `stats` when pruning may
//! have hidden the true maximum. The position index records, per pair, which
//! dictionary entries contain it and how often, so a merge step only visits
//! the words it actually changes. Best-pair selection runs through an 8-ary
//! max-heap with stale-entry detection: every statistics update pushes a new
//! candidate, and pops discard entries whose count no longer matches `stats`.

use crate::training::trainer::DictEntry;
use ahash::AHashMap;
use compact_str::CompactString;
use dary_heap::OctonaryHeap;

/// A pair of adjacent symbol texts, as rendered (suffix included).
pub type PairKey = (CompactString, CompactString);

/// A best-pair candidate in the selection heap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub count: i64,
    pub pair: PairKey,
}

// Max-heap order: highest count first, ties broken by the larger pair text
// so selection never depends on hash-map iteration order.
impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.count
            .cmp(&other.count)
            .then_with(|| self.pair.cmp(&other.pair))
    }
}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// Best-pair selection heap with stale-entry detection.
///
/// Entries are never updated in place; a pair whose count changed simply gets
/// a fresh entry, and [`CandidateQueue::pop_fresh`] skips entries whose count
/// disagrees with the live statistics.
pub struct CandidateQueue {
    heap: OctonaryHeap<Candidate>,
}

impl CandidateQueue {
    pub fn new() -> Self {
        Self {
            heap: OctonaryHeap::new(),
        }
    }

    pub fn push(&mut self, pair: PairKey, count: i64) {
        self.heap.push(Candidate { count, pair });
    }

    /// Pop the highest-count candidate whose count still matches `stats`.
    pub fn pop_fresh(&mut self, stats: &AHashMap<PairKey, i64>) -> Option<Candidate> {
        while let Some(candidate) = self.heap.pop() {
            if stats.get(&candidate.pair) == Some(&candidate.count) {
                return Some(candidate);
            }
        }
        None
    }

    /// Discard everything and re-seed from the live statistics.
    pub fn rebuild(&mut self, stats: &AHashMap<PairKey, i64>) {
        self.heap.clear();
        for (pair, &count) in stats {
            self.heap.push(Candidate {
                count,
                pair: pair.clone(),
            });
        }
    }
}

impl Default for CandidateQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// The trainer's mutable statistics state.
pub struct PairStats {
    stats: AHashMap<PairKey, i64>,
    big_stats: AHashMap<PairKey, i64>,
    index: AHashMap<PairKey, AHashMap<usize, i64>>,
    queue: CandidateQueue,
}

impl PairStats {
    /// Count every adjacent pair across the dictionary and build the
    /// position index; `big_stats` starts as a full copy of `stats`.
    pub fn from_dictionary(dictionary: &[DictEntry<'_>]) -> Self {
        let mut stats: AHashMap<PairKey, i64> = AHashMap::new();
        let mut index: AHashMap<PairKey, AHashMap<usize, i64>> = AHashMap::new();
        for (pos, entry) in dictionary.iter().enumerate() {
            for window in entry.symbols.windows(2) {
                let pair = (
                    CompactString::new(window[0].full()),
                    CompactString::new(window[1].full()),
                );
                *stats.entry(pair.clone()).or_insert(0) += entry.freq;
                *index.entry(pair).or_default().entry(pos).or_insert(0) += 1;
            }
        }
        let big_stats = stats.clone();
        let mut queue = CandidateQueue::new();
        queue.rebuild(&stats);
        Self {
            stats,
            big_stats,
            index,
            queue,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.stats.is_empty()
    }

    /// Highest live count, for deriving the initial pruning threshold.
    pub fn max_count(&self) -> i64 {
        self.stats.values().copied().max().unwrap_or(0)
    }

    /// The current best pair, consumed from the selection heap.
    pub fn pop_best(&mut self) -> Option<Candidate> {
        self.queue.pop_fresh(&self.stats)
    }

    /// Adjust a pair's live count by `delta`, creating the entry on demand.
    pub fn bump(&mut self, pair: &PairKey, delta: i64) {
        let count = self.stats.entry(pair.clone()).or_insert(0);
        *count += delta;
        let count = *count;
        self.queue.push(pair.clone(), count);
    }

    /// Zero a pair's live count once its rule has been learned.
    pub fn zero(&mut self, pair: &PairKey) {
        self.stats.insert(pair.clone(), 0);
        self.queue.push(pair.clone(), 0);
    }

    /// Evict every live entry below `threshold` into the shadow. Negative
    /// residues are folded into the shadow's value instead of replacing it.
    pub fn prune(&mut self, threshold: f64) {
        let evicted: Vec<PairKey> = self
            .stats
            .iter()
            .filter(|&(_, &count)| (count as f64) < threshold)
            .map(|(pair, _)| pair.clone())
            .collect();
        for pair in evicted {
            let count = self.stats.remove(&pair).unwrap_or(0);
            if count < 0 {
                *self.big_stats.entry(pair).or_insert(0) += count;
            } else {
                self.big_stats.insert(pair, count);
            }
        }
    }

    /// Restore the live statistics from the shadow and re-seed the heap.
    /// Call [`PairStats::prune`] first so learned-and-zeroed entries have
    /// been synced into the shadow.
    pub fn refill(&mut self) {
        self.stats = self.big_stats.clone();
        self.queue.rebuild(&self.stats);
    }

    /// Dictionary positions containing `pair`, sorted for determinism.
    pub fn positions(&self, pair: &PairKey) -> Vec<(usize, i64)> {
        let mut positions: Vec<(usize, i64)> = self
            .index
            .get(pair)
            .map(|entries| entries.iter().map(|(&pos, &count)| (pos, count)).collect())
            .unwrap_or_default();
        positions.sort_unstable();
        positions
    }

    /// Reset a learned pair's position index.
    pub fn clear_index(&mut self, pair: &PairKey) {
        self.index.insert(pair.clone(), AHashMap::new());
    }

    /// Adjust the occurrence count of `pair` at dictionary position `pos`.
    pub fn index_bump(&mut self, pair: &PairKey, pos: usize, delta: i64) {
        *self
            .index
            .entry(pair.clone())
            .or_default()
            .entry(pos)
            .or_insert(0) += delta;
    }

    #[cfg(test)]
    pub fn count(&self, pair: &PairKey) -> Option<i64> {
        self.stats.get(pair).copied()
    }
}
