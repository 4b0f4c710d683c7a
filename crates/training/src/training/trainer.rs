//! The BPE rule-learning loop.
//!
//! Starting from a word-frequency dictionary, the trainer repeatedly picks
//! the most frequent adjacent symbol pair, records a merge rule for it, and
//! merges it everywhere it occurs. Merging is scoped to the dictionary
//! entries the position index records for the pair, and the statistics are
//! adjusted only around the merge sites, so a learned rule costs work
//! proportional to the words it touches instead of the whole corpus.

use crate::training::stats::{PairKey, PairStats};
use ahash::AHashMap;
use compact_str::CompactString;
use log::{debug, info};
use subword_core::{Result, Rule, RuleMap, SubwordError, Symbol};

/// Word -> occurrence count across the training corpora (whole words).
pub type WordCounts = AHashMap<CompactString, u64>;

/// Configuration for BPE training.
#[derive(Debug, Clone)]
pub struct TrainerConfig {
    /// Number of merge rules to learn at most.
    pub max_rules: usize,
    /// Stop once the best pair's frequency falls below this.
    pub min_frequency: i64,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            max_rules: 32_000,
            min_frequency: 2,
        }
    }
}

/// One dictionary entry during training: a word as a symbol sequence.
pub struct DictEntry<'a> {
    pub word: &'a str,
    pub symbols: Vec<Symbol<'a>>,
    pub freq: i64,
}

/// A merge applied to one dictionary entry: the pre-merge sequence is kept
/// so the statistics around each merge site can be adjusted.
struct Change<'a> {
    pos: usize,
    old: Vec<Symbol<'a>>,
    freq: i64,
}

/// BPE trainer.
pub struct BpeTrainer {
    config: TrainerConfig,
}

impl BpeTrainer {
    /// Create a trainer with the given configuration.
    pub fn new(config: TrainerConfig) -> Self {
        Self { config }
    }

    /// Create a trainer learning at most `max_rules` rules.
    pub fn with_max_rules(max_rules: usize) -> Self {
        Self::new(TrainerConfig {
            max_rules,
            ..Default::default()
        })
    }

    /// Learn a prioritized rule set from a word-frequency dictionary.
    ///
    /// Priorities are assigned in discovery order, strictly increasing from
    /// zero, so earlier rules always outrank later ones during encoding.
    pub fn learn(&self, words: &WordCounts) -> Result<RuleMap> {
        if self.config.max_rules == 0 {
            return Err(SubwordError::InvalidConfig(
                "max_rules must be at least 1".into(),
            ));
        }
        if self.config.min_frequency < 1 {
            return Err(SubwordError::InvalidConfig(format!(
                "min_frequency must be at least 1, got {}",
                self.config.min_frequency
            )));
        }

        let mut dictionary: Vec<DictEntry<'_>> = words
            .iter()
            .filter(|(word, _)| !word.is_empty())
            .map(|(word, &freq)| DictEntry {
                word: word.as_str(),
                symbols: Symbol::from_word(word.as_str()),
                freq: freq as i64,
            })
            .collect();
        // most frequent first; ties on the word text keep the order stable
        dictionary.sort_unstable_by(|a, b| b.freq.cmp(&a.freq).then_with(|| a.word.cmp(b.word)));

        let mut stats = PairStats::from_dictionary(&dictionary);
        let mut rules = RuleMap::new();
        if stats.is_empty() {
            info!("nothing to learn: no adjacent pairs in {} words", dictionary.len());
            return Ok(rules);
        }

        // The thresholds below only bound how much of the statistics stays
        // live; they are tuning knobs, not part of the output contract.
        let mut threshold = stats.max_count() as f64 / 10.0;

        for i in 0..self.config.max_rules {
            let mut best = stats.pop_best();

            let needs_refill = match &best {
                None => true,
                Some(candidate) => i > 0 && (candidate.count as f64) < threshold,
            };
            if needs_refill {
                // earlier pruning may have hidden the true maximum; sync the
                // shadow and rebuild the live set from it
                stats.prune(threshold);
                stats.refill();
                best = stats.pop_best();
                let Some(candidate) = &best else { break };
                threshold = candidate.count as f64 * i as f64 / (i as f64 + 10000.0);
                stats.prune(threshold);
            }

            let Some(best) = best else { break };
            if best.count < self.config.min_frequency {
                break;
            }

            // a pair can regain frequency and be picked twice; the first
            // discovery keeps its priority
            rules
                .entry(Rule::new(best.pair.0.as_str(), best.pair.1.as_str()))
                .or_insert(i as u32);

            let changes = replace_pair(&best.pair, &mut dictionary, &stats.positions(&best.pair));
            update_pair_statistics(&best.pair, &changes, &dictionary, &mut stats);

            if i % 1000 == 0 {
                debug!(
                    "rule {:>6}: merged ({:?}, {:?}) with frequency {}",
                    i, best.pair.0, best.pair.1, best.count
                );
            }
            if i % 100 == 0 {
                stats.prune(threshold);
            }
        }

        info!(
            "learned {} merge rules from {} dictionary entries",
            rules.len(),
            dictionary.len()
        );
        Ok(rules)
    }
}

/// Merge every occurrence of `pair` in the dictionary entries the index
/// points at, returning the pre-merge sequences of the entries that changed.
fn replace_pair<'a>(
    pair: &PairKey,
    dictionary: &mut [DictEntry<'a>],
    positions: &[(usize, i64)],
) -> Vec<Change<'a>> {
    let mut changes = Vec::new();
    for &(pos, occurrences) in positions {
        // the index may carry stale zero or negative residues
        if occurrences < 1 {
            continue;
        }
        let entry = &mut dictionary[pos];
        let mut merged = Vec::with_capacity(entry.symbols.len());
        let mut found = false;
        let mut i = 0;
        while i < entry.symbols.len() {
            if i + 1 < entry.symbols.len()
                && entry.symbols[i].full() == pair.0
                && entry.symbols[i + 1].full() == pair.1
            {
                merged.push(Symbol::merge(&entry.symbols[i], &entry.symbols[i + 1]));
                found = true;
                i += 2;
            } else {
                merged.push(entry.symbols[i].clone());
                i += 1;
            }
        }
        if !found {
            continue;
        }
        let old = std::mem::replace(&mut entry.symbols, merged);
        changes.push(Change {
            pos,
            old,
            freq: entry.freq,
        });
    }
    changes
}

/// Adjust statistics and the position index around every merge site.
///
/// Only the pairs immediately left and right of a merged occurrence change.
/// Two consecutive occurrences overlap in one pair, which must be adjusted
/// once, not twice: the scan skips the right-neighbor adjustment whenever the
/// next occurrence's left-neighbor adjustment covers the same pair.
fn update_pair_statistics(
    pair: &PairKey,
    changes: &[Change<'_>],
    dictionary: &[DictEntry<'_>],
    stats: &mut PairStats,
) {
    stats.zero(pair);
    stats.clear_index(pair);

    let mut merged_text = pair.0.clone();
    merged_text.push_str(&pair.1);

    for change in changes {
        let old = &change.old;
        let new = &dictionary[change.pos].symbols;
        let freq = change.freq;

        // pass 1: remove the neighbor pairs of every merged occurrence
        let mut i = 0;
        while i < old.len() {
            if i + 1 < old.len() && old[i].full() == pair.0 && old[i + 1].full() == pair.1 {
                if i > 0 {
                    let prev = (
                        CompactString::new(old[i - 1].full()),
                        CompactString::new(old[i].full()),
                    );
                    stats.bump(&prev, -freq);
                    stats.index_bump(&prev, change.pos, -1);
                }
                if i + 2 < old.len() {
                    // in `A B C B C` the pair after the first occurrence is
                    // also the pair before the second; leave it to the
                    // second occurrence's left-neighbor adjustment
                    let next_is_occurrence = old[i + 2].full() == pair.0
                        && i + 3 < old.len()
                        && old[i + 3].full() == pair.1;
                    if !next_is_occurrence {
                        let next = (
                            CompactString::new(old[i + 1].full()),
                            CompactString::new(old[i + 2].full()),
                        );
                        stats.bump(&next, -freq);
                        stats.index_bump(&next, change.pos, -1);
                    }
                }
                i += 2;
            } else {
                i += 1;
            }
        }

        // pass 2: add the neighbor pairs of every merged symbol
        let mut i = 0;
        while i < new.len() {
            if new[i].full() == merged_text {
                if i > 0 {
                    let prev = (
                        CompactString::new(new[i - 1].full()),
                        CompactString::new(new[i].full()),
                    );
                    stats.bump(&prev, freq);
                    stats.index_bump(&prev, change.pos, 1);
                }
                // when the next symbol is another merged occurrence, the
                // (merged, merged) pair is counted as its left neighbor
                if i + 1 < new.len() && new[i + 1].full() != merged_text {
                    let next = (
                        CompactString::new(new[i].full()),
                        CompactString::new(new[i + 1].full()),
                    );
                    stats.bump(&next, freq);
                    stats.index_bump(&next, change.pos, 1);
                }
            }
            i += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn word_counts(entries: &[(&str, u64)]) -> WordCounts {
        entries
            .iter()
            .map(|&(word, count)| (CompactString::new(word), count))
            .collect()
    }

    fn priority_of(rules: &RuleMap, left: &str, right: &str) -> Option<u32> {
        rules.get(&Rule::new(left, right)).copied()
    }

    #[test]
    fn test_invalid_config_fails_fast() {
        let trainer = BpeTrainer::new(TrainerConfig {
            max_rules: 0,
            min_frequency: 2,
        });
        assert!(trainer.learn(&word_counts(&[("ab", 1)])).is_err());

        let trainer = BpeTrainer::new(TrainerConfig {
            max_rules: 10,
            min_frequency: 0,
        });
        assert!(trainer.learn(&word_counts(&[("ab", 1)])).is_err());

        let trainer = BpeTrainer::new(TrainerConfig {
            max_rules: 10,
            min_frequency: -3,
        });
        assert!(trainer.learn(&word_counts(&[("ab", 1)])).is_err());
    }

    #[test]
    fn test_empty_dictionary_learns_nothing() {
        let trainer = BpeTrainer::with_max_rules(100);
        assert!(trainer.learn(&WordCounts::new()).unwrap().is_empty());
        // single-character words have no pairs either
        assert!(trainer.learn(&word_counts(&[("a", 5), ("b", 3)])).unwrap().is_empty());
    }

    #[test]
    fn test_most_frequent_pair_is_learned_first() {
        // aggregate pair frequencies: (e, r</w>) from newer(6) + wider(3) = 9
        // beats every other pair
        let trainer = BpeTrainer::new(TrainerConfig {
            max_rules: 1000,
            min_frequency: 1,
        });
        let rules = trainer
            .learn(&word_counts(&[
                ("low", 5),
                ("lowest", 2),
                ("newer", 6),
                ("wider", 3),
            ]))
            .unwrap();
        assert_eq!(priority_of(&rules, "e", "r</w>"), Some(0));
    }

    #[test]
    fn test_priorities_are_strictly_increasing_and_unique() {
        let trainer = BpeTrainer::new(TrainerConfig {
            max_rules: 1000,
            min_frequency: 1,
        });
        let rules = trainer
            .learn(&word_counts(&[
                ("low", 5),
                ("lowest", 2),
                ("newer", 6),
                ("wider", 3),
            ]))
            .unwrap();
        assert!(!rules.is_empty());

        let mut priorities: Vec<u32> = rules.values().copied().collect();
        priorities.sort_unstable();
        priorities.dedup();
        assert_eq!(priorities.len(), rules.len(), "duplicate priorities");
        for pair in priorities.windows(2) {
            assert!(pair[0] < pair[1]);
        }
    }

    #[test]
    fn test_exact_rule_sequence_on_tiny_dictionary() {
        // {"abab": 3}: the three initial pairs (a,b), (b,a), (a,b</w>) tie at
        // 3, and the tie breaks on the larger pair text, so (b,a) is learned
        // first; the incremental updates then surface (ba, b</w>) and
        // finally (a, bab</w>).
        let trainer = BpeTrainer::new(TrainerConfig {
            max_rules: 100,
            min_frequency: 1,
        });
        let rules = trainer.learn(&word_counts(&[("abab", 3)])).unwrap();

        assert_eq!(rules.len(), 3);
        assert_eq!(priority_of(&rules, "b", "a"), Some(0));
        assert_eq!(priority_of(&rules, "ba", "b</w>"), Some(1));
        assert_eq!(priority_of(&rules, "a", "bab</w>"), Some(2));
    }

    #[test]
    fn test_min_frequency_stops_training() {
        let trainer = BpeTrainer::new(TrainerConfig {
            max_rules: 1000,
            min_frequency: 10,
        });
        let rules = trainer
            .learn(&word_counts(&[("ab", 4), ("abc", 3)]))
            .unwrap();
        // the best pair, (a, b</w>), reaches only frequency 4
        assert!(rules.is_empty());
    }

    #[test]
    fn test_max_rules_bounds_output() {
        let trainer = BpeTrainer::new(TrainerConfig {
            max_rules: 2,
            min_frequency: 1,
        });
        let rules = trainer
            .learn(&word_counts(&[("abab", 3), ("abcd", 2)]))
            .unwrap();
        assert!(rules.len() <= 2);
    }

    #[test]
    fn test_trained_rules_encode_unseen_words() {
        use subword_core::BpeModel;

        let trainer = BpeTrainer::new(TrainerConfig {
            max_rules: 1000,
            min_frequency: 1,
        });
        let rules = trainer
            .learn(&word_counts(&[
                ("low", 5),
                ("lowest", 2),
                ("newer", 6),
                ("wider", 3),
            ]))
            .unwrap();
        let model = BpeModel::new(rules, "@@");

        // seen and unseen words all round-trip without error
        for word in ["low", "lower", "newest", "zzz"] {
            let subwords = model.encode(word, None);
            assert!(!subwords.is_empty());
            let mut rebuilt = String::new();
            for (i, subword) in subwords.iter().enumerate() {
                if i + 1 < subwords.len() {
                    rebuilt.push_str(subword.strip_suffix("@@").unwrap_or(subword));
                } else {
                    rebuilt.push_str(subword);
                }
            }
            assert_eq!(rebuilt, word);
        }
    }
}
