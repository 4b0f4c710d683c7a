//! Building a processor from training corpora.
//!
//! The builder scans every corpus once, counting word and character
//! frequencies per side. When the two character distributions are similar
//! enough (cosine similarity above the configured threshold) one rule set is
//! trained on the merged dictionaries and shared by both sides; otherwise
//! each side is trained separately. Vocabularies are then collected by
//! applying the unconstrained models back onto the dictionaries, optionally
//! pruned by mass coverage and capped in size.

use ahash::AHashMap;
use compact_str::CompactString;
use log::info;
use serde::{Deserialize, Serialize};
use subword_core::{BpeModel, Result, RuleMap, SubwordError, SubwordSet};
use subword_training::{BpeTrainer, TrainerConfig, WordCounts};

use crate::corpus::{MultilingualCorpus, StringPair};
use crate::processor::SubwordTextProcessor;

/// Character -> occurrence count for one side of the training data.
pub type CharCounts = AHashMap<char, u64>;

/// Hyperparameters for building a processor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BuilderConfig {
    /// Number of merge rules to learn per model.
    pub max_rules: usize,
    /// Minimum pair frequency for learning a rule.
    pub min_frequency: i64,
    /// Keep at most this many vocabulary entries per side.
    pub max_vocabulary_size: Option<usize>,
    /// Drop vocabulary entries outside this fraction of the total subword
    /// mass (e.g. 0.999 keeps the entries covering 99.9% of occurrences).
    pub vocab_pruning_threshold: Option<f64>,
    /// Train one shared rule set when the sides' character distributions
    /// have at least this cosine similarity.
    pub similarity_threshold: f64,
    /// Marker appended to every non-final subword of a word.
    pub separator: String,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            max_rules: 32_000,
            min_frequency: 2,
            max_vocabulary_size: None,
            vocab_pruning_threshold: None,
            similarity_threshold: 0.5,
            separator: "@@".to_string(),
        }
    }
}

/// Builds a [`SubwordTextProcessor`] from parallel corpora.
pub struct ProcessorBuilder {
    config: BuilderConfig,
}

impl Default for ProcessorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessorBuilder {
    /// Create a builder with default hyperparameters.
    pub fn new() -> Self {
        Self {
            config: BuilderConfig::default(),
        }
    }

    /// Create a builder from an explicit configuration.
    pub fn from_config(config: BuilderConfig) -> Self {
        Self { config }
    }

    /// Set the number of rules to learn per model.
    pub fn max_rules(mut self, max_rules: usize) -> Self {
        self.config.max_rules = max_rules;
        self
    }

    /// Set the minimum pair frequency for learning a rule.
    pub fn min_frequency(mut self, min_frequency: i64) -> Self {
        self.config.min_frequency = min_frequency;
        self
    }

    /// Cap the vocabulary size per side.
    pub fn max_vocabulary_size(mut self, size: usize) -> Self {
        self.config.max_vocabulary_size = Some(size);
        self
    }

    /// Prune each vocabulary to the entries covering this fraction of the
    /// total subword mass.
    pub fn vocab_pruning_threshold(mut self, threshold: f64) -> Self {
        self.config.vocab_pruning_threshold = Some(threshold);
        self
    }

    /// Set the alphabet-similarity threshold for sharing one rule set.
    pub fn similarity_threshold(mut self, threshold: f64) -> Self {
        self.config.similarity_threshold = threshold;
        self
    }

    /// Set the inter-subword separator.
    pub fn separator(mut self, separator: impl Into<String>) -> Self {
        self.config.separator = separator.into();
        self
    }

    /// Scan the corpora, train the models and assemble a processor.
    ///
    /// Any corpus read failure aborts the build; readers are released on
    /// every path, and no partially trained processor is ever returned.
    pub fn build(
        &self,
        corpora: &[Box<dyn MultilingualCorpus>],
    ) -> Result<SubwordTextProcessor> {
        if self.config.separator.is_empty() {
            return Err(SubwordError::InvalidConfig(
                "separator must not be empty".into(),
            ));
        }

        let scan = self.scan(corpora)?;
        info!(
            "scanned {} corpora: {} distinct source words, {} distinct target words",
            corpora.len(),
            scan.source_words.len(),
            scan.target_words.len()
        );

        let trainer = BpeTrainer::new(TrainerConfig {
            max_rules: self.config.max_rules,
            min_frequency: self.config.min_frequency,
        });

        let similarity = cosine_similarity(&scan.source_chars, &scan.target_chars);
        let shared = similarity > self.config.similarity_threshold;
        info!(
            "alphabet cosine similarity {:.3}: training {} rule set(s)",
            similarity,
            if shared { "one shared" } else { "two separate" }
        );

        let (source_rules, target_rules) = if shared {
            let merged = merge_counts(&scan.source_words, &scan.target_words);
            (trainer.learn(&merged)?, RuleMap::new())
        } else {
            (
                trainer.learn(&scan.source_words)?,
                trainer.learn(&scan.target_words)?,
            )
        };

        // throwaway model instances: the processor builds its own, so its
        // encode caches start out untouched by vocabulary collection
        let source_model = BpeModel::new(source_rules.clone(), self.config.separator.clone());
        let source_vocabulary = self.collect_subwords(&scan.source_words, &source_model);
        let target_vocabulary = if shared {
            self.collect_subwords(&scan.target_words, &source_model)
        } else {
            let target_model = BpeModel::new(target_rules.clone(), self.config.separator.clone());
            self.collect_subwords(&scan.target_words, &target_model)
        };

        Ok(SubwordTextProcessor::new(
            source_rules,
            source_vocabulary,
            target_rules,
            target_vocabulary,
            self.config.separator.clone(),
        ))
    }

    fn scan(&self, corpora: &[Box<dyn MultilingualCorpus>]) -> Result<CorpusScan> {
        let mut scan = CorpusScan::default();
        for corpus in corpora {
            let mut reader = corpus.open()?;
            while let Some(pair) = reader.read_pair()? {
                scan.add(&pair);
            }
        }
        Ok(scan)
    }

    /// Split every dictionary word with the unconstrained model and count the
    /// resulting subword forms, separator stripped.
    fn collect_subwords(&self, words: &WordCounts, model: &BpeModel) -> SubwordSet {
        let mut counts: AHashMap<CompactString, u64> = AHashMap::new();
        for (word, &freq) in words {
            let subwords = model.encode(word, None);
            for (i, subword) in subwords.iter().enumerate() {
                let stripped = if i + 1 < subwords.len() {
                    subword.strip_suffix(model.separator()).unwrap_or(subword)
                } else {
                    subword.as_str()
                };
                *counts.entry(CompactString::new(stripped)).or_insert(0) += freq;
            }
        }
        let counts = prune_by_coverage(counts, self.config.vocab_pruning_threshold);
        let counts = cap_size(counts, self.config.max_vocabulary_size);
        counts.into_keys().collect()
    }
}

#[derive(Default)]
struct CorpusScan {
    source_words: WordCounts,
    target_words: WordCounts,
    source_chars: CharCounts,
    target_chars: CharCounts,
}

impl CorpusScan {
    fn add(&mut self, pair: &StringPair) {
        Self::add_side(&mut self.source_words, &mut self.source_chars, &pair.source);
        Self::add_side(&mut self.target_words, &mut self.target_chars, &pair.target);
    }

    fn add_side(words: &mut WordCounts, chars: &mut CharCounts, text: &str) {
        for word in text.split_whitespace() {
            *words.entry(CompactString::new(word)).or_insert(0) += 1;
            for c in word.chars() {
                *chars.entry(c).or_insert(0) += 1;
            }
        }
    }
}

/// Cosine similarity of two character-frequency vectors.
fn cosine_similarity(a: &CharCounts, b: &CharCounts) -> f64 {
    let dot: f64 = a
        .iter()
        .filter_map(|(c, &x)| b.get(c).map(|&y| x as f64 * y as f64))
        .sum();
    let norm = |counts: &CharCounts| -> f64 {
        counts
            .values()
            .map(|&x| (x as f64) * (x as f64))
            .sum::<f64>()
            .sqrt()
    };
    let norms = norm(a) * norm(b);
    if norms == 0.0 {
        0.0
    } else {
        dot / norms
    }
}

/// Sum two word dictionaries.
fn merge_counts(a: &WordCounts, b: &WordCounts) -> WordCounts {
    let mut merged = a.clone();
    for (word, &count) in b {
        *merged.entry(word.clone()).or_insert(0) += count;
    }
    merged
}

/// Keep the most frequent entries covering `threshold` of the total mass.
fn prune_by_coverage(
    counts: AHashMap<CompactString, u64>,
    threshold: Option<f64>,
) -> AHashMap<CompactString, u64> {
    let Some(threshold) = threshold else {
        return counts;
    };
    let total: u64 = counts.values().sum();
    if total == 0 {
        return counts;
    }

    let mut ordered: Vec<(&CompactString, u64)> =
        counts.iter().map(|(term, &count)| (term, count)).collect();
    ordered.sort_unstable_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));

    let mut cumulative = 0u64;
    let mut cutoff = 0u64;
    for &(_, count) in &ordered {
        cumulative += count;
        if cumulative as f64 >= total as f64 * threshold {
            cutoff = count;
            break;
        }
    }

    let mut counts = counts;
    counts.retain(|_, count| *count >= cutoff);
    counts
}

/// Keep at most `size` entries, most frequent first.
fn cap_size(
    counts: AHashMap<CompactString, u64>,
    size: Option<usize>,
) -> AHashMap<CompactString, u64> {
    let Some(size) = size else {
        return counts;
    };
    if counts.len() <= size {
        return counts;
    }

    let mut ordered: Vec<(CompactString, u64)> = counts.into_iter().collect();
    ordered.sort_unstable_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ordered.truncate(size);
    ordered.into_iter().collect()
}
