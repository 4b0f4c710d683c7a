//! The serving-time text processor.
//!
//! A [`SubwordTextProcessor`] pairs a source-side BPE model and vocabulary
//! with an optional target-side model (absent when training decided both
//! languages can share one rule set). It is immutable after construction and
//! safe to share across request threads.

use compact_str::CompactString;
use rayon::prelude::*;
use std::path::Path;
use subword_core::{BpeModel, Result, RuleMap, SubwordSet};

use crate::io::{ModelLoader, ModelSaver};

/// Two BPE models plus their vocabularies, behind the `encode` operation.
pub struct SubwordTextProcessor {
    separator: String,
    source_bpe: BpeModel,
    source_vocabulary: SubwordSet,
    target_bpe: Option<BpeModel>,
    target_vocabulary: SubwordSet,
    /// True when training decided both sides share one rule set.
    shared_rules: bool,
}

impl SubwordTextProcessor {
    /// Assemble a processor from trained parts.
    ///
    /// An empty target rule set means both sides share the source rules.
    /// Each model instance's encode cache is keyed by the word alone, so a
    /// shared rule set still gets a second instance whenever the target side
    /// constrains encoding with a vocabulary of its own.
    pub fn new(
        source_rules: RuleMap,
        source_vocabulary: SubwordSet,
        target_rules: RuleMap,
        target_vocabulary: SubwordSet,
        separator: impl Into<String>,
    ) -> Self {
        let separator = separator.into();
        let shared_rules = target_rules.is_empty();
        let target_bpe = if !shared_rules {
            Some(BpeModel::new(target_rules, separator.clone()))
        } else if !target_vocabulary.is_empty() && target_vocabulary != source_vocabulary {
            Some(BpeModel::new(source_rules.clone(), separator.clone()))
        } else {
            None
        };
        let source_bpe = BpeModel::new(source_rules, separator.clone());
        Self {
            separator,
            source_bpe,
            source_vocabulary,
            target_bpe,
            target_vocabulary,
            shared_rules,
        }
    }

    /// Load a processor from its persisted model file.
    pub fn load(path: &Path) -> Result<Self> {
        ModelLoader::load(path)
    }

    /// Persist this processor to a model file.
    pub fn save(&self, path: &Path) -> Result<()> {
        ModelSaver::new(self).save(path)
    }

    /// Encode a sequence of words on one side of the translation pair.
    ///
    /// Output preserves word order; every subword except the last of each
    /// word carries the separator as a trailing substring. Falls back to the
    /// source model when no distinct target model was trained, and to the
    /// source vocabulary when the target vocabulary is empty.
    pub fn encode(&self, words: &[&str], is_source: bool) -> Vec<CompactString> {
        let bpe = match (&self.target_bpe, is_source) {
            (Some(target), false) => target,
            _ => &self.source_bpe,
        };
        let vocabulary = if is_source || self.target_vocabulary.is_empty() {
            &self.source_vocabulary
        } else {
            &self.target_vocabulary
        };
        // an empty vocabulary means "unconstrained", not "split everything"
        let vocabulary = (!vocabulary.is_empty()).then_some(vocabulary);
        bpe.apply(words, vocabulary)
    }

    /// Encode many whitespace-tokenized lines in parallel, preserving order.
    pub fn encode_lines(&self, lines: &[String], is_source: bool) -> Vec<Vec<CompactString>> {
        lines
            .par_iter()
            .map(|line| {
                let words: Vec<&str> = line.split_whitespace().collect();
                self.encode(&words, is_source)
            })
            .collect()
    }

    /// The inter-subword separator.
    pub fn separator(&self) -> &str {
        &self.separator
    }

    /// The source-side model.
    pub fn source_bpe(&self) -> &BpeModel {
        &self.source_bpe
    }

    /// The target-side model instance, absent when the target side can use
    /// the source model as-is.
    pub fn target_bpe(&self) -> Option<&BpeModel> {
        self.target_bpe.as_ref()
    }

    /// Whether both sides were trained on one shared rule set.
    pub fn shared_rules(&self) -> bool {
        self.shared_rules
    }

    /// The source-side vocabulary.
    pub fn source_vocabulary(&self) -> &SubwordSet {
        &self.source_vocabulary
    }

    /// The target-side vocabulary.
    pub fn target_vocabulary(&self) -> &SubwordSet {
        &self.target_vocabulary
    }
}
