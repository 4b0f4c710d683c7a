//! The BPE model: rule lookups, the merge loop, and vocabulary-constrained
//! splitting.
//!
//! A [`BpeModel`] holds the learned rule-to-priority mapping for one side of
//! a translation pair and knows how to split a word into subwords that the
//! downstream engine can translate and re-merge. The rule maps are read-only
//! after construction; the encode cache is the only mutable state, so one
//! model instance can serve many request threads at once.

use crate::core::cache::EncodeCache;
use crate::core::rule::{Rule, RuleMap, NO_RULE};
use crate::core::symbol::{Symbol, END_OF_WORD};
use ahash::{AHashMap, AHashSet};
use compact_str::CompactString;

/// The set of subword forms legal for one side, stored without separator or
/// end-of-word tag.
pub type SubwordSet = AHashSet<CompactString>;

/// A trained BPE model for one language side.
pub struct BpeModel {
    /// Rule -> priority; lower priority = learned earlier = merged first.
    rule2priority: RuleMap,
    /// Reverse index: concatenated rule text -> rule, for splitting
    /// over-merged symbols back into vocabulary-legal pieces.
    string2rule: AHashMap<CompactString, Rule>,
    /// Marker appended to every non-final subword of a word.
    separator: String,
    /// Encode-result cache, keyed by the word text.
    cache: EncodeCache,
}

impl BpeModel {
    /// Create a model from a rule map, with the default cache capacity.
    pub fn new(rules: RuleMap, separator: impl Into<String>) -> Self {
        Self::with_cache_capacity(rules, separator, EncodeCache::DEFAULT_CAPACITY)
    }

    /// Create a model with an explicit encode-cache capacity.
    pub fn with_cache_capacity(
        rules: RuleMap,
        separator: impl Into<String>,
        cache_capacity: usize,
    ) -> Self {
        let mut string2rule: AHashMap<CompactString, Rule> = AHashMap::with_capacity(rules.len());
        for (rule, &priority) in &rules {
            // Two rules can concatenate to the same text (the key cannot tell
            // "ab"+"c" from "a"+"bc"). Keep the earlier-learned rule so the
            // choice does not depend on map iteration order.
            string2rule
                .entry(rule.merged())
                .and_modify(|kept| {
                    if priority < rules[kept] {
                        *kept = rule.clone();
                    }
                })
                .or_insert_with(|| rule.clone());
        }
        Self {
            rule2priority: rules,
            string2rule,
            separator: separator.into(),
            cache: EncodeCache::with_capacity(cache_capacity),
        }
    }

    /// The inter-subword separator.
    pub fn separator(&self) -> &str {
        &self.separator
    }

    /// The learned rules with their priorities.
    pub fn rules(&self) -> &RuleMap {
        &self.rule2priority
    }

    /// The priority of a rule, or [`NO_RULE`] if the model never learned it.
    #[inline]
    pub fn priority_for(&self, rule: &Rule) -> u32 {
        self.rule2priority.get(rule).copied().unwrap_or(NO_RULE)
    }

    /// Drop every cached encode result. Results are unaffected; only timing.
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Encode a batch of words, concatenating the per-word subwords in order.
    pub fn apply(&self, words: &[&str], vocabulary: Option<&SubwordSet>) -> Vec<CompactString> {
        let mut result = Vec::with_capacity(words.len());
        for word in words {
            result.extend(self.encode(word, vocabulary));
        }
        result
    }

    /// Encode one whitespace-free word into subwords.
    ///
    /// Every returned element except the last carries the separator as a
    /// literal trailing substring; concatenating the elements with separators
    /// stripped reconstructs the word exactly. A word with at most one
    /// character, or containing only characters the model never saw, comes
    /// back unchanged or split per character — never an error.
    ///
    /// Results are cached by the word text alone, so one model instance must
    /// always be called with the same vocabulary.
    pub fn encode<'a>(&'a self, word: &'a str, vocabulary: Option<&SubwordSet>) -> Vec<CompactString> {
        if let Some(hit) = self.cache.get(word) {
            return hit;
        }

        let mut symbols = Symbol::from_word(word);
        // a word of one character (or none) has no pairs to merge
        if symbols.len() <= 1 {
            return vec![CompactString::new(word)];
        }

        loop {
            // pick the adjacent pair with the earliest-learned rule
            let mut best: Option<(u32, usize)> = None;
            for i in 0..symbols.len() - 1 {
                let priority =
                    self.priority_for(&Rule::new(symbols[i].full(), symbols[i + 1].full()));
                if priority < best.map_or(NO_RULE, |(p, _)| p) {
                    best = Some((priority, i));
                }
            }
            // no rule covers any remaining pair
            let Some((_, at)) = best else { break };

            let left = CompactString::new(symbols[at].full());
            let right = CompactString::new(symbols[at + 1].full());

            // merge every non-overlapping occurrence, left to right
            let mut updated = Vec::with_capacity(symbols.len());
            let mut i = 0;
            while i < symbols.len() {
                if i + 1 < symbols.len()
                    && symbols[i].full() == left
                    && symbols[i + 1].full() == right
                {
                    updated.push(Symbol::merge(&symbols[i], &symbols[i + 1]));
                    i += 2;
                } else {
                    updated.push(symbols[i].clone());
                    i += 1;
                }
            }
            symbols = updated;

            // the whole word merged back into a single valid unit
            if symbols.len() == 1 {
                break;
            }
        }

        // mark every subword boundary except the last
        let last = symbols.len() - 1;
        for symbol in &mut symbols[..last] {
            *symbol = symbol.with_suffix(&self.separator);
        }

        if let Some(vocabulary) = vocabulary {
            symbols = self.split_with_vocabulary(symbols, vocabulary);
        }

        let mut result: Vec<CompactString> = Vec::with_capacity(symbols.len());
        for symbol in &symbols {
            if symbol.is_word_final() {
                // strip the end-of-word tag; drop the symbol if nothing remains
                if !symbol.inner().is_empty() {
                    result.push(CompactString::new(symbol.inner()));
                }
            } else {
                result.push(CompactString::new(symbol.full()));
            }
        }

        self.cache.put(word, result.clone());
        result
    }

    /// Split every symbol whose text is missing from the vocabulary back into
    /// vocabulary-legal pieces, by undoing learned merges one at a time.
    ///
    /// A symbol that has no matching rule is kept as-is even when it is out
    /// of vocabulary; dropping it would break round-tripping. Splitting is
    /// driven by an explicit work stack, so pathological word lengths cannot
    /// exhaust the call stack.
    fn split_with_vocabulary<'a>(
        &'a self,
        symbols: Vec<Symbol<'a>>,
        vocabulary: &SubwordSet,
    ) -> Vec<Symbol<'a>> {
        let mut result = Vec::with_capacity(symbols.len());
        let mut pending: Vec<Symbol<'a>> = Vec::new();
        for symbol in symbols {
            pending.push(symbol);
            while let Some(current) = pending.pop() {
                if vocabulary.contains(current.inner()) {
                    result.push(current);
                    continue;
                }
                match self.splitting_rule(&current) {
                    None => result.push(current),
                    Some(rule) => {
                        let right_suffix = if rule.right.ends_with(END_OF_WORD) {
                            END_OF_WORD
                        } else {
                            current.suffix()
                        };
                        let (left, right) =
                            current.split(rule.left.len(), &self.separator, right_suffix);
                        pending.push(right);
                        pending.push(left);
                    }
                }
            }
        }
        result
    }

    /// Reverse-lookup the rule whose two sides reassemble this symbol, if any.
    fn splitting_rule(&self, symbol: &Symbol<'_>) -> Option<&Rule> {
        // a word-final symbol was merged with the tag attached, so the tag is
        // part of its lookup key
        let key = if symbol.is_word_final() {
            symbol.full()
        } else {
            symbol.inner()
        };
        let rule = self.string2rule.get(key)?;

        // The concatenation key cannot distinguish a learned end-of-word tag
        // from the same four characters appearing literally in a word. Accept
        // the rule only when its sides span the symbol's own text exactly;
        // otherwise treat the symbol as unsplittable.
        let right_len = match rule.right.strip_suffix(END_OF_WORD) {
            Some(stripped) if symbol.is_word_final() => stripped.len(),
            Some(_) => return None,
            None => rule.right.len(),
        };
        if rule.left.is_empty() || rule.left.len() + right_len != symbol.inner().len() {
            return None;
        }
        Some(rule)
    }
}
