//! Subword-core - Core BPE model for subword tokenization
//!
//! This crate provides the fundamental data structures and algorithms for
//! byte-pair-encoding a word into subword units: immutable [`Symbol`] spans,
//! learned merge [`Rule`]s with priorities, the [`BpeModel`] encode path with
//! its vocabulary-constrained splitter, and the bounded [`EncodeCache`].
//!
//! # Example
//!
//! ```rust
//! use subword_core::{BpeModel, Rule, RuleMap};
//!
//! let mut rules = RuleMap::new();
//! rules.insert(Rule::new("l", "o"), 0);
//! let model = BpeModel::new(rules, "@@");
//!
//! let subwords = model.encode("low", None);
//! assert_eq!(subwords, vec!["lo@@", "w"]);
//! ```

pub mod error;
pub use error::{Result, SubwordError};

// Core BPE algorithm modules
pub mod core;
pub use core::{BpeModel, EncodeCache, Rule, RuleMap, SubwordSet, Symbol, END_OF_WORD, NO_RULE};
