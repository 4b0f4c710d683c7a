//! Subword-tokenizer - High-level subword text processing API
//!
//! This crate assembles the pieces from `subword-core` and `subword-training`
//! into the serving-time surface of the tokenizer: the
//! [`SubwordTextProcessor`] with its source/target models and vocabularies,
//! the persisted model-file format, the corpus reader interface, and the
//! [`ProcessorBuilder`] that trains a processor from parallel corpora.
//!
//! # Example
//!
//! ```rust
//! use subword_tokenizer::{MemoryCorpus, MultilingualCorpus, ProcessorBuilder, StringPair};
//!
//! let corpus = MemoryCorpus::new(vec![StringPair {
//!     source: "the low bid".into(),
//!     target: "the lower bid".into(),
//! }]);
//! let corpora: Vec<Box<dyn MultilingualCorpus>> = vec![Box::new(corpus)];
//!
//! let processor = ProcessorBuilder::new()
//!     .max_rules(100)
//!     .min_frequency(1)
//!     .build(&corpora)?;
//! let subwords = processor.encode(&["low"], true);
//! assert!(!subwords.is_empty());
//! # Ok::<(), subword_tokenizer::SubwordError>(())
//! ```

// Re-export core types
pub use subword_core::{BpeModel, Result, Rule, RuleMap, SubwordError, SubwordSet};

// Corpus reader interface
pub mod corpus;
pub use corpus::{FileCorpus, MemoryCorpus, MultilingualCorpus, PairReader, StringPair};

// Processor API
pub mod processor;
pub use processor::SubwordTextProcessor;

// Model persistence
pub mod io;
pub use io::{ModelLoader, ModelSaver};

// Corpus scanning and training orchestration
pub mod builder;
pub use builder::{BuilderConfig, ProcessorBuilder};
