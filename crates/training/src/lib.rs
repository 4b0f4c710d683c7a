//! Subword-training - BPE rule learning
//!
//! This crate turns a word-frequency dictionary into a prioritized set of
//! merge rules. The trainer never rescans the whole corpus after learning a
//! rule: a pair-to-position index and incrementally maintained pair
//! statistics keep each step proportional to the words actually containing
//! the merged pair.

pub mod training;
pub use training::{BpeTrainer, TrainerConfig, WordCounts};
