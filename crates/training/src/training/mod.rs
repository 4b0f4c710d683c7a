//! BPE training: pair statistics and the rule-learning loop.

pub mod stats;
pub mod trainer;

pub use trainer::{BpeTrainer, TrainerConfig, WordCounts};
