//! Core BPE data structures and the encode path.

pub mod cache;
pub mod model;
pub mod rule;
pub mod symbol;

pub use cache::EncodeCache;
pub use model::{BpeModel, SubwordSet};
pub use rule::{Rule, RuleMap, NO_RULE};
pub use symbol::{Symbol, END_OF_WORD};
