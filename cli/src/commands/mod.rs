//! CLI command implementations.

pub mod encode;
pub mod train;

pub use encode::EncodeCommand;
pub use train::TrainCommand;
