//! Kernel services.

pub mod ranking;

pub use ranking::{RankingStore, VoteCandidate};
