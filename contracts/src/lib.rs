//! Futures contract domain: candidate months, market snapshots, and the
//! liquidity rule that decides which month represents the market.

pub mod analysis;
pub mod candidates;
pub mod selector;
pub mod types;

pub use candidates::{CandidatePolicy, PolicyError, generate_candidates};
pub use selector::{Observation, select_most_liquid};
pub use types::*;
