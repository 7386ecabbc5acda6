//! Liquidity reduction over freshly observed candidates.
//!
//! Traded volume is the only signal. Ties go to the nearest expiry, where
//! liquidity concentrates; remaining ties fall back to the symbol so the
//! result never depends on the order snapshots arrived in.

use std::cmp::Reverse;

use chrono::{DateTime, Utc};

use crate::types::{ActiveContract, ContractCandidate, ContractMarketSnapshot};

/// A candidate paired with the snapshot fetched for it.
pub type Observation = (ContractCandidate, ContractMarketSnapshot);

/// Picks the most liquid observation and merges it into an `ActiveContract`.
///
/// Returns `None` when nothing tradeable was observed. Zero-volume snapshots
/// are ignored even if a caller passes them in.
pub fn select_most_liquid(
    observations: &[Observation],
    updated_at: DateTime<Utc>,
) -> Option<ActiveContract> {
    observations
        .iter()
        .filter(|(_, snapshot)| snapshot.is_tradeable())
        .min_by_key(|(candidate, snapshot)| {
            (
                Reverse(snapshot.volume),
                candidate.expiry_date,
                candidate.symbol.as_str(),
            )
        })
        .map(|(candidate, snapshot)| ActiveContract::from_parts(candidate, snapshot, updated_at))
}
