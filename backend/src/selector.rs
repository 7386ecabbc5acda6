//! Active Contract Selector
//!
//! Fans out one fetch per candidate, gathers whatever arrives within the cycle
//! budget, and reduces the observations to the most liquid contract.
//!
//! Outcomes:
//! - `Ok(Some(contract))`: at least one candidate traded.
//! - `Ok(None)`: nothing traded (or nothing arrived in time). Expected; callers
//!   keep the previous contract.
//! - `Err(CycleError::Credentials)`: no token, so no candidate was queried.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use contracts::{ActiveContract, ContractCandidate, ContractMarketSnapshot, select_most_liquid};
use futures::StreamExt;
use futures::stream::FuturesUnordered;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::credentials::TokenProvider;
use crate::error::CycleError;
use crate::fetcher::ContractFetcher;
use crate::metrics::counters::Counters;

pub struct ActiveContractSelector {
    tokens: Arc<dyn TokenProvider>,
    fetcher: ContractFetcher,
    /// Wall-clock budget for the whole fan-out.
    cycle_budget: Duration,
    counters: Counters,
}

impl ActiveContractSelector {
    pub fn new(
        tokens: Arc<dyn TokenProvider>,
        fetcher: ContractFetcher,
        cycle_budget: Duration,
        counters: Counters,
    ) -> Self {
        Self {
            tokens,
            fetcher,
            cycle_budget,
            counters,
        }
    }

    /// Fetches every candidate concurrently.
    ///
    /// The result keeps candidate order; a `None` snapshot means the candidate
    /// contributed no data (failed, untraded, or still pending at the deadline).
    #[instrument(skip(self, candidates), target = "selector", fields(candidates = candidates.len()))]
    pub async fn observe(
        &self,
        candidates: &[ContractCandidate],
    ) -> Result<Vec<(ContractCandidate, Option<ContractMarketSnapshot>)>, CycleError> {
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let token = self.tokens.get_token().await?;

        let mut results: Vec<Option<ContractMarketSnapshot>> = vec![None; candidates.len()];
        let mut pending: FuturesUnordered<_> = candidates
            .iter()
            .enumerate()
            .map(|(idx, c)| {
                let fetcher = &self.fetcher;
                let token = token.as_str();
                async move { (idx, fetcher.fetch_snapshot(token, &c.symbol).await) }
            })
            .collect();

        let deadline = Instant::now() + self.cycle_budget;

        loop {
            match tokio::time::timeout_at(deadline, pending.next()).await {
                Ok(Some((idx, snapshot))) => results[idx] = snapshot,
                Ok(None) => break,
                Err(_) => {
                    let abandoned = pending.len();
                    Counters::add(&self.counters.snapshots_abandoned, abandoned as u64);
                    warn!(
                        abandoned,
                        budget_ms = self.cycle_budget.as_millis() as u64,
                        "cycle budget exceeded; proceeding with arrived snapshots"
                    );
                    break;
                }
            }
        }

        let found = results.iter().filter(|s| s.is_some()).count();
        Counters::add(&self.counters.snapshots_fetched, found as u64);
        Counters::add(
            &self.counters.snapshots_missing,
            (candidates.len() - found) as u64,
        );
        debug!(found, "candidate observation complete");

        Ok(candidates.iter().cloned().zip(results).collect())
    }

    /// Single live snapshot, e.g. for the stored contract.
    pub async fn snapshot(&self, symbol: &str) -> Result<Option<ContractMarketSnapshot>, CycleError> {
        let token = self.tokens.get_token().await?;
        Ok(self.fetcher.fetch_snapshot(&token, symbol).await)
    }

    /// Most liquid candidate merged into an `ActiveContract` stamped `now`.
    #[instrument(skip(self, candidates, now), target = "selector")]
    pub async fn select_active(
        &self,
        candidates: &[ContractCandidate],
        now: DateTime<Utc>,
    ) -> Result<Option<ActiveContract>, CycleError> {
        let observations: Vec<_> = self
            .observe(candidates)
            .await?
            .into_iter()
            .filter_map(|(c, s)| s.map(|s| (c, s)))
            .collect();

        let selected = select_most_liquid(&observations, now);

        match &selected {
            Some(c) => info!(
                symbol = %c.symbol,
                volume = c.volume,
                observed = observations.len(),
                "active contract selected"
            ),
            None => warn!("no candidate traded; nothing selected"),
        }

        Ok(selected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CredentialError;
    use crate::kis::{KisError, QuoteApi};
    use async_trait::async_trait;
    use chrono::{NaiveDate, TimeZone};
    use contracts::{CandidatePolicy, generate_candidates};
    use rust_decimal::Decimal;
    use std::collections::HashMap;

    struct StaticToken;

    #[async_trait]
    impl TokenProvider for StaticToken {
        async fn get_token(&self) -> Result<String, CredentialError> {
            Ok("tok".into())
        }
    }

    struct NoToken;

    #[async_trait]
    impl TokenProvider for NoToken {
        async fn get_token(&self) -> Result<String, CredentialError> {
            Err(CredentialError::EmptyToken)
        }
    }

    /// Volume per symbol; missing symbols are rejected, `u64::MAX` hangs.
    struct VolumeTable(HashMap<String, u64>);

    #[async_trait]
    impl QuoteApi for VolumeTable {
        async fn inquire_price(
            &self,
            _token: &str,
            symbol: &str,
        ) -> Result<ContractMarketSnapshot, KisError> {
            let volume = *self.0.get(symbol).ok_or(KisError::MissingOutput)?;
            if volume == u64::MAX {
                tokio::time::sleep(Duration::from_secs(3_600)).await;
            }
            Ok(ContractMarketSnapshot {
                symbol: symbol.into(),
                current_price: Decimal::from(140_000 + volume),
                volume,
                open_interest: volume / 3,
                change_rate: Decimal::ONE,
                high: Decimal::from(150_000),
                low: Decimal::from(130_000),
            })
        }
    }

    fn december_candidates() -> Vec<ContractCandidate> {
        generate_candidates(
            NaiveDate::from_ymd_opt(2025, 12, 15).unwrap(),
            &CandidatePolicy::default(),
        )
    }

    fn selector(
        tokens: Arc<dyn TokenProvider>,
        volumes: &[(&str, u64)],
        fetch_timeout: Duration,
        budget: Duration,
    ) -> ActiveContractSelector {
        let table = VolumeTable(volumes.iter().map(|(s, v)| (s.to_string(), *v)).collect());
        ActiveContractSelector::new(
            tokens,
            ContractFetcher::new(Arc::new(table), fetch_timeout),
            budget,
            Counters::default(),
        )
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 12, 15, 9, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn december_scenario_picks_highest_volume() {
        let s = selector(
            Arc::new(StaticToken),
            &[
                ("101X02", 0),
                ("101X04", 12_000),
                ("101X06", 8_000),
                ("101X08", 15_000),
            ],
            Duration::from_secs(5),
            Duration::from_secs(20),
        );

        let active = s
            .select_active(&december_candidates(), now())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(active.symbol, "101X08");
        assert_eq!(active.volume, 15_000);
        assert_eq!(active.expiry_year, 2026);
        assert_eq!(active.expiry_month, 8);
        assert_eq!(Counters::get(&s.counters.snapshots_fetched), 3);
        assert_eq!(Counters::get(&s.counters.snapshots_missing), 1);
    }

    #[tokio::test]
    async fn nothing_traded_selects_nothing() {
        let s = selector(
            Arc::new(StaticToken),
            &[("101X02", 0)],
            Duration::from_secs(5),
            Duration::from_secs(20),
        );

        let out = s.select_active(&december_candidates(), now()).await.unwrap();
        assert!(out.is_none());
    }

    #[tokio::test]
    async fn credential_failure_fails_the_cycle() {
        let s = selector(
            Arc::new(NoToken),
            &[("101X04", 12_000)],
            Duration::from_secs(5),
            Duration::from_secs(20),
        );

        let err = s.select_active(&december_candidates(), now()).await.unwrap_err();
        assert!(matches!(err, CycleError::Credentials(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_candidate_is_abandoned_at_budget() {
        // Per-fetch timeout longer than the budget so the budget fires first.
        let s = selector(
            Arc::new(StaticToken),
            &[("101X02", u64::MAX), ("101X04", 9_000), ("101X06", 4_000)],
            Duration::from_secs(120),
            Duration::from_secs(10),
        );

        let observed = s.observe(&december_candidates()).await.unwrap();
        assert_eq!(observed.len(), 4);
        assert!(observed[0].1.is_none());
        assert_eq!(observed[1].1.as_ref().unwrap().volume, 9_000);
        assert_eq!(Counters::get(&s.counters.snapshots_abandoned), 1);

        let active = s.select_active(&december_candidates(), now()).await.unwrap();
        assert_eq!(active.unwrap().symbol, "101X04");
    }

    #[tokio::test]
    async fn empty_candidate_list_skips_token() {
        let s = selector(
            Arc::new(NoToken),
            &[],
            Duration::from_secs(5),
            Duration::from_secs(20),
        );
        assert!(s.observe(&[]).await.unwrap().is_empty());
    }
}
