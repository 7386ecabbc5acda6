//! Service facade over candidate generation, selection and storage.
//!
//! Every caller (the background scheduler, the CLI, a request handler) goes
//! through this type; none of them touch the selector or the store directly.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::Result;
use chrono::{DateTime, Local, NaiveDate, Utc};
use contracts::analysis::{MarketAnalysis, analyze};
use contracts::{
    ActiveContract, CandidatePolicy, ContractCandidate, ContractMarketSnapshot, CurrentContract,
    Freshness, generate_candidates,
};
use tokio::sync::Mutex;
use tracing::{Instrument, debug, error, info, warn};

use crate::active_contract::ActiveContractStore;
use crate::error::CycleError;
use crate::logger::{TraceId, annotate_span, root_span};
use crate::metrics::counters::Counters;
use crate::selector::ActiveContractSelector;

pub struct ActiveContractService {
    policy: CandidatePolicy,
    selector: ActiveContractSelector,
    store: Arc<ActiveContractStore>,
    counters: Counters,

    /// Held for the whole of every selection cycle.
    refresh_state: Mutex<RefreshState>,
    /// Mirrors `RefreshState::generation` for lock-free reads.
    completed_cycles: AtomicU64,
}

#[derive(Default)]
struct RefreshState {
    /// Cycles completed so far.
    generation: u64,
    /// Result of the latest cycle; `None` when it failed.
    last: Option<Option<ActiveContract>>,
}

/// Trading date for a wall-clock instant (server local time).
pub fn trading_date(now: DateTime<Utc>) -> NaiveDate {
    now.with_timezone(&Local).date_naive()
}

impl ActiveContractService {
    pub fn new(
        policy: CandidatePolicy,
        selector: ActiveContractSelector,
        store: Arc<ActiveContractStore>,
        counters: Counters,
    ) -> Self {
        Self {
            policy,
            selector,
            store,
            counters,
            refresh_state: Mutex::new(RefreshState::default()),
            completed_cycles: AtomicU64::new(0),
        }
    }

    pub fn counters(&self) -> &Counters {
        &self.counters
    }

    pub fn list_candidates_at(&self, today: NaiveDate) -> Vec<ContractCandidate> {
        generate_candidates(today, &self.policy)
    }

    pub fn list_candidates(&self) -> Vec<ContractCandidate> {
        self.list_candidates_at(trading_date(Utc::now()))
    }

    /// Candidates paired with their live snapshot (or `None`).
    pub async fn list_candidates_with_data_at(
        &self,
        today: NaiveDate,
    ) -> Result<Vec<(ContractCandidate, Option<ContractMarketSnapshot>)>, CycleError> {
        self.selector.observe(&self.list_candidates_at(today)).await
    }

    pub async fn list_candidates_with_data(
        &self,
    ) -> Result<Vec<(ContractCandidate, Option<ContractMarketSnapshot>)>, CycleError> {
        self.list_candidates_with_data_at(trading_date(Utc::now()))
            .await
    }

    /// Runs one selection cycle and persists the winner.
    ///
    /// `Ok(None)` means no candidate traded; the stored contract is left as is.
    /// A failed save is logged and counted, the selection is still returned.
    ///
    /// At most one cycle runs per service. A caller that arrives while a cycle
    /// is in flight waits for it and takes its result instead of starting
    /// another; if that cycle failed, the caller runs its own.
    pub async fn refresh_active_contract_at(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Option<ActiveContract>, CycleError> {
        let seen = self.completed_cycles.load(Ordering::Acquire);
        let mut state = self.refresh_state.lock().await;

        if state.generation != seen {
            if let Some(last) = &state.last {
                debug!("joined an in-flight refresh");
                return Ok(last.clone());
            }
        }

        self.run_cycle_locked(&mut state, now).await
    }

    /// Runs a cycle while the caller holds the refresh lock and records its outcome.
    async fn run_cycle_locked(
        &self,
        state: &mut RefreshState,
        now: DateTime<Utc>,
    ) -> Result<Option<ActiveContract>, CycleError> {
        let outcome = self.run_cycle(now).await;

        state.generation += 1;
        state.last = outcome.as_ref().ok().cloned();
        self.completed_cycles
            .store(state.generation, Ordering::Release);

        outcome
    }

    async fn run_cycle(&self, now: DateTime<Utc>) -> Result<Option<ActiveContract>, CycleError> {
        let trace_id = TraceId::random();
        let span = root_span("refresh_active_contract", &trace_id);

        async move {
            Counters::incr(&self.counters.refresh_cycles);

            let today = trading_date(now);
            let candidates = self.list_candidates_at(today);
            annotate_span(None, candidates.len());

            if candidates.is_empty() {
                Counters::incr(&self.counters.refresh_failed);
                error!(%today, "candidate generation produced nothing");
                return Err(CycleError::NoCandidates(today));
            }

            let selected = match self.selector.select_active(&candidates, now).await {
                Ok(s) => s,
                Err(e) => {
                    Counters::incr(&self.counters.refresh_failed);
                    error!(error = %e, "refresh cycle aborted");
                    return Err(e);
                }
            };

            let Some(contract) = selected else {
                Counters::incr(&self.counters.refresh_empty);
                warn!("no active contract found; keeping previous");
                return Ok(None);
            };

            annotate_span(Some(&contract.symbol), candidates.len());

            if let Err(e) = self.store.save(&contract).await {
                Counters::incr(&self.counters.persist_failed);
                error!(error = ?e, "failed to persist active contract; will retry next cycle");
            }

            Counters::incr(&self.counters.refresh_selected);
            info!(
                symbol = %contract.symbol,
                description = %contract.description,
                volume = contract.volume,
                "active contract refreshed"
            );

            Ok(Some(contract))
        }
        .instrument(span)
        .await
    }

    pub async fn refresh_active_contract(&self) -> Result<Option<ActiveContract>, CycleError> {
        self.refresh_active_contract_at(Utc::now()).await
    }

    /// Latest stored contract flagged fresh or stale.
    pub async fn get_active_contract_at(&self, now: DateTime<Utc>) -> Result<Option<CurrentContract>> {
        self.store.get_current_at(now).await
    }

    pub async fn get_active_contract(&self) -> Result<Option<CurrentContract>> {
        self.get_active_contract_at(Utc::now()).await
    }

    /// Latest stored contract regardless of age.
    pub async fn stored_contract(&self) -> Result<Option<ActiveContract>> {
        self.store.latest().await
    }

    /// Returns a fresh contract, refreshing first when the stored one is stale
    /// or missing. The stored row is re-read under the refresh lock, so a cycle
    /// that finished while this caller waited is reused.
    ///
    /// If the refresh finds nothing or cannot run, the stale row (if any) is
    /// returned flagged `Stale`.
    pub async fn ensure_fresh_at(&self, now: DateTime<Utc>) -> Result<Option<CurrentContract>> {
        let current = self.get_active_contract_at(now).await?;
        if matches!(&current, Some(c) if !c.is_stale()) {
            return Ok(current);
        }

        let mut state = self.refresh_state.lock().await;

        let current = self.get_active_contract_at(now).await?;
        if matches!(&current, Some(c) if !c.is_stale()) {
            debug!("refreshed by a concurrent caller");
            return Ok(current);
        }

        match self.run_cycle_locked(&mut state, now).await {
            Ok(Some(contract)) => Ok(Some(CurrentContract {
                contract,
                freshness: Freshness::Fresh,
            })),
            Ok(None) => Ok(current),
            Err(e) => {
                warn!(error = %e, "on-demand refresh failed; serving stored contract");
                Ok(current)
            }
        }
    }

    pub async fn ensure_fresh(&self) -> Result<Option<CurrentContract>> {
        self.ensure_fresh_at(Utc::now()).await
    }

    /// Rule-based reading of the stored contract's live quote.
    ///
    /// `None` when nothing is stored or the live snapshot is unavailable.
    pub async fn analyze_active_contract(&self) -> Result<Option<MarketAnalysis>> {
        let Some(current) = self.get_active_contract().await? else {
            return Ok(None);
        };

        match self.selector.snapshot(&current.contract.symbol).await {
            Ok(Some(snapshot)) => Ok(Some(analyze(&snapshot))),
            Ok(None) => Ok(None),
            Err(e) => {
                warn!(error = %e, symbol = %current.contract.symbol, "analysis skipped");
                Ok(None)
            }
        }
    }
}
