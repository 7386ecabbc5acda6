use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use contracts::{ActiveContract, CurrentContract, Freshness};
use tracing::{debug, info, instrument, warn};

use crate::active_contract::repository::ActiveContractRepository;
use crate::logger::warn_if_slow;

/// How a save reached the database.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SaveOutcome {
    Upserted,
    /// Upsert was rejected; a plain insert succeeded and older rows were pruned.
    InsertedAndPruned { pruned: u64 },
}

/// Owner of the persisted active contract.
///
/// Only the row with the latest `updated_at` is authoritative. Concurrent
/// writers are not coordinated: last write wins.
pub struct ActiveContractStore {
    repo: Arc<dyn ActiveContractRepository>,
    freshness: chrono::Duration,
}

impl ActiveContractStore {
    pub fn new(repo: Arc<dyn ActiveContractRepository>, freshness: chrono::Duration) -> Self {
        Self { repo, freshness }
    }

    pub fn freshness_threshold(&self) -> chrono::Duration {
        self.freshness
    }

    /// Latest row regardless of age.
    pub async fn latest(&self) -> Result<Option<ActiveContract>> {
        warn_if_slow("db_latest_contract", Duration::from_millis(100), async {
            self.repo.latest().await
        })
        .await
        .context("failed to load latest active contract")
    }

    /// Latest row if it is younger than the freshness threshold.
    pub async fn get_fresh_at(&self, now: DateTime<Utc>) -> Result<Option<ActiveContract>> {
        Ok(self
            .get_current_at(now)
            .await?
            .and_then(CurrentContract::fresh))
    }

    /// Latest row tagged with its freshness.
    ///
    /// A stale row is still returned (flagged `Stale`) so a read path never
    /// fails purely because a refresh cycle was missed.
    #[instrument(skip(self), target = "store")]
    pub async fn get_current_at(&self, now: DateTime<Utc>) -> Result<Option<CurrentContract>> {
        let Some(contract) = self.latest().await? else {
            debug!("no active contract stored");
            return Ok(None);
        };

        let freshness = if contract.is_fresh(now, self.freshness) {
            Freshness::Fresh
        } else {
            warn!(
                symbol = %contract.symbol,
                age_mins = contract.age(now).num_minutes(),
                "stored active contract is stale"
            );
            Freshness::Stale
        };

        Ok(Some(CurrentContract {
            contract,
            freshness,
        }))
    }

    pub async fn get_current(&self) -> Result<Option<CurrentContract>> {
        self.get_current_at(Utc::now()).await
    }

    /// Upserts by symbol; falls back to insert-then-prune when upsert is rejected.
    ///
    /// The upsert needs the unique index on `symbol`. Databases created
    /// without it (older deployments, or a schema managed elsewhere) reject
    /// `ON CONFLICT` and take the fallback. When the index exists the upsert
    /// only fails if the database itself is failing, and then the fallback
    /// insert fails too and the error is returned.
    #[instrument(skip(self, contract), target = "store", fields(symbol = %contract.symbol))]
    pub async fn save(&self, contract: &ActiveContract) -> Result<SaveOutcome> {
        let upsert = warn_if_slow("db_upsert_contract", Duration::from_millis(100), async {
            self.repo.upsert(contract).await
        })
        .await;

        match upsert {
            Ok(()) => {
                info!(volume = contract.volume, "active contract saved");
                Ok(SaveOutcome::Upserted)
            }
            Err(e) => {
                warn!(error = ?e, "upsert rejected; falling back to insert + prune");

                self.repo
                    .insert(contract)
                    .await
                    .context("fallback insert of active contract failed")?;

                let pruned = match self.repo.prune_symbol(&contract.symbol).await {
                    Ok(n) => n,
                    Err(e) => {
                        // Extra rows are harmless: readers take the latest only.
                        warn!(error = ?e, "prune after insert failed");
                        0
                    }
                };

                info!(pruned, "active contract inserted");
                Ok(SaveOutcome::InsertedAndPruned { pruned })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use parking_lot::Mutex;
    use rust_decimal_macros::dec;

    fn mk_contract(symbol: &str, updated_at: DateTime<Utc>) -> ActiveContract {
        ActiveContract {
            symbol: symbol.into(),
            description: "Aug 2026 contract".into(),
            current_price: dec!(142000),
            volume: 15_000,
            open_interest: 7_500,
            change_rate: dec!(0.4),
            expiry_year: 2026,
            expiry_month: 8,
            updated_at,
        }
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 10, 9, 0, 0).unwrap()
    }

    #[derive(Default)]
    struct MemoryRepo {
        rows: Mutex<Vec<ActiveContract>>,
        reject_upsert: bool,
        fail_insert: bool,
        prune_calls: Mutex<Vec<String>>,
    }

    #[async_trait::async_trait]
    impl ActiveContractRepository for MemoryRepo {
        async fn latest(&self) -> anyhow::Result<Option<ActiveContract>> {
            Ok(self.rows.lock().iter().max_by_key(|c| c.updated_at).cloned())
        }

        async fn upsert(&self, contract: &ActiveContract) -> anyhow::Result<()> {
            if self.reject_upsert {
                return Err(anyhow::anyhow!("no unique constraint on symbol"));
            }
            let mut rows = self.rows.lock();
            rows.retain(|c| c.symbol != contract.symbol);
            rows.push(contract.clone());
            Ok(())
        }

        async fn insert(&self, contract: &ActiveContract) -> anyhow::Result<()> {
            if self.fail_insert {
                return Err(anyhow::anyhow!("database unreachable"));
            }
            self.rows.lock().push(contract.clone());
            Ok(())
        }

        async fn prune_symbol(&self, symbol: &str) -> anyhow::Result<u64> {
            self.prune_calls.lock().push(symbol.to_string());
            let mut rows = self.rows.lock();
            let keep = rows
                .iter()
                .filter(|c| c.symbol == symbol)
                .max_by_key(|c| c.updated_at)
                .cloned();
            let before = rows.len();
            rows.retain(|c| c.symbol != symbol || Some(c) == keep.as_ref());
            Ok((before - rows.len()) as u64)
        }
    }

    fn store(repo: Arc<MemoryRepo>) -> ActiveContractStore {
        ActiveContractStore::new(repo, chrono::Duration::hours(24))
    }

    #[tokio::test]
    async fn fresh_row_is_returned_as_fresh() {
        let repo = Arc::new(MemoryRepo::default());
        let s = store(repo);
        s.save(&mk_contract("101X08", t0())).await.unwrap();

        let now = t0() + chrono::Duration::hours(23);
        let current = s.get_current_at(now).await.unwrap().unwrap();
        assert_eq!(current.freshness, Freshness::Fresh);
        assert_eq!(s.get_fresh_at(now).await.unwrap().unwrap().symbol, "101X08");
    }

    #[tokio::test]
    async fn old_row_is_flagged_stale_and_not_fresh() {
        let repo = Arc::new(MemoryRepo::default());
        let s = store(repo);
        s.save(&mk_contract("101X08", t0())).await.unwrap();

        let now = t0() + chrono::Duration::hours(25);
        let current = s.get_current_at(now).await.unwrap().unwrap();
        assert!(current.is_stale());
        assert!(s.get_fresh_at(now).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn empty_store_returns_none() {
        let s = store(Arc::new(MemoryRepo::default()));
        assert!(s.get_current_at(t0()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn latest_row_wins_across_symbols() {
        let repo = Arc::new(MemoryRepo::default());
        let s = store(repo);
        s.save(&mk_contract("101X06", t0())).await.unwrap();
        s.save(&mk_contract("101X08", t0() + chrono::Duration::hours(1)))
            .await
            .unwrap();

        let current = s.get_current_at(t0() + chrono::Duration::hours(2)).await.unwrap();
        assert_eq!(current.unwrap().contract.symbol, "101X08");
    }

    #[tokio::test]
    async fn rejected_upsert_falls_back_to_insert_and_prune() {
        let repo = Arc::new(MemoryRepo {
            reject_upsert: true,
            ..Default::default()
        });
        let s = store(repo.clone());

        s.save(&mk_contract("101X08", t0())).await.unwrap();
        let outcome = s
            .save(&mk_contract("101X08", t0() + chrono::Duration::hours(1)))
            .await
            .unwrap();

        assert_eq!(outcome, SaveOutcome::InsertedAndPruned { pruned: 1 });
        assert_eq!(repo.rows.lock().len(), 1);
        assert_eq!(repo.prune_calls.lock().len(), 2);
    }

    #[tokio::test]
    async fn failed_fallback_insert_is_an_error() {
        let repo = Arc::new(MemoryRepo {
            reject_upsert: true,
            fail_insert: true,
            ..Default::default()
        });
        let s = store(repo);

        let err = s.save(&mk_contract("101X08", t0())).await.unwrap_err();
        let msg = format!("{err:?}");
        assert!(msg.contains("database unreachable"), "unexpected error: {msg}");
    }
}
