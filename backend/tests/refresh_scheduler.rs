use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use backend::active_contract::{ActiveContractStore, SqlxActiveContractRepository};
use backend::credentials::{CachedTokenProvider, SqlxTokenRepository, StoredToken, TokenRepository};
use backend::db::Db;
use backend::fetcher::ContractFetcher;
use backend::kis::{KisError, QuoteApi, TokenIssuer, TokenResponse};
use backend::metrics::counters::Counters;
use backend::scheduler::{RefreshScheduler, SchedulerSettings, TickOutcome};
use backend::selector::ActiveContractSelector;
use backend::service::ActiveContractService;
use chrono::{DateTime, TimeZone, Utc};
use contracts::{CandidatePolicy, ContractMarketSnapshot};
use rust_decimal_macros::dec;
use sqlx::Row;
use uuid::Uuid;

/// Brokerage double: fixed volumes per symbol (1_000 for any other symbol),
/// optional issuance failure.
struct FakeKis {
    volumes: HashMap<String, u64>,
    issue_ok: bool,
    quotes: AtomicUsize,
}

impl FakeKis {
    fn new(issue_ok: bool) -> Self {
        let volumes = [
            ("101X02", 0),
            ("101X04", 12_000),
            ("101X06", 8_000),
            ("101X08", 15_000),
        ]
        .into_iter()
        .map(|(s, v)| (s.to_string(), v))
        .collect();

        Self {
            volumes,
            issue_ok,
            quotes: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl TokenIssuer for FakeKis {
    async fn issue_token(&self) -> Result<TokenResponse, KisError> {
        if !self.issue_ok {
            return Err(KisError::Rejected {
                code: "1".into(),
                msg_code: "EGW00103".into(),
                message: "invalid appkey".into(),
            });
        }
        Ok(TokenResponse {
            access_token: Some("fake-token".into()),
            token_type: Some("Bearer".into()),
            expires_in: Some(86_400),
        })
    }
}

#[async_trait]
impl QuoteApi for FakeKis {
    async fn inquire_price(
        &self,
        _token: &str,
        symbol: &str,
    ) -> Result<ContractMarketSnapshot, KisError> {
        self.quotes.fetch_add(1, Ordering::SeqCst);
        let volume = self.volumes.get(symbol).copied().unwrap_or(1_000);
        Ok(ContractMarketSnapshot {
            symbol: symbol.into(),
            current_price: dec!(142000),
            volume,
            open_interest: 20_000,
            change_rate: dec!(0.5),
            high: dec!(142500),
            low: dec!(141500),
        })
    }
}

struct Harness {
    db: Db,
    kis: Arc<FakeKis>,
    service: Arc<ActiveContractService>,
    scheduler: Arc<RefreshScheduler>,
}

async fn harness(issue_ok: bool) -> Harness {
    let url = format!("sqlite:file:{}?mode=memory&cache=shared", Uuid::new_v4());
    let db = Db::connect(&url).await.unwrap();
    db.migrate().await.unwrap();

    let kis = Arc::new(FakeKis::new(issue_ok));
    let counters = Counters::default();

    let tokens = Arc::new(CachedTokenProvider::new(
        kis.clone(),
        Arc::new(SqlxTokenRepository::new(db.pool.clone())),
        chrono::Duration::hours(23),
    ));

    let selector = ActiveContractSelector::new(
        tokens.clone(),
        ContractFetcher::new(kis.clone(), Duration::from_secs(5)),
        Duration::from_secs(20),
        counters.clone(),
    );

    let store = Arc::new(ActiveContractStore::new(
        Arc::new(SqlxActiveContractRepository::new(db.pool.clone())),
        chrono::Duration::hours(24),
    ));

    let service = Arc::new(ActiveContractService::new(
        CandidatePolicy::default(),
        selector,
        store,
        counters,
    ));

    let scheduler = Arc::new(RefreshScheduler::new(
        service.clone(),
        tokens,
        SchedulerSettings {
            poll_interval: Duration::from_secs(600),
            refresh_every: chrono::Duration::hours(24),
            token_retention: chrono::Duration::days(1),
        },
    ));

    Harness {
        db,
        kis,
        service,
        scheduler,
    }
}

fn dec15() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 12, 15, 12, 0, 0).unwrap()
}

#[tokio::test]
async fn tick_refreshes_empty_store_then_waits_for_refresh_interval() {
    let h = harness(true).await;

    assert_eq!(
        h.scheduler.tick_at(dec15()).await,
        TickOutcome::Refreshed(Some("101X08".into()))
    );
    assert_eq!(
        h.scheduler.tick_at(dec15() + chrono::Duration::hours(6)).await,
        TickOutcome::UpToDate
    );

    let stored = h.service.stored_contract().await.unwrap().unwrap();
    assert_eq!(stored.symbol, "101X08");
    assert_eq!(stored.updated_at, dec15());

    assert_eq!(
        h.scheduler.tick_at(dec15() + chrono::Duration::hours(24)).await,
        TickOutcome::Refreshed(Some("101X08".into()))
    );
    assert_eq!(h.kis.quotes.load(Ordering::SeqCst), 8);
}

#[tokio::test]
async fn tick_fails_without_credentials_and_queries_nothing() {
    let h = harness(false).await;

    assert_eq!(h.scheduler.tick_at(dec15()).await, TickOutcome::Failed);
    assert_eq!(h.kis.quotes.load(Ordering::SeqCst), 0);
    assert!(h.service.stored_contract().await.unwrap().is_none());
}

#[tokio::test]
async fn tick_prunes_expired_tokens() {
    let h = harness(true).await;
    let repo = SqlxTokenRepository::new(h.db.pool.clone());
    repo.insert(&StoredToken {
        access_token: "ancient".into(),
        created_at: dec15() - chrono::Duration::days(3),
    })
    .await
    .unwrap();

    h.scheduler.tick_at(dec15()).await;

    let tokens: Vec<String> = sqlx::query("SELECT access_token FROM kis_tokens")
        .fetch_all(&h.db.pool)
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.get::<String, _>("access_token"))
        .collect();
    assert_eq!(tokens, ["fake-token"]);
}

#[tokio::test]
async fn concurrent_start_spawns_a_single_loop() {
    let h = harness(true).await;

    let mut handles = Vec::new();
    for _ in 0..8 {
        let s = h.scheduler.clone();
        handles.push(tokio::spawn(async move { s.start() }));
    }

    let mut started = 0;
    for handle in handles {
        if handle.await.unwrap() {
            started += 1;
        }
    }

    assert_eq!(started, 1);
    assert!(h.scheduler.is_running());
    assert!(!h.scheduler.start());

    h.scheduler.shutdown().await;
}

#[tokio::test]
async fn background_loop_runs_first_cycle_immediately() {
    let h = harness(true).await;
    h.scheduler.start();

    // First interval tick completes immediately; wait for the cycle to land.
    let mut stored = None;
    for _ in 0..100 {
        stored = h.service.stored_contract().await.unwrap();
        if stored.is_some() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    h.scheduler.shutdown().await;
    assert!(stored.is_some());
}
