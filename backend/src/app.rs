//! Wiring of the long-lived components from configuration.

use std::sync::Arc;

use crate::active_contract::{ActiveContractStore, SqlxActiveContractRepository};
use crate::config::AppConfig;
use crate::credentials::{CachedTokenProvider, SqlxTokenRepository};
use crate::db::Db;
use crate::fetcher::ContractFetcher;
use crate::kis::KisClient;
use crate::metrics::counters::Counters;
use crate::scheduler::{RefreshScheduler, SchedulerSettings};
use crate::selector::ActiveContractSelector;
use crate::service::ActiveContractService;

pub struct App {
    pub service: Arc<ActiveContractService>,
    pub tokens: Arc<CachedTokenProvider>,
    pub scheduler: Arc<RefreshScheduler>,
    pub counters: Counters,
}

impl App {
    /// Connects and migrates the database, then builds the service graph.
    /// Nothing is started.
    pub async fn build(cfg: &AppConfig) -> anyhow::Result<Self> {
        let db = Db::connect(&cfg.database_url).await?;
        db.migrate().await?;

        let client = Arc::new(KisClient::new(cfg.kis.clone(), cfg.fetch_timeout)?);
        let counters = Counters::default();

        let tokens = Arc::new(CachedTokenProvider::new(
            client.clone(),
            Arc::new(SqlxTokenRepository::new(db.pool.clone())),
            cfg.token_validity,
        ));

        let selector = ActiveContractSelector::new(
            tokens.clone(),
            ContractFetcher::new(client, cfg.fetch_timeout),
            cfg.cycle_budget,
            counters.clone(),
        );

        let store = Arc::new(ActiveContractStore::new(
            Arc::new(SqlxActiveContractRepository::new(db.pool.clone())),
            cfg.contract_freshness,
        ));

        let service = Arc::new(ActiveContractService::new(
            cfg.candidate_policy.clone(),
            selector,
            store,
            counters.clone(),
        ));

        let scheduler = Arc::new(RefreshScheduler::new(
            service.clone(),
            tokens.clone(),
            SchedulerSettings::from_config(cfg),
        ));

        Ok(Self {
            service,
            tokens,
            scheduler,
            counters,
        })
    }
}
