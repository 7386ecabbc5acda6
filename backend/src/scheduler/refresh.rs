//! Background refresh loop.
//!
//! One process-wide scheduler. `start()` may be called from any number of
//! places concurrently; exactly one loop is spawned.
//!
//! Each tick:
//! - prunes persisted tokens past retention,
//! - re-selects the active contract when the stored one is missing or older
//!   than `refresh_every`.
//!
//! Cycles go through the service's refresh lock, so a tick never overlaps a
//! request-driven refresh. Tick failures are logged and counted; the loop
//! keeps running.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, instrument, warn};

use crate::config::AppConfig;
use crate::credentials::CachedTokenProvider;
use crate::service::ActiveContractService;

#[derive(Clone, Copy, Debug)]
pub struct SchedulerSettings {
    pub poll_interval: Duration,
    pub refresh_every: chrono::Duration,
    pub token_retention: chrono::Duration,
}

impl SchedulerSettings {
    pub fn from_config(cfg: &AppConfig) -> Self {
        Self {
            poll_interval: cfg.poll_interval,
            refresh_every: cfg.contract_refresh_every,
            token_retention: cfg.token_retention,
        }
    }
}

/// What a single tick did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    /// Stored contract is recent enough.
    UpToDate,
    /// A cycle ran; `None` when nothing traded.
    Refreshed(Option<String>),
    /// The cycle could not run.
    Failed,
}

pub struct RefreshScheduler {
    service: Arc<ActiveContractService>,
    tokens: Arc<CachedTokenProvider>,
    settings: SchedulerSettings,

    started: AtomicBool,
    shutdown_tx: watch::Sender<bool>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl RefreshScheduler {
    pub fn new(
        service: Arc<ActiveContractService>,
        tokens: Arc<CachedTokenProvider>,
        settings: SchedulerSettings,
    ) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            service,
            tokens,
            settings,
            started: AtomicBool::new(false),
            shutdown_tx,
            handle: Mutex::new(None),
        }
    }

    pub fn is_running(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    /// Spawns the loop. Returns `false` if it was already started.
    pub fn start(self: &Arc<Self>) -> bool {
        if self
            .started
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("refresh scheduler already running");
            return false;
        }

        let shutdown_rx = self.shutdown_tx.subscribe();
        let this = Arc::clone(self);
        let handle = tokio::spawn(this.run(shutdown_rx));
        *self.handle.lock() = Some(handle);

        info!(
            poll_secs = self.settings.poll_interval.as_secs(),
            refresh_hours = self.settings.refresh_every.num_hours(),
            "refresh scheduler started"
        );
        true
    }

    /// Signals the loop to stop and waits for the current tick to finish.
    pub async fn shutdown(&self) {
        // send_replace does not fail when the receiver is already gone.
        self.shutdown_tx.send_replace(true);

        let handle = self.handle.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!(error = ?e, "refresh scheduler task panicked");
            }
            info!("refresh scheduler stopped");
        }
    }

    async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.settings.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.tick_at(Utc::now()).await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
    }

    /// One pass of maintenance + refresh.
    #[instrument(skip(self, now), target = "scheduler")]
    pub async fn tick_at(&self, now: DateTime<Utc>) -> TickOutcome {
        if let Err(e) = self.tokens.prune(now, self.settings.token_retention).await {
            warn!(error = ?e, "token pruning failed");
        }

        let due = match self.service.stored_contract().await {
            Ok(Some(c)) => {
                let age = c.age(now);
                debug!(symbol = %c.symbol, age_mins = age.num_minutes(), "stored contract age");
                age >= self.settings.refresh_every
            }
            Ok(None) => true,
            Err(e) => {
                // Unknown age; refreshing is the safe side.
                warn!(error = ?e, "could not read stored contract");
                true
            }
        };

        if !due {
            return TickOutcome::UpToDate;
        }

        match self.service.refresh_active_contract_at(now).await {
            Ok(selected) => TickOutcome::Refreshed(selected.map(|c| c.symbol)),
            Err(e) => {
                error!(error = %e, "scheduled refresh failed");
                TickOutcome::Failed
            }
        }
    }
}
