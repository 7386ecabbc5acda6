use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Minimal counters for operational visibility.
#[derive(Clone, Default)]
pub struct Counters {
    pub refresh_cycles: Arc<AtomicU64>,
    pub refresh_selected: Arc<AtomicU64>,

    // outcomes that keep the previous contract
    pub refresh_empty: Arc<AtomicU64>,
    pub refresh_failed: Arc<AtomicU64>,
    pub persist_failed: Arc<AtomicU64>,

    // per-candidate fetches
    pub snapshots_fetched: Arc<AtomicU64>,
    pub snapshots_missing: Arc<AtomicU64>,
    pub snapshots_abandoned: Arc<AtomicU64>,
}

impl Counters {
    pub fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add(counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    pub fn get(counter: &AtomicU64) -> u64 {
        counter.load(Ordering::Relaxed)
    }
}
