use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// An upcoming contract month eligible for evaluation.
///
/// Generated fresh on every selection cycle and never persisted on its own.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractCandidate {
    /// Instrument prefix + year letter + zero-padded month, e.g. `101X04`.
    pub symbol: String,
    pub expiry_year: i32,
    pub expiry_month: u32,
    /// First calendar day of the expiry month.
    pub expiry_date: NaiveDate,
    pub description: String,
}

/// Point-in-time trading statistics for one contract.
///
/// A snapshot is tradeable only with `volume > 0`; zero-volume quotes are
/// discarded as "no data", never treated as a contract priced at zero.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractMarketSnapshot {
    pub symbol: String,
    pub current_price: Decimal,
    pub volume: u64,
    pub open_interest: u64,
    /// Signed percentage change versus the previous session.
    pub change_rate: Decimal,
    pub high: Decimal,
    pub low: Decimal,
}

impl ContractMarketSnapshot {
    pub fn is_tradeable(&self) -> bool {
        self.volume > 0
    }
}

/// The contract month currently treated as representative of the market.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveContract {
    pub symbol: String,
    pub description: String,
    pub current_price: Decimal,
    pub volume: u64,
    pub open_interest: u64,
    pub change_rate: Decimal,
    pub expiry_year: i32,
    pub expiry_month: u32,
    pub updated_at: DateTime<Utc>,
}

impl ActiveContract {
    /// Merges a candidate's descriptive fields with its snapshot's market fields.
    pub fn from_parts(
        candidate: &ContractCandidate,
        snapshot: &ContractMarketSnapshot,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            symbol: candidate.symbol.clone(),
            description: candidate.description.clone(),
            current_price: snapshot.current_price,
            volume: snapshot.volume,
            open_interest: snapshot.open_interest,
            change_rate: snapshot.change_rate,
            expiry_year: candidate.expiry_year,
            expiry_month: candidate.expiry_month,
            updated_at,
        }
    }

    /// First day of the expiry month, if the stored year/month are valid.
    pub fn expiry_date(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.expiry_year, self.expiry_month, 1)
    }

    /// Whole days from `today` until the expiry month starts. Negative once passed.
    pub fn days_until_expiry(&self, today: NaiveDate) -> Option<i64> {
        self.expiry_date()
            .map(|expiry| expiry.signed_duration_since(today).num_days())
    }

    pub fn is_expiring_soon(&self, today: NaiveDate, within_days: i64) -> bool {
        self.days_until_expiry(today)
            .is_some_and(|days| days <= within_days)
    }

    /// Age of the row relative to `now`.
    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.updated_at
    }

    pub fn is_fresh(&self, now: DateTime<Utc>, threshold: chrono::Duration) -> bool {
        self.age(now) < threshold
    }
}

/// Whether a stored contract is within the freshness threshold.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Freshness {
    Fresh,
    Stale,
}

/// A stored contract together with its freshness at read time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentContract {
    pub contract: ActiveContract,
    pub freshness: Freshness,
}

impl CurrentContract {
    pub fn is_stale(&self) -> bool {
        self.freshness == Freshness::Stale
    }

    /// Drops the contract unless it is fresh.
    pub fn fresh(self) -> Option<ActiveContract> {
        match self.freshness {
            Freshness::Fresh => Some(self.contract),
            Freshness::Stale => None,
        }
    }
}

pub(crate) fn month_label(year: i32, month: u32) -> String {
    let name = NaiveDate::from_ymd_opt(year, month, 1)
        .map(|d| d.format("%b").to_string())
        .unwrap_or_else(|| format!("M{month:02}"));
    format!("{name} {year} contract")
}
