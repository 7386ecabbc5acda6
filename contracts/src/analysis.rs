//! Rule-based read of a single contract snapshot.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::ContractMarketSnapshot;

const ACTIVE_VOLUME: u64 = 10_000;
const MODERATE_VOLUME: u64 = 5_000;
const STRONG_MOVE_PCT: Decimal = Decimal::TWO;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketActivity {
    Active,
    Moderate,
    Sluggish,
}

impl MarketActivity {
    pub fn from_volume(volume: u64) -> Self {
        if volume > ACTIVE_VOLUME {
            Self::Active
        } else if volume > MODERATE_VOLUME {
            Self::Moderate
        } else {
            Self::Sluggish
        }
    }

    pub fn score(self) -> u8 {
        match self {
            Self::Active => 80,
            Self::Moderate => 60,
            Self::Sluggish => 40,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceTrend {
    StrongUp,
    Up,
    Flat,
    Down,
    StrongDown,
}

impl PriceTrend {
    pub fn from_change_rate(change_rate: Decimal) -> Self {
        if change_rate > STRONG_MOVE_PCT {
            Self::StrongUp
        } else if change_rate > Decimal::ZERO {
            Self::Up
        } else if change_rate < -STRONG_MOVE_PCT {
            Self::StrongDown
        } else if change_rate < Decimal::ZERO {
            Self::Down
        } else {
            Self::Flat
        }
    }

    pub fn score(self) -> u8 {
        match self {
            Self::StrongUp => 80,
            Self::Up => 60,
            Self::Flat => 50,
            Self::Down => 40,
            Self::StrongDown => 20,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketAnalysis {
    pub symbol: String,
    pub activity: MarketActivity,
    pub activity_score: u8,
    pub price_trend: PriceTrend,
    pub trend_score: u8,
    pub combined_score: u8,
    pub liquidity_score: Decimal,
}

pub fn analyze(snapshot: &ContractMarketSnapshot) -> MarketAnalysis {
    let activity = MarketActivity::from_volume(snapshot.volume);
    let price_trend = PriceTrend::from_change_rate(snapshot.change_rate);
    let activity_score = activity.score();
    let trend_score = price_trend.score();

    MarketAnalysis {
        symbol: snapshot.symbol.clone(),
        activity,
        activity_score,
        price_trend,
        trend_score,
        combined_score: ((activity_score as u16 + trend_score as u16) / 2) as u8,
        liquidity_score: liquidity_score(snapshot.volume, snapshot.open_interest),
    }
}

/// 0-100: half from volume (per 1,000 lots), half from open interest (per 10,000).
pub fn liquidity_score(volume: u64, open_interest: u64) -> Decimal {
    let cap = Decimal::from(50);
    let volume_part = (Decimal::from(volume) / Decimal::from(1_000)).min(cap);
    let oi_part = (Decimal::from(open_interest) / Decimal::from(10_000)).min(cap);
    (volume_part + oi_part).round_dp(1)
}
