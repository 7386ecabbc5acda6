use std::str::FromStr;

use anyhow::{Context, anyhow};
use async_trait::async_trait;
use contracts::ActiveContract;
use rust_decimal::Decimal;
use sqlx::{AnyPool, Row};
use uuid::Uuid;

use crate::active_contract::repository::ActiveContractRepository;
use crate::time::{from_ms, to_ms};

/// SQLx-backed implementation of ActiveContractRepository.
/// Responsible only for persistence and row mapping.
pub struct SqlxActiveContractRepository {
    pool: AnyPool,
}

impl SqlxActiveContractRepository {
    pub fn new(pool: AnyPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ActiveContractRepository for SqlxActiveContractRepository {
    async fn latest(&self) -> anyhow::Result<Option<ActiveContract>> {
        let row = sqlx::query(
            r#"
SELECT
  symbol, description, current_price,
  volume, open_interest, change_rate,
  expiry_year, expiry_month, updated_at_ms
FROM active_contracts
ORDER BY updated_at_ms DESC
LIMIT 1;
"#,
        )
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(r) => Ok(Some(row_to_contract(&r)?)),
            None => Ok(None),
        }
    }

    async fn upsert(&self, contract: &ActiveContract) -> anyhow::Result<()> {
        sqlx::query(
            r#"
INSERT INTO active_contracts (
  id, symbol, description, current_price,
  volume, open_interest, change_rate,
  expiry_year, expiry_month, updated_at_ms
)
VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
ON CONFLICT(symbol) DO UPDATE SET
  description = excluded.description,
  current_price = excluded.current_price,
  volume = excluded.volume,
  open_interest = excluded.open_interest,
  change_rate = excluded.change_rate,
  expiry_year = excluded.expiry_year,
  expiry_month = excluded.expiry_month,
  updated_at_ms = excluded.updated_at_ms;
"#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(contract.symbol.clone())
        .bind(contract.description.clone())
        .bind(contract.current_price.to_string())
        .bind(u64_to_i64(contract.volume)?)
        .bind(u64_to_i64(contract.open_interest)?)
        .bind(contract.change_rate.to_string())
        .bind(contract.expiry_year as i64)
        .bind(contract.expiry_month as i64)
        .bind(to_ms(contract.updated_at))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn insert(&self, contract: &ActiveContract) -> anyhow::Result<()> {
        sqlx::query(
            r#"
INSERT INTO active_contracts (
  id, symbol, description, current_price,
  volume, open_interest, change_rate,
  expiry_year, expiry_month, updated_at_ms
)
VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?);
"#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(contract.symbol.clone())
        .bind(contract.description.clone())
        .bind(contract.current_price.to_string())
        .bind(u64_to_i64(contract.volume)?)
        .bind(u64_to_i64(contract.open_interest)?)
        .bind(contract.change_rate.to_string())
        .bind(contract.expiry_year as i64)
        .bind(contract.expiry_month as i64)
        .bind(to_ms(contract.updated_at))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn prune_symbol(&self, symbol: &str) -> anyhow::Result<u64> {
        let res = sqlx::query(
            r#"
DELETE FROM active_contracts
WHERE symbol = ?
  AND id <> (
    SELECT id FROM active_contracts
    WHERE symbol = ?
    ORDER BY updated_at_ms DESC
    LIMIT 1
  );
"#,
        )
        .bind(symbol.to_string())
        .bind(symbol.to_string())
        .execute(&self.pool)
        .await?;

        Ok(res.rows_affected())
    }
}

/* =========================
Row mapping + conversions
========================= */

fn row_to_contract(r: &sqlx::any::AnyRow) -> anyhow::Result<ActiveContract> {
    let price: String = r.get("current_price");
    let change_rate: String = r.get("change_rate");

    Ok(ActiveContract {
        symbol: r.get::<String, _>("symbol"),
        description: r.get::<String, _>("description"),
        current_price: Decimal::from_str(&price).context("invalid current_price")?,
        volume: i64_to_u64(r.get("volume"))?,
        open_interest: i64_to_u64(r.get("open_interest"))?,
        change_rate: Decimal::from_str(&change_rate).context("invalid change_rate")?,
        expiry_year: i32::try_from(r.get::<i64, _>("expiry_year")).context("invalid expiry_year")?,
        expiry_month: i64_to_month(r.get("expiry_month"))?,
        updated_at: from_ms(r.get("updated_at_ms"))?,
    })
}

/* =========================
Numeric safety helpers
========================= */

fn i64_to_u64(v: i64) -> anyhow::Result<u64> {
    if v < 0 {
        return Err(anyhow!("negative i64 where u64 expected: {v}"));
    }
    Ok(v as u64)
}

fn u64_to_i64(v: u64) -> anyhow::Result<i64> {
    if v > i64::MAX as u64 {
        return Err(anyhow!("u64 too large for i64: {v}"));
    }
    Ok(v as i64)
}

fn i64_to_month(v: i64) -> anyhow::Result<u32> {
    if !(1..=12).contains(&v) {
        return Err(anyhow!("month out of range: {v}"));
    }
    Ok(v as u32)
}
