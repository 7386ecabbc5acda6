use sqlx::AnyPool;

pub async fn migrate(pool: &AnyPool) -> anyhow::Result<()> {
    // Active contracts: one row per symbol, latest updated_at_ms is authoritative.
    sqlx::query(
        r#"
CREATE TABLE IF NOT EXISTS active_contracts (
  id TEXT PRIMARY KEY,
  symbol TEXT NOT NULL,
  description TEXT NOT NULL,
  current_price TEXT NOT NULL,
  volume BIGINT NOT NULL,
  open_interest BIGINT NOT NULL,
  change_rate TEXT NOT NULL,
  expiry_year BIGINT NOT NULL,
  expiry_month BIGINT NOT NULL,
  updated_at_ms BIGINT NOT NULL
);
"#,
    )
    .execute(pool)
    .await?;

    // Brokerage tokens
    sqlx::query(
        r#"
CREATE TABLE IF NOT EXISTS kis_tokens (
  id TEXT PRIMARY KEY,
  access_token TEXT NOT NULL,
  created_at_ms BIGINT NOT NULL
);
"#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"CREATE UNIQUE INDEX IF NOT EXISTS idx_active_contracts_symbol ON active_contracts(symbol);"#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"CREATE INDEX IF NOT EXISTS idx_active_contracts_updated ON active_contracts(updated_at_ms);"#,
    )
    .execute(pool)
    .await?;

    sqlx::query(r#"CREATE INDEX IF NOT EXISTS idx_kis_tokens_created ON kis_tokens(created_at_ms);"#)
        .execute(pool)
        .await?;

    Ok(())
}
