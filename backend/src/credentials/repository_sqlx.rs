use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{AnyPool, Row};
use uuid::Uuid;

use crate::credentials::repository::{StoredToken, TokenRepository};
use crate::time::{from_ms, to_ms};

pub struct SqlxTokenRepository {
    pool: AnyPool,
}

impl SqlxTokenRepository {
    pub fn new(pool: AnyPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TokenRepository for SqlxTokenRepository {
    async fn latest(&self) -> anyhow::Result<Option<StoredToken>> {
        let row = sqlx::query(
            r#"
SELECT access_token, created_at_ms
FROM kis_tokens
ORDER BY created_at_ms DESC
LIMIT 1;
"#,
        )
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(r) => Ok(Some(StoredToken {
                access_token: r.get::<String, _>("access_token"),
                created_at: from_ms(r.get("created_at_ms"))?,
            })),
            None => Ok(None),
        }
    }

    async fn insert(&self, token: &StoredToken) -> anyhow::Result<()> {
        sqlx::query(r#"INSERT INTO kis_tokens (id, access_token, created_at_ms) VALUES (?, ?, ?);"#)
            .bind(Uuid::new_v4().to_string())
            .bind(token.access_token.clone())
            .bind(to_ms(token.created_at))
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn prune_older_than(&self, cutoff: DateTime<Utc>) -> anyhow::Result<u64> {
        let res = sqlx::query(r#"DELETE FROM kis_tokens WHERE created_at_ms < ?;"#)
            .bind(to_ms(cutoff))
            .execute(&self.pool)
            .await?;

        Ok(res.rows_affected())
    }
}
