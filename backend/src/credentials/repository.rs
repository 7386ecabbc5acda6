use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredToken {
    pub access_token: String,
    pub created_at: DateTime<Utc>,
}

impl StoredToken {
    pub fn is_valid(&self, now: DateTime<Utc>, validity: chrono::Duration) -> bool {
        now - self.created_at < validity
    }
}

#[async_trait]
pub trait TokenRepository: Send + Sync {
    /// Most recently created token, regardless of age.
    async fn latest(&self) -> Result<Option<StoredToken>>;

    async fn insert(&self, token: &StoredToken) -> Result<()>;

    /// Delete tokens created strictly before `cutoff`.
    async fn prune_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64>;
}
