use anyhow::Result;
use async_trait::async_trait;
use contracts::ActiveContract;

#[async_trait]
pub trait ActiveContractRepository: Send + Sync {
    /// Row with the greatest `updated_at`, regardless of age.
    async fn latest(&self) -> Result<Option<ActiveContract>>;

    /// Insert or replace the row for `contract.symbol`.
    async fn upsert(&self, contract: &ActiveContract) -> Result<()>;

    /// Append a new row without touching existing ones.
    async fn insert(&self, contract: &ActiveContract) -> Result<()>;

    /// Delete every row for `symbol` except the most recent one.
    async fn prune_symbol(&self, symbol: &str) -> Result<u64>;
}
