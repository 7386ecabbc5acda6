pub mod client;
pub mod errors;
pub mod types;

use async_trait::async_trait;
use contracts::ContractMarketSnapshot;

pub use client::KisClient;
pub use errors::KisError;
pub use types::*;

/// Issues new brokerage access tokens.
#[async_trait]
pub trait TokenIssuer: Send + Sync {
    async fn issue_token(&self) -> Result<TokenResponse, KisError>;
}

/// Price inquiry for a single futures symbol.
///
/// Returns the parsed snapshot as delivered, including zero-volume quotes.
#[async_trait]
pub trait QuoteApi: Send + Sync {
    async fn inquire_price(
        &self,
        token: &str,
        symbol: &str,
    ) -> Result<ContractMarketSnapshot, KisError>;
}
