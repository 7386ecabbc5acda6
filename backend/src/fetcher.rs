//! Contract Data Fetcher
//!
//! One bounded quote request per symbol. Every failure mode (network error,
//! non-success status, rejected result code, malformed body, timeout, zero
//! volume) collapses to "no data" for that candidate only.

use std::sync::Arc;
use std::time::Duration;

use contracts::ContractMarketSnapshot;
use tracing::{debug, instrument, warn};

use crate::error::FetchError;
use crate::kis::QuoteApi;

#[derive(Clone)]
pub struct ContractFetcher {
    api: Arc<dyn QuoteApi>,
    timeout: Duration,
}

impl ContractFetcher {
    pub fn new(api: Arc<dyn QuoteApi>, timeout: Duration) -> Self {
        Self { api, timeout }
    }

    /// Tradeable snapshot for `symbol`, or the reason there is none.
    pub async fn try_fetch(
        &self,
        token: &str,
        symbol: &str,
    ) -> Result<ContractMarketSnapshot, FetchError> {
        let snapshot = tokio::time::timeout(self.timeout, self.api.inquire_price(token, symbol))
            .await
            .map_err(|_| FetchError::Timeout(self.timeout))??;

        if !snapshot.is_tradeable() {
            return Err(FetchError::ZeroVolume);
        }

        Ok(snapshot)
    }

    /// Tradeable snapshot for `symbol`, or `None`.
    #[instrument(skip(self, token), target = "fetcher", fields(symbol = %symbol))]
    pub async fn fetch_snapshot(&self, token: &str, symbol: &str) -> Option<ContractMarketSnapshot> {
        match self.try_fetch(token, symbol).await {
            Ok(s) => {
                debug!(volume = s.volume, open_interest = s.open_interest, "snapshot fetched");
                Some(s)
            }
            Err(FetchError::ZeroVolume) => {
                debug!("contract not traded; skipping");
                None
            }
            Err(e) => {
                warn!(error = %e, "snapshot unavailable");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kis::KisError;
    use async_trait::async_trait;
    use rust_decimal_macros::dec;

    enum Behaviour {
        Volume(u64),
        Rejected,
        Hang,
    }

    struct StubApi(Behaviour);

    #[async_trait]
    impl QuoteApi for StubApi {
        async fn inquire_price(
            &self,
            _token: &str,
            symbol: &str,
        ) -> Result<ContractMarketSnapshot, KisError> {
            match self.0 {
                Behaviour::Volume(volume) => Ok(ContractMarketSnapshot {
                    symbol: symbol.into(),
                    current_price: if volume == 0 { dec!(0) } else { dec!(142000) },
                    volume,
                    open_interest: 10,
                    change_rate: dec!(0.1),
                    high: dec!(142100),
                    low: dec!(141900),
                }),
                Behaviour::Rejected => Err(KisError::Rejected {
                    code: "1".into(),
                    msg_code: "EGW00201".into(),
                    message: "no such symbol".into(),
                }),
                Behaviour::Hang => {
                    tokio::time::sleep(Duration::from_secs(3_600)).await;
                    Err(KisError::MissingOutput)
                }
            }
        }
    }

    fn fetcher(b: Behaviour) -> ContractFetcher {
        ContractFetcher::new(Arc::new(StubApi(b)), Duration::from_secs(5))
    }

    #[tokio::test]
    async fn traded_contract_yields_snapshot() {
        let s = fetcher(Behaviour::Volume(12_000))
            .fetch_snapshot("tok", "101X04")
            .await
            .unwrap();
        assert_eq!(s.volume, 12_000);
    }

    #[tokio::test]
    async fn zero_volume_is_indistinguishable_from_not_found() {
        let f = fetcher(Behaviour::Volume(0));
        assert!(f.fetch_snapshot("tok", "101X02").await.is_none());
        assert!(matches!(
            f.try_fetch("tok", "101X02").await,
            Err(FetchError::ZeroVolume)
        ));
    }

    #[tokio::test]
    async fn rejected_request_yields_none() {
        assert!(
            fetcher(Behaviour::Rejected)
                .fetch_snapshot("tok", "101X04")
                .await
                .is_none()
        );
    }

    #[tokio::test(start_paused = true)]
    async fn hung_request_times_out() {
        let f = fetcher(Behaviour::Hang);
        assert!(matches!(
            f.try_fetch("tok", "101X04").await,
            Err(FetchError::Timeout(_))
        ));
    }
}
