use std::time::Duration;

use async_trait::async_trait;
use contracts::ContractMarketSnapshot;
use reqwest::Client;
use tracing::{debug, instrument};

use crate::config::KisConfig;
use crate::kis::errors::KisError;
use crate::kis::types::{PriceEnvelope, TokenRequest, TokenResponse};
use crate::kis::{QuoteApi, TokenIssuer};

const TOKEN_PATH: &str = "/oauth2/tokenP";
const PRICE_PATH: &str = "/uapi/domestic-futureoption/v1/quotations/inquire-price";

/// HTTP client for the brokerage token and quote endpoints.
#[derive(Clone)]
pub struct KisClient {
    http: Client,
    cfg: KisConfig,
}

impl KisClient {
    pub fn new(cfg: KisConfig, timeout: Duration) -> Result<Self, KisError> {
        let http = Client::builder()
            .timeout(timeout)
            .pool_idle_timeout(Duration::from_secs(30))
            .tcp_keepalive(Duration::from_secs(30))
            .build()?;

        Ok(Self { http, cfg })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.cfg.base_url.trim_end_matches('/'), path)
    }
}

#[async_trait]
impl TokenIssuer for KisClient {
    #[instrument(skip(self), level = "debug")]
    async fn issue_token(&self) -> Result<TokenResponse, KisError> {
        let body = TokenRequest {
            grant_type: "client_credentials",
            appkey: &self.cfg.app_key,
            appsecret: &self.cfg.app_secret,
        };

        let resp = self
            .http
            .post(self.url(TOKEN_PATH))
            .json(&body)
            .send()
            .await?
            .error_for_status()?;

        let token: TokenResponse = resp.json().await?;

        debug!(expires_in = ?token.expires_in, "brokerage token issued");

        Ok(token)
    }
}

#[async_trait]
impl QuoteApi for KisClient {
    #[instrument(
        skip(self, token),
        fields(symbol = %symbol),
        level = "debug"
    )]
    async fn inquire_price(
        &self,
        token: &str,
        symbol: &str,
    ) -> Result<ContractMarketSnapshot, KisError> {
        let resp = self
            .http
            .get(self.url(PRICE_PATH))
            .bearer_auth(token)
            .header("appkey", &self.cfg.app_key)
            .header("appsecret", &self.cfg.app_secret)
            .header("tr_id", &self.cfg.tr_id)
            .header("custtype", &self.cfg.cust_type)
            .query(&[
                ("FID_COND_MRKT_DIV_CODE", self.cfg.market_div_code.as_str()),
                ("FID_INPUT_ISCD", symbol),
            ])
            .send()
            .await?
            .error_for_status()?;

        let envelope: PriceEnvelope = resp.json().await?;

        debug!(
            rt_cd = %envelope.rt_cd,
            msg_cd = %envelope.msg_cd,
            has_output = envelope.output1.is_some(),
            "price inquiry answered"
        );

        envelope.into_snapshot(symbol)
    }
}
