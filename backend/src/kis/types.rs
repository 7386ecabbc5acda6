use std::str::FromStr;

use contracts::ContractMarketSnapshot;
use serde::{Deserialize, Serialize};

use crate::kis::errors::KisError;

/// Result code the brokerage uses for success.
pub const RT_CD_OK: &str = "0";

#[derive(Debug, Serialize)]
pub struct TokenRequest<'a> {
    pub grant_type: &'a str,
    pub appkey: &'a str,
    pub appsecret: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
}

/// Envelope of the futures/options price inquiry.
#[derive(Debug, Deserialize)]
pub struct PriceEnvelope {
    pub rt_cd: String,
    #[serde(default)]
    pub msg_cd: String,
    #[serde(default)]
    pub msg1: String,
    #[serde(default)]
    pub output1: Option<PriceOutput>,
}

/// Quote fields, all delivered as strings.
#[derive(Debug, Default, Deserialize)]
pub struct PriceOutput {
    /// Current futures price.
    #[serde(default)]
    pub futs_prpr: String,
    /// Accumulated volume.
    #[serde(default)]
    pub acml_vol: String,
    /// Open interest.
    #[serde(default)]
    pub hts_otst_stpl_qty: String,
    /// Change rate versus previous day (%).
    #[serde(default)]
    pub futs_prdy_ctrt: String,
    #[serde(default)]
    pub futs_hgpr: String,
    #[serde(default)]
    pub futs_lwpr: String,
}

impl PriceEnvelope {
    /// Checks the result code and converts the payload to a typed snapshot.
    ///
    /// Volume is not checked here; a zero-volume snapshot is still returned.
    pub fn into_snapshot(self, symbol: &str) -> Result<ContractMarketSnapshot, KisError> {
        if self.rt_cd != RT_CD_OK {
            return Err(KisError::Rejected {
                code: self.rt_cd,
                msg_code: self.msg_cd,
                message: self.msg1,
            });
        }

        let output = self.output1.ok_or(KisError::MissingOutput)?;
        output.into_snapshot(symbol)
    }
}

impl PriceOutput {
    pub fn into_snapshot(self, symbol: &str) -> Result<ContractMarketSnapshot, KisError> {
        Ok(ContractMarketSnapshot {
            symbol: symbol.to_string(),
            current_price: number("futs_prpr", &self.futs_prpr)?,
            volume: number("acml_vol", &self.acml_vol)?,
            open_interest: number("hts_otst_stpl_qty", &self.hts_otst_stpl_qty)?,
            change_rate: number("futs_prdy_ctrt", &self.futs_prdy_ctrt)?,
            high: number("futs_hgpr", &self.futs_hgpr)?,
            low: number("futs_lwpr", &self.futs_lwpr)?,
        })
    }
}

/// Blank fields read as zero; anything else must parse.
fn number<T>(field: &'static str, raw: &str) -> Result<T, KisError>
where
    T: FromStr + Default,
{
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(T::default());
    }
    trimmed.parse().map_err(|_| KisError::InvalidNumber {
        field,
        value: raw.to_string(),
    })
}
