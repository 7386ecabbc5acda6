use std::str::FromStr;
use std::time::Duration;

use contracts::CandidatePolicy;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },

    #[error("invalid candidate policy: {0}")]
    Policy(#[from] contracts::PolicyError),
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    /// Database connection string.
    pub database_url: String,

    /// Emit JSON logs instead of the pretty formatter.
    pub json_logs: bool,

    // =========================
    // Brokerage configuration
    // =========================
    pub kis: KisConfig,

    // =========================
    // Contract selection
    // =========================
    /// Instrument prefix + year encoding used to build candidate symbols.
    pub candidate_policy: CandidatePolicy,

    /// Per-candidate quote timeout.
    ///
    /// One unreachable contract must not stall the cycle, so every fetch is
    /// bounded individually.
    pub fetch_timeout: Duration,

    /// Wall-clock budget for one whole selection cycle.
    ///
    /// When exceeded, outstanding fetches are abandoned and selection proceeds
    /// with whatever snapshots already arrived.
    pub cycle_budget: Duration,

    // =========================
    // Freshness + scheduling
    // =========================
    /// A stored active contract older than this is stale.
    pub contract_freshness: chrono::Duration,

    /// Minimum age of the stored contract before the background loop re-selects.
    pub contract_refresh_every: chrono::Duration,

    /// Tick interval of the background loop.
    pub poll_interval: Duration,

    /// Cached brokerage tokens are reused while younger than this.
    pub token_validity: chrono::Duration,

    /// Persisted tokens older than this are pruned.
    pub token_retention: chrono::Duration,
}

#[derive(Clone, Debug)]
pub struct KisConfig {
    pub base_url: String,
    pub app_key: String,
    pub app_secret: String,
    /// `FID_COND_MRKT_DIV_CODE` query parameter.
    pub market_div_code: String,
    /// `tr_id` header of the price inquiry.
    pub tr_id: String,
    /// `custtype` header (P = individual).
    pub cust_type: String,
}

impl KisConfig {
    pub const DEFAULT_BASE_URL: &'static str = "https://openapi.koreainvestment.com:9443";
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url =
            std::env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://goldwatch_dev.db".to_string());

        let kis = KisConfig {
            base_url: env_or("KIS_BASE_URL", KisConfig::DEFAULT_BASE_URL),
            app_key: required("KIS_APP_KEY")?,
            app_secret: required("KIS_APP_SECRET")?,
            market_div_code: env_or("KIS_MARKET_DIV_CODE", "F"),
            tr_id: env_or("KIS_TR_ID", "FHMIF10000000"),
            cust_type: env_or("KIS_CUST_TYPE", "P"),
        };

        let prefix = env_or("CONTRACT_PREFIX", contracts::candidates::DEFAULT_PREFIX);
        let base_year: i32 = parsed("CONTRACT_BASE_YEAR", contracts::candidates::DEFAULT_BASE_YEAR)?;
        let candidate_policy = CandidatePolicy::new(
            prefix,
            base_year,
            contracts::candidates::DEFAULT_BASE_LETTER,
            contracts::candidates::DEFAULT_MAJOR_MONTHS.to_vec(),
            contracts::candidates::DEFAULT_MAX_CANDIDATES,
            contracts::candidates::DEFAULT_HORIZON_YEARS,
        )?;

        Ok(Self {
            database_url,
            json_logs: std::env::var("APP_ENV").unwrap_or_default() == "production",
            kis,
            candidate_policy,

            // Fetch defaults:
            // - a few seconds per quote
            // - the cycle as a whole stays well under a poll interval
            fetch_timeout: Duration::from_millis(parsed("FETCH_TIMEOUT_MS", 5_000)?),
            cycle_budget: Duration::from_millis(parsed("CYCLE_BUDGET_MS", 20_000)?),

            contract_freshness: chrono::Duration::hours(parsed("CONTRACT_FRESHNESS_HOURS", 24)?),
            contract_refresh_every: chrono::Duration::hours(parsed("CONTRACT_REFRESH_HOURS", 24)?),
            poll_interval: Duration::from_secs(parsed("POLL_INTERVAL_SECS", 600)?),
            token_validity: chrono::Duration::hours(parsed("TOKEN_VALIDITY_HOURS", 23)?),
            token_retention: chrono::Duration::days(1),
        })
    }
}

fn required(key: &'static str) -> Result<String, ConfigError> {
    match std::env::var(key) {
        Ok(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ConfigError::Missing(key)),
    }
}

fn env_or(key: &'static str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parsed<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value: raw }),
        Err(_) => Ok(default),
    }
}
