use thiserror::Error;

use crate::kis::KisError;

/// Failure to obtain a brokerage access token.
#[derive(Error, Debug)]
pub enum CredentialError {
    #[error("token issuance failed: {0}")]
    Issue(#[from] KisError),

    #[error("token endpoint returned no access token")]
    EmptyToken,
}

/// Why a single candidate contributed no snapshot.
///
/// Never propagated past the fetcher; every variant means "no data".
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("quote request timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("quote request failed: {0}")]
    Client(#[from] KisError),

    #[error("contract not traded (zero volume)")]
    ZeroVolume,
}

/// A refresh cycle that could not run at all.
#[derive(Error, Debug)]
pub enum CycleError {
    #[error("credentials unavailable: {0}")]
    Credentials(#[from] CredentialError),

    #[error("no candidate contracts generated for {0}")]
    NoCandidates(chrono::NaiveDate),
}
