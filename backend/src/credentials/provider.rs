use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::credentials::repository::{StoredToken, TokenRepository};
use crate::error::CredentialError;
use crate::kis::TokenIssuer;

/// Source of a bearer token for the quote endpoint.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn get_token(&self) -> Result<String, CredentialError>;
}

/// Cache-or-fetch token provider.
///
/// Lookup order: in-memory token, latest persisted token, newly issued token.
/// Tokens are reused while younger than `validity`. The lock is held across
/// issuance so concurrent callers never issue twice.
pub struct CachedTokenProvider {
    issuer: Arc<dyn TokenIssuer>,
    repo: Arc<dyn TokenRepository>,
    validity: chrono::Duration,
    cached: Mutex<Option<StoredToken>>,
}

impl CachedTokenProvider {
    pub fn new(
        issuer: Arc<dyn TokenIssuer>,
        repo: Arc<dyn TokenRepository>,
        validity: chrono::Duration,
    ) -> Self {
        Self {
            issuer,
            repo,
            validity,
            cached: Mutex::new(None),
        }
    }

    #[instrument(skip(self), target = "credentials")]
    pub async fn token_at(&self, now: DateTime<Utc>) -> Result<String, CredentialError> {
        let mut cached = self.cached.lock().await;

        if let Some(t) = cached.as_ref().filter(|t| t.is_valid(now, self.validity)) {
            return Ok(t.access_token.clone());
        }

        match self.repo.latest().await {
            Ok(Some(t)) if t.is_valid(now, self.validity) => {
                debug!("reusing persisted token");
                let token = t.access_token.clone();
                *cached = Some(t);
                return Ok(token);
            }
            Ok(_) => debug!("no valid persisted token"),
            Err(e) => warn!(error = ?e, "token cache lookup failed; issuing a new token"),
        }

        let issued = self.issuer.issue_token().await?;
        let access_token = issued
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or(CredentialError::EmptyToken)?;

        let stored = StoredToken {
            access_token: access_token.clone(),
            created_at: now,
        };

        if let Err(e) = self.repo.insert(&stored).await {
            warn!(error = ?e, "failed to persist new token; using it uncached");
        } else {
            info!("new brokerage token issued and cached");
        }

        *cached = Some(stored);
        Ok(access_token)
    }

    /// Removes persisted tokens older than `retention`.
    pub async fn prune(&self, now: DateTime<Utc>, retention: chrono::Duration) -> anyhow::Result<u64> {
        let pruned = self.repo.prune_older_than(now - retention).await?;
        if pruned > 0 {
            debug!(pruned, "old tokens removed");
        }
        Ok(pruned)
    }
}

#[async_trait]
impl TokenProvider for CachedTokenProvider {
    async fn get_token(&self) -> Result<String, CredentialError> {
        self.token_at(Utc::now()).await
    }
}
