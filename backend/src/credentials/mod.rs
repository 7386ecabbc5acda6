pub mod provider;
pub mod repository;
pub mod repository_sqlx;

pub use provider::{CachedTokenProvider, TokenProvider};
pub use repository::{StoredToken, TokenRepository};
pub use repository_sqlx::SqlxTokenRepository;
