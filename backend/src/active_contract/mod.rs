pub mod repository;
pub mod repository_sqlx;
pub mod store;

pub use repository::ActiveContractRepository;
pub use repository_sqlx::SqlxActiveContractRepository;
pub use store::{ActiveContractStore, SaveOutcome};
