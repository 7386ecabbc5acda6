pub mod active_contract;
pub mod app;
pub mod config;
pub mod credentials;
pub mod db;
pub mod fetcher;
pub mod kis;
pub mod metrics;
pub mod scheduler;
pub mod selector;
pub mod service;

pub mod error;
pub mod logger;
pub mod time;
