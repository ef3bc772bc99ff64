// Core modules
pub mod api;
pub mod config;
pub mod error;
pub mod execution;
pub mod indicators;
pub mod models;
pub mod notify;
pub mod strategy;
pub mod trendline;
pub mod watcher;

// Re-export commonly used types
pub use api::{CandleQuery, Exchange, OkxClient, RetryPolicy};
pub use config::{InstrumentConfig, Settings, StrategyConfig};
pub use error::BotError;
pub use models::*;
pub use notify::Notifier;
pub use strategy::Strategy;

// Error handling
pub type Result<T> = std::result::Result<T, BotError>;
