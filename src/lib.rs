//! Telegram Account Cleaner Library
//!
//! This library provides tools to:
//! - Find bots that no longer answer and unsubscribe from them
//! - Find deleted accounts in the dialog list and delete those chats
//! - Keep bulk remote calls under the server's rate limits
//! - Persist scan results between runs in plain text files

pub mod cache;
pub mod config;
pub mod context;
pub mod error;
pub mod executor;
pub mod governor;
pub mod menu;
pub mod metrics;
pub mod progress;
pub mod remote;
pub mod session;
pub mod storage;
pub mod telegram;

// Re-export common types
pub use cache::EntityCache;
pub use config::Config;
pub use context::CleanerContext;
pub use error::{Error, Result};
pub use executor::{BoundedExecutor, ItemOutcome};
pub use governor::RateGovernor;
pub use progress::ProgressReporter;
pub use remote::{EntityKind, EntityRef, RemoteClient, RemoteEntity, RemoteMessage};
pub use session::{SessionLock, TelegramClient};
pub use storage::{DataStorage, DeletedAccount};
pub use telegram::GrammersRemote;

// Commands module uses re-exported types, so it must be declared after the re-exports
pub mod commands;
