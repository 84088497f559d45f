//! Cleaner workflows
//!
//! Each module is one menu action. They share a [`crate::CleanerContext`]
//! and persist their results through its storage.

pub mod cleanup;
pub mod delete_deleted;
pub mod scan_bots;
pub mod scan_deleted;
pub mod unsubscribe;

// Re-export commonly used types
pub use cleanup::{run as cleanup_run, CleanupReport};
pub use delete_deleted::{run as delete_deleted_run, DeleteChatsReport};
pub use scan_bots::{is_alive, run as scan_bots_run, BotScanReport};
pub use scan_deleted::{run as scan_deleted_run, DeletedScanReport};
pub use unsubscribe::{run as unsubscribe_run, UnsubscribeAction, UnsubscribeReport};
