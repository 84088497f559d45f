//! Delete chats with deleted accounts
//!
//! Walks the stored records one at a time with a fixed pause after each.
//! Each account is re-checked first; records whose account came back are
//! skipped. The records file is left untouched.

use std::fmt;

use tokio::time::sleep;
use tracing::{info, warn};

use crate::context::CleanerContext;
use crate::error::Result;
use crate::metrics;
use crate::progress::{ProgressReporter, ProgressSnapshot};
use crate::remote::{EntityRef, RemoteClient};
use crate::storage::{DeletedAccount, DELETED_ACCOUNTS_FILE};

const WORKFLOW: &str = "delete_deleted";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChatDeletion {
    Removed,
    /// The account is no longer deleted.
    Stale,
}

#[derive(Debug, Default)]
pub struct DeleteChatsReport {
    pub removed: Vec<i64>,
    pub stale: Vec<i64>,
    pub failed: Vec<i64>,
    /// Final progress counters; stale records count as failures.
    pub progress: ProgressSnapshot,
}

impl fmt::Display for DeleteChatsReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} chats deleted, {} skipped (account active), {} failed",
            self.removed.len(),
            self.stale.len(),
            self.failed.len()
        )
    }
}

async fn delete_one<C: RemoteClient>(
    ctx: &CleanerContext<C>,
    record: &DeletedAccount,
) -> Result<ChatDeletion> {
    let target = EntityRef::User {
        id: record.user_id,
        access_hash: record.access_hash,
    };
    let entity = ctx.resolve(&target).await?;
    if !entity.is_deleted() {
        return Ok(ChatDeletion::Stale);
    }

    let client = ctx.client();
    let peer = &entity;
    match ctx.call(move || client.delete_history(peer, true)).await {
        Ok(()) => Ok(ChatDeletion::Removed),
        Err(err) if err.is_gone() => {
            info!("ℹ️ Chat with {} is already gone", record.user_id);
            Ok(ChatDeletion::Removed)
        }
        Err(err) => Err(err),
    }
}

pub async fn run<C: RemoteClient>(ctx: &CleanerContext<C>) -> Result<DeleteChatsReport> {
    let records = ctx.storage().load_records(DELETED_ACCOUNTS_FILE)?;
    let mut report = DeleteChatsReport::default();
    if records.is_empty() {
        info!("ℹ️ No deleted accounts recorded. Run the deleted account scan first.");
        return Ok(report);
    }

    let pause = ctx.probe().chat_delete_pause;
    let mut progress = ProgressReporter::new(records.len(), "Deleting chats");

    for record in &records {
        match delete_one(ctx, record).await {
            Ok(ChatDeletion::Removed) => {
                metrics::record_item(WORKFLOW, "removed");
                report.removed.push(record.user_id);
                progress.update(true);
            }
            Ok(ChatDeletion::Stale) => {
                info!("ℹ️ {} is not deleted anymore, skipping", record.user_id);
                metrics::record_item(WORKFLOW, "stale");
                report.stale.push(record.user_id);
                progress.update(false);
            }
            Err(err) => {
                warn!("⚠️ Failed to delete chat with {}: {}", record.user_id, err);
                metrics::record_item(WORKFLOW, "failed");
                report.failed.push(record.user_id);
                progress.update(false);
            }
        }
        sleep(pause).await;
    }
    progress.complete();
    report.progress = progress.snapshot();
    info!("✅ {}", report);

    Ok(report)
}
