//! Deleted-account scan
//!
//! Collects `(user id, access hash)` for every deleted account in the dialog
//! list and merges them into the stored records.

use std::collections::HashSet;
use std::fmt;

use tracing::{info, warn};

use crate::context::CleanerContext;
use crate::error::Result;
use crate::metrics;
use crate::remote::{EntityKind, RemoteClient};
use crate::storage::{DeletedAccount, DELETED_ACCOUNTS_FILE};

const WORKFLOW: &str = "scan_deleted";

#[derive(Debug, Default)]
pub struct DeletedScanReport {
    pub users_checked: usize,
    pub found: Vec<DeletedAccount>,
    pub newly_added: usize,
    pub total_stored: usize,
}

impl fmt::Display for DeletedScanReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} users checked, {} deleted accounts found ({} new, {} stored)",
            self.users_checked,
            self.found.len(),
            self.newly_added,
            self.total_stored
        )
    }
}

pub async fn run<C: RemoteClient>(ctx: &CleanerContext<C>) -> Result<DeletedScanReport> {
    let client = ctx.client();
    let dialogs = ctx.call(move || client.dialogs()).await?;

    let mut report = DeletedScanReport::default();
    for entity in dialogs {
        let EntityKind::User { bot: false, deleted } = entity.kind else {
            continue;
        };
        report.users_checked += 1;
        if !deleted {
            continue;
        }

        match entity.access_hash {
            Some(access_hash) => report.found.push(DeletedAccount {
                user_id: entity.id,
                access_hash,
            }),
            None => {
                warn!("⚠️ Deleted account {} has no access hash, skipping", entity.id);
                metrics::record_item(WORKFLOW, "skipped");
            }
        }
    }

    let storage = ctx.storage();
    let mut stored = storage.load_records(DELETED_ACCOUNTS_FILE)?;
    let mut known: HashSet<i64> = stored.iter().map(|r| r.user_id).collect();
    for record in &report.found {
        if known.insert(record.user_id) {
            stored.push(*record);
            report.newly_added += 1;
            metrics::record_item(WORKFLOW, "found");
        }
    }

    storage.save_records(DELETED_ACCOUNTS_FILE, &stored)?;
    report.total_stored = stored.len();
    info!("✅ {}", report);

    Ok(report)
}
