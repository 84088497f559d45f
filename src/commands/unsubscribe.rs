//! Unsubscribe from dead bots
//!
//! Groups and channels are left, users and bots get their history deleted
//! for both sides. Runs in batches with a pause between them.

use std::fmt;

use tracing::{error, info, warn};

use crate::context::CleanerContext;
use crate::error::Result;
use crate::executor::ItemOutcome;
use crate::metrics;
use crate::progress::ProgressReporter;
use crate::remote::{EntityRef, RemoteClient};
use crate::storage::DEAD_BOTS_FILE;

const WORKFLOW: &str = "unsubscribe";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnsubscribeAction {
    Left,
    HistoryDeleted,
    /// The peer no longer exists on the server; nothing left to remove.
    AlreadyGone,
}

#[derive(Debug, Default)]
pub struct UnsubscribeReport {
    pub outcomes: Vec<ItemOutcome<String, UnsubscribeAction>>,
}

impl UnsubscribeReport {
    pub fn succeeded(&self) -> impl Iterator<Item = (&str, UnsubscribeAction)> {
        self.outcomes.iter().filter_map(|o| match &o.result {
            Ok(action) => Some((o.key.as_str(), *action)),
            Err(_) => None,
        })
    }

    pub fn failed(&self) -> impl Iterator<Item = &str> {
        self.outcomes
            .iter()
            .filter(|o| !o.is_success())
            .map(|o| o.key.as_str())
    }
}

impl fmt::Display for UnsubscribeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} dead bots processed: {} unsubscribed, {} failed",
            self.outcomes.len(),
            self.succeeded().count(),
            self.failed().count()
        )
    }
}

async fn unsubscribe_one<C: RemoteClient>(
    ctx: &CleanerContext<C>,
    name: String,
) -> Result<UnsubscribeAction> {
    let target = EntityRef::parse(&name);
    let entity = ctx.resolve(&target).await?;
    let client = ctx.client();
    let peer = &entity;

    let result = if entity.is_group_like() {
        ctx.call(move || client.leave_channel(peer))
            .await
            .map(|_| UnsubscribeAction::Left)
    } else {
        ctx.call(move || client.delete_history(peer, true))
            .await
            .map(|_| UnsubscribeAction::HistoryDeleted)
    };

    match result {
        Err(err) if err.is_gone() => {
            info!("ℹ️ {} is already gone: {}", name, err);
            ctx.invalidate(Some(&target));
            Ok(UnsubscribeAction::AlreadyGone)
        }
        other => other,
    }
}

pub async fn run<C: RemoteClient>(ctx: &CleanerContext<C>) -> Result<UnsubscribeReport> {
    let names: Vec<String> = ctx.storage().load_set(DEAD_BOTS_FILE)?.into_iter().collect();
    if names.is_empty() {
        error!("❌ No dead bots recorded. Run the dead bot scan first.");
        return Ok(UnsubscribeReport::default());
    }

    info!("🧹 Unsubscribing from {} dead bots", names.len());
    let mut progress = ProgressReporter::new(names.len(), "Unsubscribing");
    let outcomes = ctx
        .executor()
        .run_batched(
            names,
            String::clone,
            |name| unsubscribe_one(ctx, name),
            |outcome| {
                progress.update(outcome.is_success());
                metrics::record_item(
                    WORKFLOW,
                    if outcome.is_success() { "ok" } else { "failed" },
                );
            },
        )
        .await;
    progress.complete();

    let report = UnsubscribeReport { outcomes };
    for outcome in &report.outcomes {
        if let Err(err) = &outcome.result {
            warn!("⚠️ Could not unsubscribe from {}: {}", outcome.key, err);
        }
    }
    info!("✅ {}", report);

    Ok(report)
}
