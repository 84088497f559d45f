//! Dead-bot scan
//!
//! Every bot in the dialog list that was never probed gets the probe text.
//! A bot is alive when any of its latest messages carries text that is not
//! the probe echoed back; everything else, probe errors included, is dead.

use std::collections::{BTreeSet, HashSet};
use std::fmt;

use tokio::time::sleep;
use tracing::{info, warn};

use crate::context::CleanerContext;
use crate::error::Result;
use crate::metrics;
use crate::progress::ProgressReporter;
use crate::remote::{EntityRef, RemoteClient, RemoteEntity, RemoteMessage};
use crate::storage::{DEAD_BOTS_FILE, SEEN_BOTS_FILE};

const WORKFLOW: &str = "scan_bots";

#[derive(Debug, Default)]
pub struct BotScanReport {
    pub bots_in_dialogs: usize,
    pub alive: Vec<String>,
    pub newly_dead: Vec<String>,
    pub dead: BTreeSet<String>,
    pub seen: BTreeSet<String>,
}

impl fmt::Display for BotScanReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} bots in dialogs, {} probed: {} alive, {} dead ({} dead in total)",
            self.bots_in_dialogs,
            self.alive.len() + self.newly_dead.len(),
            self.alive.len(),
            self.newly_dead.len(),
            self.dead.len()
        )
    }
}

/// Whether any message proves a live bot answered the probe.
pub fn is_alive(messages: &[RemoteMessage], probe_text: &str) -> bool {
    messages
        .iter()
        .any(|m| !m.text.trim().is_empty() && !m.text.contains(probe_text))
}

async fn probe_bot<C: RemoteClient>(ctx: &CleanerContext<C>, bot: RemoteEntity) -> Result<bool> {
    let client = ctx.client();
    let probe = ctx.probe();
    let text = probe.text.as_str();
    let target = &bot;

    ctx.call(move || client.send_message(target, text)).await?;
    sleep(probe.settle).await;

    let limit = probe.fetch_limit;
    let messages = ctx
        .call(move || client.recent_messages(target, limit))
        .await?;
    Ok(is_alive(&messages, text))
}

pub async fn run<C: RemoteClient>(ctx: &CleanerContext<C>) -> Result<BotScanReport> {
    let storage = ctx.storage();
    let mut report = BotScanReport {
        seen: storage.load_set(SEEN_BOTS_FILE)?,
        dead: storage.load_set(DEAD_BOTS_FILE)?,
        ..BotScanReport::default()
    };

    let client = ctx.client();
    let dialogs = ctx.call(move || client.dialogs()).await?;

    let mut queued = HashSet::new();
    let mut pending = Vec::new();
    for bot in dialogs.into_iter().filter(RemoteEntity::is_bot) {
        report.bots_in_dialogs += 1;
        let bot_id = bot.bot_id();
        ctx.remember(&EntityRef::parse(&bot_id), bot.clone());
        if !report.seen.contains(&bot_id) && queued.insert(bot_id) {
            pending.push(bot);
        }
    }

    if pending.is_empty() {
        info!("ℹ️ No new bots to probe ({} known)", report.seen.len());
        return Ok(report);
    }

    info!("🔍 Probing {} new bots", pending.len());
    let mut progress = ProgressReporter::new(pending.len(), "Probing bots");
    let outcomes = ctx
        .executor()
        .run_all(
            pending,
            RemoteEntity::bot_id,
            |bot| probe_bot(ctx, bot),
            |outcome| progress.update(outcome.is_success()),
        )
        .await;
    progress.complete();

    for outcome in outcomes {
        let bot_id = outcome.key;
        report.seen.insert(bot_id.clone());
        match outcome.result {
            Ok(true) => {
                metrics::record_item(WORKFLOW, "alive");
                report.alive.push(bot_id);
            }
            Ok(false) => {
                metrics::record_item(WORKFLOW, "dead");
                report.dead.insert(bot_id.clone());
                report.newly_dead.push(bot_id);
            }
            Err(err) => {
                warn!("⚠️ Probe of {} failed, marking dead: {}", bot_id, err);
                metrics::record_item(WORKFLOW, "failed");
                report.dead.insert(bot_id.clone());
                report.newly_dead.push(bot_id);
            }
        }
    }

    storage.save_set(SEEN_BOTS_FILE, &report.seen)?;
    storage.save_set(DEAD_BOTS_FILE, &report.dead)?;
    info!("✅ {}", report);

    Ok(report)
}
