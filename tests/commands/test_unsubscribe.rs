//! Tests for unsubscribing from dead bots

use std::collections::BTreeSet;
use std::time::Duration;

use tokio::time::Instant;

use telegram_cleaner::commands::{unsubscribe, UnsubscribeAction};
use telegram_cleaner::config::ExecutorSettings;
use telegram_cleaner::storage::DEAD_BOTS_FILE;

use crate::common::{bot, channel, Call, Failure, Harness, MockRemote};

fn dead(harness: &Harness, names: &[&str]) {
    let set: BTreeSet<String> = names.iter().map(|s| s.to_string()).collect();
    harness.storage().save_set(DEAD_BOTS_FILE, &set).unwrap();
}

#[tokio::test(start_paused = true)]
async fn leaves_channels_and_deletes_user_history() {
    let harness = Harness::new(
        MockRemote::new()
            .with_dialog(channel(100, "x"))
            .with_dialog(bot(200, Some("y"))),
    );
    dead(&harness, &["x", "y"]);

    let report = unsubscribe::run(&harness.ctx).await.unwrap();

    let mut succeeded: Vec<_> = report.succeeded().collect();
    succeeded.sort_by_key(|(name, _)| *name);
    assert_eq!(
        succeeded,
        vec![
            ("x", UnsubscribeAction::Left),
            ("y", UnsubscribeAction::HistoryDeleted)
        ]
    );
    assert_eq!(report.failed().count(), 0);

    let calls = harness.mock().calls();
    assert!(calls.contains(&Call::Leave(100)));
    assert!(calls.contains(&Call::DeleteHistory(200, true)));
    assert!(!calls.contains(&Call::Leave(200)));
}

#[tokio::test(start_paused = true)]
async fn empty_dead_set_does_nothing() {
    let harness = Harness::new(MockRemote::new().with_dialog(channel(100, "x")));

    let report = unsubscribe::run(&harness.ctx).await.unwrap();

    assert!(report.outcomes.is_empty());
    assert!(harness.mock().calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn gone_peers_count_as_unsubscribed() {
    let harness = Harness::new(
        MockRemote::new()
            .with_dialog(bot(1, Some("vanished_bot")))
            .with_failure(1, Failure::Gone),
    );
    dead(&harness, &["vanished_bot"]);

    let report = unsubscribe::run(&harness.ctx).await.unwrap();

    assert_eq!(
        report.succeeded().collect::<Vec<_>>(),
        vec![("vanished_bot", UnsubscribeAction::AlreadyGone)]
    );
}

#[tokio::test(start_paused = true)]
async fn failures_do_not_stop_the_batch() {
    let harness = Harness::new(
        MockRemote::new()
            .with_dialog(bot(1, Some("ok_bot")))
            .with_dialog(bot(2, Some("broken_bot")))
            .with_failure(2, Failure::Other),
    );
    dead(&harness, &["ok_bot", "broken_bot", "unknown_bot"]);

    let report = unsubscribe::run(&harness.ctx).await.unwrap();

    let mut failed: Vec<_> = report.failed().collect();
    failed.sort();
    assert_eq!(failed, vec!["broken_bot", "unknown_bot"]);
    assert_eq!(
        report.succeeded().collect::<Vec<_>>(),
        vec![("ok_bot", UnsubscribeAction::HistoryDeleted)]
    );
    // resolution failed, so no action was attempted
    assert_eq!(
        harness
            .mock()
            .count(|c| matches!(c, Call::DeleteHistory(..) | Call::Leave(..))),
        2
    );
}

#[tokio::test(start_paused = true)]
async fn batches_are_separated_by_pause() {
    let mut mock = MockRemote::new();
    let mut names = Vec::new();
    for id in 0..25 {
        let name = format!("bot_{:02}", id);
        mock = mock.with_dialog(bot(id, Some(&name)));
        names.push(name);
    }
    let harness = Harness::with_executor(
        mock,
        ExecutorSettings {
            concurrency: 10,
            batch_size: 10,
            batch_pause: Duration::from_secs(5),
        },
    );
    let refs: Vec<&str> = names.iter().map(String::as_str).collect();
    dead(&harness, &refs);

    let start = Instant::now();
    let report = unsubscribe::run(&harness.ctx).await.unwrap();

    assert_eq!(report.outcomes.len(), 25);
    assert_eq!(report.succeeded().count(), 25);
    // three batches, two pauses
    assert!(start.elapsed() >= Duration::from_secs(10));
    assert!(start.elapsed() < Duration::from_secs(15));
}
