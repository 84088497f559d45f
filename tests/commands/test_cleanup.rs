//! Tests for the cleanup action

use std::collections::BTreeSet;

use telegram_cleaner::commands::cleanup;
use telegram_cleaner::storage::{
    CREDENTIALS_FILE, DEAD_BOTS_FILE, DELETED_ACCOUNTS_FILE, SEEN_BOTS_FILE,
};
use telegram_cleaner::EntityRef;

use crate::common::{bot, Harness, MockRemote};

#[tokio::test(start_paused = true)]
async fn removes_scan_files_and_keeps_credentials() {
    let harness = Harness::new(MockRemote::new());
    let storage = harness.storage();
    let names: BTreeSet<String> = ["some_bot".to_string()].into_iter().collect();
    storage.save_set(SEEN_BOTS_FILE, &names).unwrap();
    storage.save_set(DEAD_BOTS_FILE, &names).unwrap();
    storage.save_records(DELETED_ACCOUNTS_FILE, &[]).unwrap();
    storage.save_credentials("1", "hash").unwrap();

    let report = cleanup::run(&harness.ctx).unwrap();

    assert_eq!(report.removed.len(), 3);
    assert!(!storage.path(SEEN_BOTS_FILE).exists());
    assert!(!storage.path(DEAD_BOTS_FILE).exists());
    assert!(!storage.path(DELETED_ACCOUNTS_FILE).exists());
    assert!(storage.path(CREDENTIALS_FILE).exists());
}

#[tokio::test(start_paused = true)]
async fn missing_files_are_fine() {
    let harness = Harness::new(MockRemote::new());

    let report = cleanup::run(&harness.ctx).unwrap();

    assert!(report.removed.is_empty());
    assert_eq!(report.to_string(), "nothing to remove");
}

#[tokio::test(start_paused = true)]
async fn clears_the_entity_cache() {
    let harness = Harness::new(MockRemote::new());
    harness
        .ctx
        .remember(&EntityRef::parse("cached_bot"), bot(1, Some("cached_bot")));
    assert_eq!(harness.ctx.cached_entities(), 1);

    cleanup::run(&harness.ctx).unwrap();

    assert_eq!(harness.ctx.cached_entities(), 0);
}
