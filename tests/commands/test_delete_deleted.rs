//! Tests for deleting chats with deleted accounts

use std::time::Duration;

use tokio::time::Instant;

use telegram_cleaner::commands::delete_deleted;
use telegram_cleaner::storage::DELETED_ACCOUNTS_FILE;
use telegram_cleaner::{DeletedAccount, EntityRef};

use crate::common::{user, Call, Failure, Harness, MockRemote};

fn record(user_id: i64, access_hash: i64) -> DeletedAccount {
    DeletedAccount {
        user_id,
        access_hash,
    }
}

fn packed(user_id: i64, access_hash: i64) -> EntityRef {
    EntityRef::User {
        id: user_id,
        access_hash,
    }
}

#[tokio::test(start_paused = true)]
async fn deletes_history_of_deleted_accounts() {
    let harness = Harness::new(
        MockRemote::new()
            .with_resolvable(packed(1, 11), user(1, Some(11), true))
            .with_resolvable(packed(2, 22), user(2, Some(22), true)),
    );
    harness
        .storage()
        .save_records(DELETED_ACCOUNTS_FILE, &[record(1, 11), record(2, 22)])
        .unwrap();

    let report = delete_deleted::run(&harness.ctx).await.unwrap();

    assert_eq!(report.removed, vec![1, 2]);
    assert!(report.stale.is_empty());
    assert!(report.failed.is_empty());

    let calls = harness.mock().calls();
    assert!(calls.contains(&Call::Resolve("1:11".into())));
    assert!(calls.contains(&Call::DeleteHistory(1, true)));
    assert!(calls.contains(&Call::DeleteHistory(2, true)));
}

#[tokio::test(start_paused = true)]
async fn stale_record_is_skipped() {
    let harness = Harness::new(
        MockRemote::new().with_resolvable(packed(3, 33), user(3, Some(33), false)),
    );
    harness
        .storage()
        .save_records(DELETED_ACCOUNTS_FILE, &[record(3, 33)])
        .unwrap();

    let report = delete_deleted::run(&harness.ctx).await.unwrap();

    assert_eq!(report.stale, vec![3]);
    assert!(report.removed.is_empty());
    assert_eq!(report.progress.completed, 1);
    assert_eq!(report.progress.failure, 1);
    assert_eq!(report.progress.success, 0);
    assert_eq!(
        harness.mock().count(|c| matches!(c, Call::DeleteHistory(..))),
        0
    );
    // records are kept for the next run
    assert_eq!(
        harness.storage().load_records(DELETED_ACCOUNTS_FILE).unwrap(),
        vec![record(3, 33)]
    );
}

#[tokio::test(start_paused = true)]
async fn failures_and_gone_chats_are_reported_separately() {
    let harness = Harness::new(
        MockRemote::new()
            .with_resolvable(packed(1, 11), user(1, Some(11), true))
            .with_resolvable(packed(2, 22), user(2, Some(22), true))
            .with_failure(1, Failure::Gone)
            .with_failure(2, Failure::Other),
    );
    harness
        .storage()
        .save_records(
            DELETED_ACCOUNTS_FILE,
            &[record(1, 11), record(2, 22), record(4, 44)],
        )
        .unwrap();

    let report = delete_deleted::run(&harness.ctx).await.unwrap();

    assert_eq!(report.removed, vec![1]);
    assert_eq!(report.failed, vec![2, 4]);
    assert_eq!(report.progress.success, 1);
    assert_eq!(report.progress.failure, 2);
}

#[tokio::test(start_paused = true)]
async fn pauses_after_every_chat() {
    let harness = Harness::new(
        MockRemote::new()
            .with_resolvable(packed(1, 11), user(1, Some(11), true))
            .with_resolvable(packed(2, 22), user(2, Some(22), true))
            .with_resolvable(packed(3, 33), user(3, Some(33), true)),
    );
    harness
        .storage()
        .save_records(
            DELETED_ACCOUNTS_FILE,
            &[record(1, 11), record(2, 22), record(3, 33)],
        )
        .unwrap();

    let start = Instant::now();
    delete_deleted::run(&harness.ctx).await.unwrap();

    assert_eq!(start.elapsed(), Duration::from_secs(3));
}

#[tokio::test(start_paused = true)]
async fn no_records_is_a_no_op() {
    let harness = Harness::new(MockRemote::new());

    let report = delete_deleted::run(&harness.ctx).await.unwrap();

    assert!(report.removed.is_empty());
    assert!(harness.mock().calls().is_empty());
}
