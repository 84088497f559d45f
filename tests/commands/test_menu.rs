//! Tests for the interactive menu loop

use std::collections::BTreeSet;
use std::io;

use tokio::io::BufReader;

use telegram_cleaner::menu::{self, MenuChoice};
use telegram_cleaner::storage::{DEAD_BOTS_FILE, SEEN_BOTS_FILE};

use crate::common::{bot, BotReply, Call, Harness, MockRemote};

#[tokio::test(start_paused = true)]
async fn runs_choice_then_exits() {
    let harness = Harness::new(MockRemote::new().with_bot(bot(1, Some("a_bot")), BotReply::Echo));

    let mut input: &[u8] = b"1\n\n6\n";
    menu::run(&harness.ctx, &mut input).await.unwrap();

    let dead = harness.storage().load_set(DEAD_BOTS_FILE).unwrap();
    assert!(dead.contains("a_bot"));
}

#[tokio::test(start_paused = true)]
async fn end_of_input_exits_cleanly() {
    let harness = Harness::new(MockRemote::new());

    let mut input: &[u8] = b"";
    menu::run(&harness.ctx, &mut input).await.unwrap();

    assert!(harness.mock().calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn invalid_choice_shows_menu_again() {
    let harness = Harness::new(MockRemote::new());
    let names: BTreeSet<String> = ["x".to_string()].into_iter().collect();
    harness.storage().save_set(SEEN_BOTS_FILE, &names).unwrap();

    let mut input: &[u8] = b"9\nabc\n5\n\n6\n";
    menu::run(&harness.ctx, &mut input).await.unwrap();

    assert!(!harness.storage().path(SEEN_BOTS_FILE).exists());
}

#[tokio::test(start_paused = true)]
async fn workflow_error_returns_to_menu() {
    let harness = Harness::new(MockRemote::new().with_failing_dialogs());

    let mut input: &[u8] = b"2\n\n1\n\n6\n";
    menu::run(&harness.ctx, &mut input).await.unwrap();

    assert_eq!(
        harness.mock().count(|c| matches!(c, Call::Dialogs)),
        2
    );
}

#[tokio::test(start_paused = true)]
async fn execute_summarises_result() {
    let harness = Harness::new(MockRemote::new());

    let summary = menu::execute(&harness.ctx, MenuChoice::CleanupFiles)
        .await
        .unwrap();

    assert_eq!(summary, "nothing to remove");
}

#[tokio::test(start_paused = true)]
async fn broken_input_ends_session_without_error() {
    let harness = Harness::new(MockRemote::new());
    let stdin = tokio_test::io::Builder::new()
        .read(b"9\n")
        .read_error(io::Error::new(io::ErrorKind::BrokenPipe, "stdin closed"))
        .build();
    let mut input = BufReader::new(stdin);

    let result = menu::run(&harness.ctx, &mut input).await;
    assert!(result.is_err());

    let stdin = tokio_test::io::Builder::new()
        .read_error(io::Error::new(io::ErrorKind::BrokenPipe, "stdin closed"))
        .build();
    let mut input = BufReader::new(stdin);
    menu::serve(&harness.ctx, &mut input).await;

    assert!(harness.mock().calls().is_empty());
}
