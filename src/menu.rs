//! Interactive numbered menu.

use std::io::{self, Write};
use std::time::Instant;

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{error, warn};

use crate::commands;
use crate::context::CleanerContext;
use crate::error::Result;
use crate::metrics;
use crate::remote::RemoteClient;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuChoice {
    ScanDeadBots,
    ScanDeletedAccounts,
    UnsubscribeDeadBots,
    DeleteDeletedChats,
    CleanupFiles,
    Exit,
}

impl MenuChoice {
    pub const ALL: [MenuChoice; 6] = [
        MenuChoice::ScanDeadBots,
        MenuChoice::ScanDeletedAccounts,
        MenuChoice::UnsubscribeDeadBots,
        MenuChoice::DeleteDeletedChats,
        MenuChoice::CleanupFiles,
        MenuChoice::Exit,
    ];

    pub fn parse(input: &str) -> Option<Self> {
        match input.trim() {
            "1" => Some(MenuChoice::ScanDeadBots),
            "2" => Some(MenuChoice::ScanDeletedAccounts),
            "3" => Some(MenuChoice::UnsubscribeDeadBots),
            "4" => Some(MenuChoice::DeleteDeletedChats),
            "5" => Some(MenuChoice::CleanupFiles),
            "6" => Some(MenuChoice::Exit),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            MenuChoice::ScanDeadBots => "Scan dead bots",
            MenuChoice::ScanDeletedAccounts => "Scan deleted accounts",
            MenuChoice::UnsubscribeDeadBots => "Unsubscribe dead bots",
            MenuChoice::DeleteDeletedChats => "Delete chats of deleted accounts",
            MenuChoice::CleanupFiles => "Cleanup files",
            MenuChoice::Exit => "Exit",
        }
    }

    /// Metrics label.
    pub fn name(&self) -> &'static str {
        match self {
            MenuChoice::ScanDeadBots => "scan_bots",
            MenuChoice::ScanDeletedAccounts => "scan_deleted",
            MenuChoice::UnsubscribeDeadBots => "unsubscribe",
            MenuChoice::DeleteDeletedChats => "delete_deleted",
            MenuChoice::CleanupFiles => "cleanup",
            MenuChoice::Exit => "exit",
        }
    }
}

pub fn render_menu() -> String {
    let mut text = String::from("\n📋 Telegram Cleaner\n");
    for (idx, choice) in MenuChoice::ALL.iter().enumerate() {
        text.push_str(&format!("{}. {}\n", idx + 1, choice.label()));
    }
    text
}

/// Print `prompt` and read one trimmed line. `None` on end of input.
pub async fn read_line<R>(input: &mut R, prompt: &str) -> Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    print!("{}", prompt);
    io::stdout().flush()?;

    let mut line = String::new();
    if input.read_line(&mut line).await? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_string()))
}

/// Run one workflow and describe its outcome.
pub async fn execute<C: RemoteClient>(
    ctx: &CleanerContext<C>,
    choice: MenuChoice,
) -> Result<String> {
    let name = choice.name();
    metrics::record_workflow_start(name);
    let start = Instant::now();

    let result = match choice {
        MenuChoice::ScanDeadBots => commands::scan_bots_run(ctx).await.map(|r| r.to_string()),
        MenuChoice::ScanDeletedAccounts => {
            commands::scan_deleted_run(ctx).await.map(|r| r.to_string())
        }
        MenuChoice::UnsubscribeDeadBots => {
            commands::unsubscribe_run(ctx).await.map(|r| r.to_string())
        }
        MenuChoice::DeleteDeletedChats => {
            commands::delete_deleted_run(ctx).await.map(|r| r.to_string())
        }
        MenuChoice::CleanupFiles => commands::cleanup_run(ctx).map(|r| r.to_string()),
        MenuChoice::Exit => Ok(String::from("Goodbye")),
    };

    metrics::record_workflow_result(name, start.elapsed(), result.is_ok());
    result
}

/// Menu loop; returns when the user exits or input ends.
///
/// A failing workflow is logged and the menu shown again.
pub async fn run<C, R>(ctx: &CleanerContext<C>, input: &mut R) -> Result<()>
where
    C: RemoteClient,
    R: AsyncBufRead + Unpin,
{
    loop {
        print!("{}", render_menu());
        let Some(line) = read_line(input, "Choose an option (1-6): ").await? else {
            println!();
            break;
        };

        let Some(choice) = MenuChoice::parse(&line) else {
            warn!("Invalid choice '{}'", line);
            println!("❌ Invalid choice, enter a number from 1 to 6");
            continue;
        };

        if choice == MenuChoice::Exit {
            println!("👋 Goodbye");
            break;
        }

        match execute(ctx, choice).await {
            Ok(summary) => println!("✅ {}: {}", choice.label(), summary),
            Err(err) => {
                error!(error = ?err, "❌ {} failed: {}", choice.label(), err);
                println!("❌ {} failed: {}", choice.label(), err);
            }
        }

        if read_line(input, "\nPress Enter to continue...").await?.is_none() {
            println!();
            break;
        }
    }

    Ok(())
}

/// Run the menu for a whole session. An input failure ends the session with
/// an error log instead of an error exit.
pub async fn serve<C, R>(ctx: &CleanerContext<C>, input: &mut R)
where
    C: RemoteClient,
    R: AsyncBufRead + Unpin,
{
    if let Err(err) = run(ctx, input).await {
        error!(error = ?err, "❌ Menu stopped: {}", err);
    }
}
