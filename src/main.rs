//! Telegram Cleaner - main entry point
//!
//! Interactive menu for removing dead bots and deleted accounts from the
//! dialog list.

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use tokio::io::BufReader;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use telegram_cleaner::session::{self, SessionLock, TelegramClient};
use telegram_cleaner::{menu, metrics, CleanerContext, Config, DataStorage, GrammersRemote};

/// Console output on stderr (stdout carries the menu and progress line) plus
/// an append-only log file without colors.
fn init_logging(log_file: &Path) -> anyhow::Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file)?;

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive("telegram_cleaner=info".parse()?))
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
        .init();

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env for local development
    let _ = dotenvy::dotenv();

    let config = Config::new();
    init_logging(&config.log_file)?;
    info!("🚀 Telegram Cleaner starting");

    let storage = DataStorage::new(&config.data_dir)?;
    let mut input = BufReader::new(tokio::io::stdin());

    let credentials = session::resolve_credentials(&config, &storage, &mut input).await?;
    let _lock = SessionLock::acquire(&config.lock_file)?;

    let session_store = session::open_session(config.session_file())?;
    let telegram = TelegramClient::connect(session_store, credentials.api_id).await?;
    session::ensure_authorized(
        &telegram,
        &credentials.api_hash,
        config.phone.clone(),
        &mut input,
    )
    .await?;

    if let Some(addr) = config.metrics_addr {
        metrics::spawn_metrics_server(addr);
    }

    let ctx = CleanerContext::new(GrammersRemote::new(telegram.client.clone()), storage, &config);
    menu::serve(&ctx, &mut input).await;

    ctx.shutdown();
    telegram.disconnect();
    info!("Telegram Cleaner stopped");

    Ok(())
}
