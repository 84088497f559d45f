//! Session management for the Telegram client
//!
//! Provides:
//! - File-based session locking to prevent two cleaners sharing one session
//! - API credential resolution (config, saved file, interactive prompt)
//! - Client creation and interactive login

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use fs2::FileExt;
use grammers_client::client::updates::UpdatesLike;
use grammers_client::{Client, SignInError};
use grammers_mtsender::SenderPool;
use grammers_session::storages::SqliteSession;
use tokio::io::AsyncBufRead;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::menu::read_line;
use crate::storage::DataStorage;

/// Session lock guard that ensures exclusive access to the Telegram session.
pub struct SessionLock {
    path: PathBuf,
    lock_file: Option<File>,
}

impl SessionLock {
    /// Acquire an exclusive lock on the session.
    pub fn acquire(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let lock_file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)
            .map_err(|e| Error::LockError(format!("Failed to open lock file: {}", e)))?;

        match lock_file.try_lock_exclusive() {
            Ok(()) => Ok(Self {
                path,
                lock_file: Some(lock_file),
            }),
            Err(_) => {
                eprintln!(
                    r#"
⚠️  The Telegram session is already used by another cleaner.

Running two bulk jobs on one session gets the account rate limited.
Wait for the other process to finish and try again.
"#
                );
                Err(Error::SessionLocked)
            }
        }
    }

    /// Release the lock manually
    pub fn release(&mut self) {
        if let Some(file) = self.lock_file.take() {
            let _ = file.unlock();
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

impl Drop for SessionLock {
    fn drop(&mut self) {
        self.release();
    }
}

pub fn session_exists(path: impl AsRef<Path>) -> bool {
    path.as_ref().exists()
}

/// Open (or create) the session database.
pub fn open_session(path: impl AsRef<Path>) -> Result<Arc<SqliteSession>> {
    let path = path.as_ref();
    if !session_exists(path) {
        info!("No session at {}, a login will be required", path.display());
    }
    let session = SqliteSession::open(path)
        .map_err(|e| Error::SessionNotFound(format!("Failed to open session: {}", e)))?;
    Ok(Arc::new(session))
}

/// API id and hash issued for the application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiCredentials {
    pub api_id: i32,
    pub api_hash: String,
}

fn parse_api_id(raw: &str) -> Result<i32> {
    raw.trim()
        .parse::<i32>()
        .map_err(|_| Error::InvalidArgument(format!("API ID must be a number, got '{}'", raw.trim())))
}

/// Credentials from config/env first, then `credentials.txt`, then the user.
/// Prompted values are saved for the next run.
pub async fn resolve_credentials<R>(
    config: &Config,
    storage: &DataStorage,
    input: &mut R,
) -> Result<ApiCredentials>
where
    R: AsyncBufRead + Unpin,
{
    if let (Some(api_id), Some(api_hash)) = (config.api_id, config.api_hash.clone()) {
        return Ok(ApiCredentials { api_id, api_hash });
    }

    if let Some(saved) = storage.load_credentials()? {
        return Ok(ApiCredentials {
            api_id: parse_api_id(&saved.api_id)?,
            api_hash: saved.api_hash,
        });
    }

    println!("🔑 API credentials are required (https://my.telegram.org)");
    let api_id = read_line(input, "API ID: ")
        .await?
        .ok_or(Error::AuthorizationRequired)?;
    let api_id_value = parse_api_id(&api_id)?;
    let api_hash = read_line(input, "API Hash: ")
        .await?
        .filter(|h| !h.is_empty())
        .ok_or(Error::AuthorizationRequired)?;

    storage.save_credentials(api_id.trim(), &api_hash)?;
    info!("Credentials saved to {}", storage.data_dir().display());

    Ok(ApiCredentials {
        api_id: api_id_value,
        api_hash,
    })
}

/// Holder for SenderPool components and Client
pub struct TelegramClient {
    pub client: Client,
    // Held so the sender pool keeps a live updates channel.
    _updates: mpsc::UnboundedReceiver<UpdatesLike>,
    runner: tokio::task::JoinHandle<()>,
}

impl TelegramClient {
    pub async fn connect(session: Arc<SqliteSession>, api_id: i32) -> Result<Self> {
        let pool = SenderPool::new(session, api_id);
        let client = Client::new(&pool);

        let SenderPool {
            runner,
            updates,
            ..
        } = pool;

        let runner = tokio::spawn(async move {
            runner.run().await;
        });

        Ok(Self {
            client,
            _updates: updates,
            runner,
        })
    }

    /// Stop the network runner.
    pub fn disconnect(self) {
        self.runner.abort();
    }
}

impl std::ops::Deref for TelegramClient {
    type Target = Client;

    fn deref(&self) -> &Self::Target {
        &self.client
    }
}

/// Log in interactively unless the session is already authorized.
pub async fn ensure_authorized<R>(
    client: &Client,
    api_hash: &str,
    phone: Option<String>,
    input: &mut R,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
{
    if client.is_authorized().await? {
        info!("Session already authorized");
        return Ok(());
    }

    let phone = match phone {
        Some(phone) => phone,
        None => read_line(input, "📱 Phone number (international format): ")
            .await?
            .filter(|p| !p.is_empty())
            .ok_or(Error::AuthorizationRequired)?,
    };

    let token = client
        .request_login_code(&phone, api_hash)
        .await
        .map_err(|e| Error::TelegramError(format!("Failed to request code: {}", e)))?;

    let code = read_line(input, "Enter the code from Telegram: ")
        .await?
        .ok_or(Error::AuthorizationRequired)?;

    let user = match client.sign_in(&token, &code).await {
        Ok(user) => user,
        Err(SignInError::PasswordRequired(password_token)) => {
            warn!("Two-step verification is enabled");
            let password = read_line(input, "🔒 Cloud password: ")
                .await?
                .ok_or(Error::AuthorizationRequired)?;
            client
                .check_password(password_token, password.as_bytes())
                .await
                .map_err(|e| Error::TelegramError(format!("Failed to check password: {}", e)))?
        }
        Err(e) => return Err(Error::TelegramError(format!("Failed to sign in: {}", e))),
    };

    println!("✅ Signed in as {}", user.full_name());
    Ok(())
}
