//! In-memory remote client and fixtures shared by the integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;

use telegram_cleaner::config::{ExecutorSettings, GovernorSettings, ProbeSettings};
use telegram_cleaner::{
    CleanerContext, DataStorage, EntityKind, EntityRef, Error, RemoteClient, RemoteEntity,
    RemoteMessage, Result,
};

/// What a bot does after receiving the probe.
#[derive(Debug, Clone)]
pub enum BotReply {
    /// Only the probe shows up in history.
    Echo,
    Text(String),
    /// Sending the probe fails.
    SendFails,
}

/// How an action against an entity fails.
#[derive(Debug, Clone, Copy)]
pub enum Failure {
    Gone,
    Other,
    /// Flood wait on the first `n` attempts, then success.
    Flood { times: u32, seconds: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Dialogs,
    Resolve(String),
    Send(i64, String),
    Recent(i64, usize),
    DeleteHistory(i64, bool),
    Leave(i64),
}

#[derive(Default)]
pub struct MockRemote {
    dialogs: Vec<RemoteEntity>,
    resolvable: HashMap<String, RemoteEntity>,
    replies: HashMap<i64, BotReply>,
    failures: Mutex<HashMap<i64, Failure>>,
    dialogs_fail: bool,
    calls: Mutex<Vec<Call>>,
}

impl MockRemote {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dialog(mut self, entity: RemoteEntity) -> Self {
        self.dialogs.push(entity);
        self
    }

    pub fn with_bot(self, entity: RemoteEntity, reply: BotReply) -> Self {
        let mut mock = self.with_dialog(entity.clone());
        mock.replies.insert(entity.id, reply);
        mock
    }

    /// Entity returned for `target` without it being in the dialogs.
    pub fn with_resolvable(mut self, target: EntityRef, entity: RemoteEntity) -> Self {
        self.resolvable.insert(target.cache_key(), entity);
        self
    }

    pub fn with_failure(self, id: i64, failure: Failure) -> Self {
        self.failures.lock().unwrap().insert(id, failure);
        self
    }

    pub fn with_failing_dialogs(mut self) -> Self {
        self.dialogs_fail = true;
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| pred(c)).count()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn check_failure(&self, id: i64) -> Result<()> {
        let mut failures = self.failures.lock().unwrap();
        match failures.get_mut(&id) {
            None => Ok(()),
            Some(Failure::Gone) => Err(Error::PeerInvalid("PEER_ID_INVALID".into())),
            Some(Failure::Other) => Err(Error::TelegramError("INTERNAL".into())),
            Some(Failure::Flood { times, seconds }) => {
                if *times == 0 {
                    return Ok(());
                }
                *times -= 1;
                Err(Error::FloodWait { seconds: *seconds })
            }
        }
    }

    fn lookup(&self, target: &EntityRef) -> Option<RemoteEntity> {
        if let Some(entity) = self.resolvable.get(&target.cache_key()) {
            return Some(entity.clone());
        }
        self.dialogs
            .iter()
            .find(|e| match target {
                EntityRef::Username(name) => e.username.as_deref() == Some(name.as_str()),
                EntityRef::Id(id) => e.id == *id,
                EntityRef::User { id, .. } => e.id == *id,
            })
            .cloned()
    }
}

#[async_trait]
impl RemoteClient for MockRemote {
    async fn dialogs(&self) -> Result<Vec<RemoteEntity>> {
        self.record(Call::Dialogs);
        if self.dialogs_fail {
            return Err(Error::TelegramError("AUTH_KEY_UNREGISTERED".into()));
        }
        Ok(self.dialogs.clone())
    }

    async fn resolve(&self, target: &EntityRef) -> Result<RemoteEntity> {
        self.record(Call::Resolve(target.cache_key()));
        self.lookup(target)
            .ok_or_else(|| Error::PeerInvalid(format!("USERNAME_NOT_OCCUPIED {}", target)))
    }

    async fn send_message(&self, target: &RemoteEntity, text: &str) -> Result<()> {
        self.record(Call::Send(target.id, text.to_string()));
        match self.replies.get(&target.id) {
            Some(BotReply::SendFails) => Err(Error::TelegramError("YOU_BLOCKED_USER".into())),
            _ => Ok(()),
        }
    }

    async fn recent_messages(
        &self,
        target: &RemoteEntity,
        limit: usize,
    ) -> Result<Vec<RemoteMessage>> {
        self.record(Call::Recent(target.id, limit));
        let probe = RemoteMessage {
            id: 1,
            text: "/start".into(),
        };
        let messages = match self.replies.get(&target.id) {
            Some(BotReply::Text(text)) => vec![
                RemoteMessage {
                    id: 2,
                    text: text.clone(),
                },
                probe,
            ],
            _ => vec![probe],
        };
        Ok(messages.into_iter().take(limit).collect())
    }

    async fn delete_history(&self, target: &RemoteEntity, revoke: bool) -> Result<()> {
        self.record(Call::DeleteHistory(target.id, revoke));
        self.check_failure(target.id)
    }

    async fn leave_channel(&self, target: &RemoteEntity) -> Result<()> {
        self.record(Call::Leave(target.id));
        self.check_failure(target.id)
    }
}

pub fn bot(id: i64, username: Option<&str>) -> RemoteEntity {
    RemoteEntity {
        id,
        access_hash: Some(id * 10),
        username: username.map(str::to_string),
        name: format!("Bot {}", id),
        kind: EntityKind::User {
            bot: true,
            deleted: false,
        },
    }
}

pub fn user(id: i64, access_hash: Option<i64>, deleted: bool) -> RemoteEntity {
    RemoteEntity {
        id,
        access_hash,
        username: None,
        name: if deleted {
            String::new()
        } else {
            format!("User {}", id)
        },
        kind: EntityKind::User {
            bot: false,
            deleted,
        },
    }
}

pub fn channel(id: i64, username: &str) -> RemoteEntity {
    RemoteEntity {
        id,
        access_hash: Some(id * 10),
        username: Some(username.to_string()),
        name: format!("Channel {}", id),
        kind: EntityKind::Channel { megagroup: false },
    }
}

/// Settings that keep paused-clock tests short and deterministic.
pub fn fast_governor() -> GovernorSettings {
    GovernorSettings {
        max_rate: 1_000,
        period: Duration::from_secs(60),
        ..GovernorSettings::default()
    }
}

pub struct Harness {
    pub dir: TempDir,
    pub ctx: CleanerContext<MockRemote>,
}

impl Harness {
    pub fn new(mock: MockRemote) -> Self {
        Self::with_executor(mock, ExecutorSettings::default())
    }

    pub fn with_executor(mock: MockRemote, executor: ExecutorSettings) -> Self {
        Self::with_settings(mock, fast_governor(), executor)
    }

    pub fn with_settings(
        mock: MockRemote,
        governor: GovernorSettings,
        executor: ExecutorSettings,
    ) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let storage = DataStorage::new(dir.path()).expect("storage");
        let ctx = CleanerContext::with_settings(
            mock,
            storage,
            governor,
            Duration::from_secs(3600),
            executor,
            ProbeSettings::default(),
        );
        Self { dir, ctx }
    }

    pub fn mock(&self) -> &MockRemote {
        self.ctx.client()
    }

    pub fn storage(&self) -> &DataStorage {
        self.ctx.storage()
    }
}
