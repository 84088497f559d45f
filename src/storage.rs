//! Flat-file persistence for scan results and credentials.
//!
//! Every save rewrites the whole file through a temporary sibling that is
//! renamed into place, so an interrupted run never leaves a truncated file.

use std::collections::BTreeSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use tracing::{debug, warn};

use crate::error::{Error, Result};

pub const SEEN_BOTS_FILE: &str = "seen_bots.txt";
pub const DEAD_BOTS_FILE: &str = "dead_bots.txt";
pub const DELETED_ACCOUNTS_FILE: &str = "deleted_accounts.txt";
pub const CREDENTIALS_FILE: &str = "credentials.txt";

/// Files produced by the scans, removed by the cleanup action.
pub const SCAN_FILES: [&str; 3] = [DELETED_ACCOUNTS_FILE, DEAD_BOTS_FILE, SEEN_BOTS_FILE];

/// A deleted account found in the dialogs: user id plus the access hash
/// needed to address it later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeletedAccount {
    pub user_id: i64,
    pub access_hash: i64,
}

impl fmt::Display for DeletedAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.user_id, self.access_hash)
    }
}

impl FromStr for DeletedAccount {
    type Err = Error;

    fn from_str(line: &str) -> Result<Self> {
        let mut parts = line.trim().split(',').map(str::trim);
        let user_id = parts.next().and_then(|p| p.parse::<i64>().ok());
        let access_hash = parts.next().and_then(|p| p.parse::<i64>().ok());
        match (user_id, access_hash) {
            (Some(user_id), Some(access_hash)) => Ok(Self {
                user_id,
                access_hash,
            }),
            _ => Err(Error::InvalidRecord(line.to_string())),
        }
    }
}

/// API credentials pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub api_id: String,
    pub api_hash: String,
}

/// Data directory holding the cleaner's text files.
#[derive(Debug, Clone)]
pub struct DataStorage {
    data_dir: PathBuf,
}

impl DataStorage {
    /// Open (and create if needed) the data directory.
    pub fn new(data_dir: impl Into<PathBuf>) -> Result<Self> {
        let data_dir = data_dir.into();
        fs::create_dir_all(&data_dir)?;
        Ok(Self { data_dir })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.data_dir.join(name)
    }

    /// Load a newline-delimited set. Missing file means an empty set.
    pub fn load_set(&self, name: &str) -> Result<BTreeSet<String>> {
        let Some(content) = self.read_optional(name)? else {
            return Ok(BTreeSet::new());
        };
        Ok(content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }

    /// Save a set, one sorted entry per line.
    pub fn save_set(&self, name: &str, set: &BTreeSet<String>) -> Result<()> {
        let mut payload = String::new();
        for entry in set {
            payload.push_str(entry);
            payload.push('\n');
        }
        self.write_atomic(name, &payload)
    }

    /// Load `user_id,access_hash` records, skipping malformed lines.
    pub fn load_records(&self, name: &str) -> Result<Vec<DeletedAccount>> {
        let Some(content) = self.read_optional(name)? else {
            return Ok(Vec::new());
        };

        let mut records = Vec::new();
        for (idx, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match line.parse::<DeletedAccount>() {
                Ok(record) => records.push(record),
                Err(err) => warn!("{} line {}: {}", name, idx + 1, err),
            }
        }
        Ok(records)
    }

    pub fn save_records(&self, name: &str, records: &[DeletedAccount]) -> Result<()> {
        let payload: String = records.iter().map(|r| format!("{}\n", r)).collect();
        self.write_atomic(name, &payload)
    }

    /// Load the `api_id,api_hash` pair, if present and well-formed.
    pub fn load_credentials(&self) -> Result<Option<Credentials>> {
        let Some(content) = self.read_optional(CREDENTIALS_FILE)? else {
            return Ok(None);
        };
        let parts: Vec<&str> = content.trim().split(',').map(str::trim).collect();
        match parts.as_slice() {
            [api_id, api_hash] if !api_id.is_empty() && !api_hash.is_empty() => {
                Ok(Some(Credentials {
                    api_id: api_id.to_string(),
                    api_hash: api_hash.to_string(),
                }))
            }
            _ => {
                warn!("{} is malformed, ignoring it", CREDENTIALS_FILE);
                Ok(None)
            }
        }
    }

    pub fn save_credentials(&self, api_id: &str, api_hash: &str) -> Result<()> {
        self.write_atomic(CREDENTIALS_FILE, &format!("{},{}", api_id, api_hash))
    }

    /// Remove a file from the data directory. Returns whether it existed.
    pub fn remove(&self, name: &str) -> Result<bool> {
        match fs::remove_file(self.path(name)) {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    fn read_optional(&self, name: &str) -> Result<Option<String>> {
        match fs::read_to_string(self.path(name)) {
            Ok(content) => Ok(Some(content)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn write_atomic(&self, name: &str, payload: &str) -> Result<()> {
        let target = self.path(name);
        let tmp = self.path(&format!(".{}.tmp", name));
        fs::write(&tmp, payload)?;
        fs::rename(&tmp, &target)?;
        debug!(file = %target.display(), bytes = payload.len(), "Saved");
        Ok(())
    }
}
