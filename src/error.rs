//! Error types for the Telegram cleaner

use thiserror::Error;

/// RPC error names that mean the peer cannot be resolved or no longer exists.
const GONE_RPC_ERRORS: &[&str] = &[
    "PEER_ID_INVALID",
    "USER_ID_INVALID",
    "CHANNEL_INVALID",
    "CHANNEL_PRIVATE",
    "CHAT_ID_INVALID",
    "USERNAME_NOT_OCCUPIED",
    "USERNAME_INVALID",
    "INPUT_USER_DEACTIVATED",
];

#[derive(Error, Debug)]
pub enum Error {
    #[error("Session file not found: {0}")]
    SessionNotFound(String),

    #[error("Session is locked by another process")]
    SessionLocked,

    #[error("Failed to acquire session lock: {0}")]
    LockError(String),

    #[error("Flood wait: retry after {seconds}s")]
    FloodWait { seconds: u64 },

    #[error("Peer invalid or unreachable: {0}")]
    PeerInvalid(String),

    #[error("Telegram API error: {0}")]
    TelegramError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Authorization required")]
    AuthorizationRequired,
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Wait hint carried by a flood error.
    pub fn flood_wait_seconds(&self) -> Option<u64> {
        match self {
            Error::FloodWait { seconds } => Some(*seconds),
            _ => None,
        }
    }

    /// True when the target entity is invalid or already gone.
    pub fn is_gone(&self) -> bool {
        matches!(self, Error::PeerInvalid(_))
    }

    /// Classify an error reported only as text (RPC name plus optional value).
    pub fn from_rpc_text(text: &str) -> Self {
        if let Some(seconds) = parse_flood_wait_seconds(text) {
            return Error::FloodWait { seconds };
        }
        if GONE_RPC_ERRORS.iter().any(|name| text.contains(name)) {
            return Error::PeerInvalid(text.to_string());
        }
        Error::TelegramError(text.to_string())
    }
}

/// Extract flood wait seconds from an error string (best-effort)
pub fn parse_flood_wait_seconds(error: &str) -> Option<u64> {
    for marker in ["FLOOD_WAIT_", "FLOOD_PREMIUM_WAIT_"] {
        if let Some(idx) = error.find(marker) {
            let start = idx + marker.len();
            let secs = error[start..]
                .chars()
                .take_while(|c| c.is_ascii_digit())
                .collect::<String>();
            if let Ok(v) = secs.parse::<u64>() {
                return Some(v);
            }
        }
    }

    if error.contains("FLOOD_WAIT") || error.contains("FLOOD_PREMIUM_WAIT") {
        if let Some(idx) = error.find("value:") {
            let start = idx + "value:".len();
            let secs = error[start..]
                .trim_start()
                .trim_start_matches("Some(")
                .chars()
                .take_while(|c| c.is_ascii_digit())
                .collect::<String>();
            if let Ok(v) = secs.parse::<u64>() {
                return Some(v);
            }
        }
    }

    None
}

impl From<grammers_client::InvocationError> for Error {
    fn from(err: grammers_client::InvocationError) -> Self {
        match &err {
            grammers_client::InvocationError::Rpc(rpc) => {
                if rpc.name.starts_with("FLOOD_WAIT") || rpc.name.starts_with("FLOOD_PREMIUM_WAIT")
                {
                    Error::FloodWait {
                        seconds: rpc.value.map(u64::from).unwrap_or(1),
                    }
                } else if GONE_RPC_ERRORS.contains(&rpc.name.as_str()) {
                    Error::PeerInvalid(rpc.name.clone())
                } else {
                    Error::TelegramError(err.to_string())
                }
            }
            _ => Error::from_rpc_text(&err.to_string()),
        }
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::ConfigError(err.to_string())
    }
}
