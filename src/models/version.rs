//! Version tokens stamped on data snapshots.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Minimum length above which an all-digit token is a backup timestamp.
const BACKUP_TOKEN_MIN_LEN: usize = 10;

/// Opaque version string.
///
/// Two shapes matter: a short "fresh" token such as a semantic version, and a
/// backup token, a millisecond epoch written by an export (all digits, longer
/// than ten characters). `"0"` means nothing has been stored yet.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionToken(String);

impl VersionToken {
    pub const UNSET: &'static str = "0";

    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn unset() -> Self {
        Self(Self::UNSET.to_string())
    }

    /// A backup token for the current wall-clock time.
    pub fn now() -> Self {
        Self(Utc::now().timestamp_millis().to_string())
    }

    /// Read a token from an untrusted JSON field. Strings and numbers are
    /// accepted; anything else yields an empty token.
    pub fn from_json(value: Option<&Value>) -> Self {
        match value {
            Some(Value::String(s)) => Self(s.clone()),
            Some(Value::Number(n)) => Self(n.to_string()),
            _ => Self::default(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn is_unset(&self) -> bool {
        self.0 == Self::UNSET
    }

    pub fn is_backup_shaped(&self) -> bool {
        self.0.len() > BACKUP_TOKEN_MIN_LEN && self.0.bytes().all(|b| b.is_ascii_digit())
    }

    /// Numeric value of a backup-shaped token.
    pub fn timestamp(&self) -> Option<u128> {
        if self.is_backup_shaped() {
            self.0.parse().ok()
        } else {
            None
        }
    }
}

impl std::fmt::Display for VersionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for VersionToken {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}
