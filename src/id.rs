//! # Record keys
//!
//! Every stored dog or food item is named by a 12-byte key rendered as 24
//! lowercase hex characters.
//!
//! ## Layout
//! - 4 bytes: seconds since the epoch, big-endian
//! - 5 bytes: random, fixed for the lifetime of the process
//! - 3 bytes: wrapping counter, seeded randomly
//!
//! Sorting keys as strings therefore roughly sorts records by creation time,
//! which is what list endpoints fall back on when two records tie.
use std::{
    fmt,
    str::FromStr,
    sync::{
        LazyLock,
        atomic::{AtomicU32, Ordering},
    },
};

use chrono::Utc;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer, de};
use thiserror::Error;

static KEY_FORMAT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[0-9a-fA-F]{24}$").unwrap());

static PROCESS_BYTES: LazyLock<[u8; 5]> = LazyLock::new(rand::random);

static COUNTER: LazyLock<AtomicU32> = LazyLock::new(|| AtomicU32::new(rand::random::<u32>()));

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("`{0}` is not a valid record key")]
pub struct InvalidKey(pub String);

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RecordId(String);

impl RecordId {
    pub fn generate() -> Self {
        let seconds = Utc::now().timestamp() as u32;
        let count = COUNTER.fetch_add(1, Ordering::Relaxed) & 0x00ff_ffff;

        let mut bytes = [0u8; 12];
        bytes[..4].copy_from_slice(&seconds.to_be_bytes());
        bytes[4..9].copy_from_slice(&*PROCESS_BYTES);
        bytes[9..].copy_from_slice(&count.to_be_bytes()[1..]);

        Self(bytes.iter().map(|byte| format!("{byte:02x}")).collect())
    }

    pub fn is_well_formed(raw: &str) -> bool {
        KEY_FORMAT.is_match(raw)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for RecordId {
    type Err = InvalidKey;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        if !Self::is_well_formed(raw) {
            return Err(InvalidKey(raw.to_string()));
        }

        Ok(Self(raw.to_ascii_lowercase()))
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for RecordId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for RecordId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}
