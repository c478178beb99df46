//! Optimistic-concurrency versions.
//!
//! A version is a millisecond Unix timestamp. Values outside
//! `[2020-01-01T00:00:00Z, 2100-01-01T00:00:00Z]` are rejected before a
//! request is ever signed.

use std::fmt;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::ZkDiaryError;

/// 2020-01-01T00:00:00Z in milliseconds.
pub const MIN_VALID_VERSION: u64 = 1_577_836_800_000;

/// 2100-01-01T00:00:00Z in milliseconds.
pub const MAX_VALID_VERSION: u64 = 4_102_444_800_000;

/// A validated entity version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u64", into = "u64")]
pub struct Version(u64);

impl Version {
    /// Validate a raw version.
    pub fn new(version: u64) -> Result<Self, ZkDiaryError> {
        validate_version(version)?;
        Ok(Self(version))
    }

    /// A version stamped with the current wall-clock time.
    pub fn now() -> Self {
        // Milliseconds since the epoch are positive and inside the window
        // for any clock set after 2020.
        let millis = Utc::now().timestamp_millis().max(0) as u64;
        Self(millis.clamp(MIN_VALID_VERSION, MAX_VALID_VERSION))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl TryFrom<u64> for Version {
    type Error = ZkDiaryError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Version> for u64 {
    fn from(version: Version) -> Self {
        version.0
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Check that a version lies inside the sanity window.
pub fn validate_version(version: u64) -> Result<(), ZkDiaryError> {
    if version < MIN_VALID_VERSION {
        return Err(ZkDiaryError::InvalidVersion {
            version,
            reason: "must be >= 2020-01-01",
        });
    }
    if version > MAX_VALID_VERSION {
        return Err(ZkDiaryError::InvalidVersion {
            version,
            reason: "must be <= 2100-01-01",
        });
    }
    Ok(())
}
