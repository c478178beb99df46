//! Key ownership and active-key selection.
//!
//! This module owns two responsibilities:
//! 1. Holding symmetric key material (diary keys and entity keys) in a type
//!    that is opaque, non-cloneable, and zeroised on drop.
//! 2. Picking the single active diary key out of the key records a server
//!    returns for a diary, and unwrapping it with the owner's credentials.
//!
//! ## Key hierarchy
//!
//! ```text
//! owner X25519 keypair
//!   └─ DiaryKey      (sealed box, one active per diary)
//!        └─ EntityKey (AES-256-GCM, fresh per entity write)
//!             └─ details / preview blobs (AES-256-GCM)
//! ```

use std::fmt;

use tracing::debug;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::credentials::Credentials;
use crate::crypto::KEY_LEN;
use crate::envelope;
use crate::error::ZkDiaryError;
use crate::wire::{DiaryEncryptionKey, KeyStatus};

/// Server-assigned identifier of one diary key.
pub type DiaryKeyId = String;

// ---------------------------------------------------------------------------
// Symmetric key
// ---------------------------------------------------------------------------

/// A 256-bit AES key. Used for both diary keys and entity keys.
///
/// - Not `Clone`. Key material is moved or borrowed, never duplicated.
/// - Zeroised on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SymmetricKey {
    bytes: [u8; KEY_LEN],
}

impl SymmetricKey {
    /// Wrap raw key bytes.
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self { bytes }
    }

    /// Wrap a byte slice, rejecting anything that is not exactly 32 bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, ZkDiaryError> {
        let bytes: [u8; KEY_LEN] = bytes.try_into().map_err(|_| ZkDiaryError::InvalidKeyLength {
            expected: KEY_LEN,
            actual: bytes.len(),
        })?;
        Ok(Self { bytes })
    }

    /// Borrow the raw key bytes for use in encrypt/decrypt operations.
    ///
    /// Raw bytes never leave the crate.
    pub(crate) fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.bytes
    }
}

impl PartialEq for SymmetricKey {
    fn eq(&self, other: &Self) -> bool {
        // Constant time over the full key.
        self.bytes
            .iter()
            .zip(other.bytes.iter())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
    }
}

impl Eq for SymmetricKey {}

impl fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SymmetricKey(<redacted>)")
    }
}

// ---------------------------------------------------------------------------
// Active diary key
// ---------------------------------------------------------------------------

/// The unwrapped, currently active key of one diary.
#[derive(Debug)]
pub struct ActiveDiaryKey {
    pub id: DiaryKeyId,
    pub key: SymmetricKey,
}

/// Return the one record with status `Active`.
///
/// Historical keys may coexist with the active one; anything other than
/// exactly one active record is a broken invariant and yields
/// `NoActiveKey` carrying the number of active records seen.
pub fn select_active(records: &[DiaryEncryptionKey]) -> Result<&DiaryEncryptionKey, ZkDiaryError> {
    let mut active = records.iter().filter(|r| r.status == KeyStatus::Active);
    match (active.next(), active.next()) {
        (Some(record), None) => Ok(record),
        (None, _) => Err(ZkDiaryError::NoActiveKey(0)),
        (Some(_), Some(_)) => Err(ZkDiaryError::NoActiveKey(2 + active.count())),
    }
}

/// Select the active record and unwrap it with the owner's credentials.
pub fn active_diary_key(
    records: &[DiaryEncryptionKey],
    credentials: &Credentials,
) -> Result<ActiveDiaryKey, ZkDiaryError> {
    let record = select_active(records)?;
    debug!(diary_key_id = %record.id, "selected active diary key");

    let key = envelope::open_diary_key(
        &record.value,
        credentials.encryption_private_key(),
        credentials.encryption_public_key(),
    )?;

    Ok(ActiveDiaryKey {
        id: record.id.clone(),
        key,
    })
}
