//! Per-entity encrypt/decrypt pipelines.
//!
//! Each entity type has the same two directions:
//!
//! - `to_plaintext`: server representation + raw DiaryKey -> plaintext entity
//! - `to_encrypted_request`: plaintext params + active DiaryKey + version ->
//!   signed write request
//!
//! Reads need only the unwrapped DiaryKey. Writes additionally need the
//! caller's credentials, to sign the canonical request body.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::crypto::EncryptedBlob;
use crate::envelope;
use crate::error::ZkDiaryError;
use crate::keys::{ActiveDiaryKey, SymmetricKey};
use crate::wire::DiaryEncryption;

pub mod diary;
pub mod entry;
pub mod template;
pub mod topic;

/// A fresh client-chosen identifier for an entry, topic or template.
pub fn new_entity_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

fn seal_details<T: Serialize>(
    details: &T,
    diary_key: &ActiveDiaryKey,
) -> Result<(DiaryEncryption, EncryptedBlob), ZkDiaryError> {
    envelope::seal_for_key(details, &diary_key.id, &diary_key.key)
}

fn open_details<T: DeserializeOwned>(
    details: &EncryptedBlob,
    encryption: &DiaryEncryption,
    diary_key: &SymmetricKey,
) -> Result<T, ZkDiaryError> {
    envelope::open_entity(details, &encryption.key_blob(), diary_key)
}
