//! Three-tier envelope encryption.
//!
//! The envelope defines how an entity's plaintext is sealed (bottom-up) and
//! opened (top-down):
//!
//! ```text
//! seal:  details --EntityKey--> details blob
//!        EntityKey --DiaryKey--> key envelope
//!        DiaryKey --owner X25519 public key--> sealed diary key  (once per diary key)
//!
//! open:  sealed diary key --owner keypair--> DiaryKey
//!        key envelope --DiaryKey--> EntityKey
//!        details blob --EntityKey--> details
//! ```
//!
//! Every entity write gets a fresh EntityKey, so rotating a DiaryKey only
//! means re-wrapping the small key envelopes, never re-encrypting content.
//! A failure at any layer aborts the whole operation; no partially opened
//! entity is ever returned.

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

use crate::crypto::{self, EncryptedBlob, KEY_LEN};
use crate::error::{Stage, ZkDiaryError};
use crate::keys::{DiaryKeyId, SymmetricKey};
use crate::sealer;
use crate::wire::DiaryEncryption;

/// The sealed form of one entity revision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedEntity {
    /// Content sealed under the EntityKey.
    pub details: EncryptedBlob,
    /// The EntityKey sealed under the DiaryKey.
    pub key_envelope: EncryptedBlob,
}

impl SealedEntity {
    /// Attach the id of the diary key the envelope was sealed under.
    pub fn encryption(&self, diary_key_id: &str) -> DiaryEncryption {
        DiaryEncryption::from_blob(diary_key_id.to_string(), self.key_envelope.clone())
    }
}

/// An entry revision: details plus an independently sealed preview under the
/// same EntityKey.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedEntry {
    pub entity: SealedEntity,
    pub preview: EncryptedBlob,
}

fn seal_json<T: Serialize>(
    value: &T,
    key: &SymmetricKey,
    stage: Stage,
) -> Result<EncryptedBlob, ZkDiaryError> {
    let plaintext = zeroize::Zeroizing::new(serde_json::to_vec(value)?);
    crypto::seal(&plaintext, key).map_err(|e| e.at(stage))
}

fn open_json<T: DeserializeOwned>(
    blob: &EncryptedBlob,
    key: &SymmetricKey,
    stage: Stage,
) -> Result<T, ZkDiaryError> {
    let plaintext = zeroize::Zeroizing::new(crypto::open(blob, key).map_err(|e| e.at(stage))?);
    Ok(serde_json::from_slice(&plaintext)?)
}

fn wrap_entity_key(
    entity_key: &SymmetricKey,
    diary_key: &SymmetricKey,
) -> Result<EncryptedBlob, ZkDiaryError> {
    crypto::seal(entity_key.as_bytes(), diary_key).map_err(|e| e.at(Stage::EntityKey))
}

fn unwrap_entity_key(
    key_envelope: &EncryptedBlob,
    diary_key: &SymmetricKey,
) -> Result<SymmetricKey, ZkDiaryError> {
    let raw = zeroize::Zeroizing::new(
        crypto::open(key_envelope, diary_key).map_err(|e| e.at(Stage::EntityKey))?,
    );
    // A well-authenticated envelope of the wrong size is corrupt, not a
    // caller error.
    SymmetricKey::from_slice(&raw).map_err(|_| ZkDiaryError::DecryptionFailed(Stage::EntityKey))
}

/// Seal one entity's details under a fresh EntityKey wrapped by `diary_key`.
pub fn seal_entity<T: Serialize>(
    details: &T,
    diary_key: &SymmetricKey,
) -> Result<SealedEntity, ZkDiaryError> {
    let entity_key = crypto::generate_key()?;
    let details = seal_json(details, &entity_key, Stage::Details)?;
    let key_envelope = wrap_entity_key(&entity_key, diary_key)?;
    Ok(SealedEntity {
        details,
        key_envelope,
    })
}

/// Seal an entry's details and preview with one fresh EntityKey.
///
/// The two payloads are sealed independently (distinct nonces) even when
/// their content is identical.
pub fn seal_entry<D, P>(
    details: &D,
    preview: &P,
    diary_key: &SymmetricKey,
) -> Result<SealedEntry, ZkDiaryError>
where
    D: Serialize,
    P: Serialize,
{
    let entity_key = crypto::generate_key()?;
    let details = seal_json(details, &entity_key, Stage::Details)?;
    let preview = seal_json(preview, &entity_key, Stage::Preview)?;
    let key_envelope = wrap_entity_key(&entity_key, diary_key)?;
    Ok(SealedEntry {
        entity: SealedEntity {
            details,
            key_envelope,
        },
        preview,
    })
}

/// Open an entity: unwrap its EntityKey with `diary_key`, then its details.
pub fn open_entity<T: DeserializeOwned>(
    details: &EncryptedBlob,
    key_envelope: &EncryptedBlob,
    diary_key: &SymmetricKey,
) -> Result<T, ZkDiaryError> {
    let entity_key = unwrap_entity_key(key_envelope, diary_key).inspect_err(|e| {
        warn!(error = %e, "entity key envelope rejected");
    })?;
    open_json(details, &entity_key, Stage::Details)
}

/// Open an entry's preview blob with the same EntityKey as its details.
pub fn open_preview<T: DeserializeOwned>(
    preview: &EncryptedBlob,
    key_envelope: &EncryptedBlob,
    diary_key: &SymmetricKey,
) -> Result<T, ZkDiaryError> {
    let entity_key = unwrap_entity_key(key_envelope, diary_key)?;
    open_json(preview, &entity_key, Stage::Preview)
}

/// Re-seal an EntityKey under a new DiaryKey. The content blob it protects
/// is untouched.
pub fn rewrap_entity_key(
    key_envelope: &EncryptedBlob,
    old_diary_key: &SymmetricKey,
    new_diary_key: &SymmetricKey,
) -> Result<EncryptedBlob, ZkDiaryError> {
    let entity_key = unwrap_entity_key(key_envelope, old_diary_key)?;
    wrap_entity_key(&entity_key, new_diary_key)
}

/// Seal a DiaryKey to its owner's X25519 public key.
pub fn seal_diary_key(
    diary_key: &SymmetricKey,
    owner_public_key: &[u8],
) -> Result<Vec<u8>, ZkDiaryError> {
    sealer::seal_anonymous(diary_key.as_bytes(), owner_public_key)
}

/// Open a sealed DiaryKey with the owner's X25519 keypair.
pub fn open_diary_key(
    sealed: &[u8],
    owner_private_key: &[u8],
    owner_public_key: &[u8],
) -> Result<SymmetricKey, ZkDiaryError> {
    let raw = zeroize::Zeroizing::new(sealer::open_anonymous(
        sealed,
        owner_private_key,
        owner_public_key,
    )?);
    if raw.len() != KEY_LEN {
        return Err(ZkDiaryError::DecryptionFailed(Stage::DiaryKey));
    }
    SymmetricKey::from_slice(&raw)
}

/// A DiaryKey id paired with a freshly sealed entity, ready to be placed in
/// a write request.
pub fn seal_for_key<T: Serialize>(
    details: &T,
    diary_key_id: &DiaryKeyId,
    diary_key: &SymmetricKey,
) -> Result<(DiaryEncryption, EncryptedBlob), ZkDiaryError> {
    let sealed = seal_entity(details, diary_key)?;
    Ok((sealed.encryption(diary_key_id), sealed.details))
}
