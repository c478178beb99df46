//! Diary pipeline.
//!
//! A diary is the only entity that owns key material: creating one
//! generates its DiaryKey and seals it to the owner's encryption key.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::credentials::Credentials;
use crate::crypto;
use crate::envelope;
use crate::error::ZkDiaryError;
use crate::keys::{self, ActiveDiaryKey, SymmetricKey};
use crate::signature::SignedRequest;
use crate::version::Version;
use crate::wire::{self, CreateDiaryRequest, EntityKeyEnvelope, PutDiaryRequest};

/// A decrypted diary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diary {
    pub id: String,
    pub title: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: u64,
}

/// The encrypted part of a diary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiaryDetails {
    pub title: String,
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PutDiaryParams {
    pub title: String,
    pub description: String,
}

impl PutDiaryParams {
    pub fn details(&self) -> DiaryDetails {
        DiaryDetails {
            title: self.title.clone(),
            description: self.description.clone(),
        }
    }
}

pub type CreateDiaryParams = PutDiaryParams;

pub fn to_plaintext(diary: &wire::Diary, diary_key: &SymmetricKey) -> Result<Diary, ZkDiaryError> {
    let details: DiaryDetails =
        super::open_details(&diary.details, &diary.encryption, diary_key)?;
    Ok(Diary {
        id: diary.id.clone(),
        title: details.title,
        description: details.description,
        created_at: diary.created_at,
        updated_at: diary.updated_at,
        version: diary.version,
    })
}

pub fn to_encrypted_request(
    params: &PutDiaryParams,
    diary_key: &ActiveDiaryKey,
    version: Version,
    credentials: &Credentials,
) -> Result<SignedRequest<PutDiaryRequest>, ZkDiaryError> {
    let (encryption, details) = super::seal_details(&params.details(), diary_key)?;
    SignedRequest::new(
        PutDiaryRequest {
            version,
            details,
            encryption,
        },
        credentials,
    )
}

/// Build a signed diary-creation request.
///
/// Generates the diary's first DiaryKey and returns it alongside the request
/// so the caller can encrypt follow-up writes without a round trip. The
/// server assigns the key's id.
pub fn to_create_request(
    params: &CreateDiaryParams,
    credentials: &Credentials,
) -> Result<(SignedRequest<CreateDiaryRequest>, SymmetricKey), ZkDiaryError> {
    let diary_key = crypto::generate_key()?;
    let sealed = envelope::seal_entity(&params.details(), &diary_key)?;
    let encrypted_diary_key =
        envelope::seal_diary_key(&diary_key, credentials.encryption_public_key())?;

    let request = CreateDiaryRequest {
        encrypted_diary_key,
        details: sealed.details,
        encryption: EntityKeyEnvelope {
            encrypted_key_data: sealed.key_envelope.data,
            encrypted_key_nonce: sealed.key_envelope.nonce,
        },
    };
    Ok((SignedRequest::new(request, credentials)?, diary_key))
}

/// Unwrap the DiaryKey a diary's details were sealed under.
///
/// Uses the key record named by the diary's own envelope, falling back to
/// the single active record if that id is not listed.
pub fn unwrap_diary_key(
    diary: &wire::Diary,
    credentials: &Credentials,
) -> Result<ActiveDiaryKey, ZkDiaryError> {
    let wanted = &diary.encryption.diary_key_id;
    let Some(record) = diary.encryption_keys.iter().find(|r| &r.id == wanted) else {
        debug!(
            diary_id = %diary.id,
            diary_key_id = %wanted,
            "envelope key not listed, using active key"
        );
        return keys::active_diary_key(&diary.encryption_keys, credentials);
    };

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

/// Unwrap the diary's key and decrypt it in one step.
pub fn open(diary: &wire::Diary, credentials: &Credentials) -> Result<Diary, ZkDiaryError> {
    let diary_key = unwrap_diary_key(diary, credentials)?;
    to_plaintext(diary, &diary_key.key)
}
