//! Entry pipeline.
//!
//! An entry carries two payloads under one EntityKey: the full details and a
//! preview. The preview currently holds the same content as the details but
//! is sealed on its own, with its own nonce.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::credentials::Credentials;
use crate::envelope;
use crate::error::ZkDiaryError;
use crate::keys::{ActiveDiaryKey, SymmetricKey};
use crate::signature::SignedRequest;
use crate::version::Version;
use crate::wire::{self, PutEntryRequest};

/// A decrypted entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub id: String,
    pub diary_id: String,
    pub content: String,
    pub topic_id: Option<String>,
    pub archived: bool,
    pub bookmarked: bool,
    pub preview_hidden: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub version: u64,
}

impl Entry {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryDetails {
    pub content: String,
    pub archived: bool,
    pub bookmarked: bool,
    pub preview_hidden: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PutEntryParams {
    pub content: String,
    pub topic_id: Option<String>,
    pub archived: bool,
    pub bookmarked: bool,
    pub preview_hidden: bool,
}

impl PutEntryParams {
    pub fn details(&self) -> EntryDetails {
        EntryDetails {
            content: self.content.clone(),
            archived: self.archived,
            bookmarked: self.bookmarked,
            preview_hidden: self.preview_hidden,
        }
    }

    /// Same content as [`details`](Self::details) for now.
    pub fn preview(&self) -> EntryDetails {
        self.details()
    }
}

pub type CreateEntryParams = PutEntryParams;

pub fn to_plaintext(entry: &wire::Entry, diary_key: &SymmetricKey) -> Result<Entry, ZkDiaryError> {
    let details: EntryDetails = super::open_details(&entry.details, &entry.encryption, diary_key)?;
    Ok(Entry {
        id: entry.id.clone(),
        diary_id: entry.diary_id.clone(),
        content: details.content,
        topic_id: entry.topic_id.clone(),
        archived: details.archived,
        bookmarked: details.bookmarked,
        preview_hidden: details.preview_hidden,
        created_at: entry.created_at,
        updated_at: entry.updated_at,
        deleted_at: entry.deleted_at,
        version: entry.version,
    })
}

/// Decrypt only the preview payload of an entry.
pub fn preview_to_plaintext(
    entry: &wire::Entry,
    diary_key: &SymmetricKey,
) -> Result<EntryDetails, ZkDiaryError> {
    envelope::open_preview(&entry.preview, &entry.encryption.key_blob(), diary_key)
}

pub fn to_encrypted_request(
    params: &PutEntryParams,
    diary_key: &ActiveDiaryKey,
    version: Version,
    credentials: &Credentials,
) -> Result<SignedRequest<PutEntryRequest>, ZkDiaryError> {
    let sealed = envelope::seal_entry(&params.details(), &params.preview(), &diary_key.key)?;
    let request = PutEntryRequest {
        version,
        topic_id: params.topic_id.clone(),
        encryption: sealed.entity.encryption(&diary_key.id),
        details: sealed.entity.details,
        preview: sealed.preview,
    };
    SignedRequest::new(request, credentials)
}
