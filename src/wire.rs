//! Wire payloads exchanged with the backend.
//!
//! Only the parts of the API schema the core touches live here: the
//! encrypted entity representations, the write requests that get signed,
//! the authentication messages, and the server's error body.
//!
//! Conventions: snake_case JSON, byte fields as padded standard base64,
//! absent optional fields omitted.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::crypto::EncryptedBlob;
use crate::error::ZkDiaryError;
use crate::keys::DiaryKeyId;
use crate::sealer::X25519_KEY_LEN;
use crate::signature::{SIGNATURE_LEN, VERIFYING_KEY_LEN};
use crate::version::{validate_version, Version};

/// Serde adapter for byte fields.
pub(crate) mod b64 {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S, T>(bytes: &T, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
        T: AsRef<[u8]>,
    {
        serializer.serialize_str(&STANDARD.encode(bytes.as_ref()))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded)
            .map_err(serde::de::Error::custom)
    }
}

/// Pre-flight checks a request must pass before it is signed.
pub trait Validate {
    fn validate(&self) -> Result<(), ZkDiaryError>;
}

fn invalid(reason: &str) -> ZkDiaryError {
    ZkDiaryError::InvalidRequest(reason.to_string())
}

fn require_blob(blob: &EncryptedBlob, field: &str) -> Result<(), ZkDiaryError> {
    if blob.nonce.is_empty() {
        return Err(invalid(&format!("{field}.nonce is required")));
    }
    if blob.data.is_empty() {
        return Err(invalid(&format!("{field}.data is required")));
    }
    Ok(())
}

fn is_usable_public_key(bytes: &[u8], len: usize) -> bool {
    bytes.len() == len && bytes.iter().any(|b| *b != 0)
}

/// The key must also decompress to a point on the Edwards curve.
fn is_usable_signing_key(bytes: &[u8]) -> bool {
    if !is_usable_public_key(bytes, VERIFYING_KEY_LEN) {
        return false;
    }
    <[u8; VERIFYING_KEY_LEN]>::try_from(bytes)
        .map(|key| ed25519_dalek::VerifyingKey::from_bytes(&key).is_ok())
        .unwrap_or(false)
}

// ---------------------------------------------------------------------------
// Key envelopes
// ---------------------------------------------------------------------------

/// An entity key sealed under a diary key whose id the server assigns.
/// Only used when creating a diary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityKeyEnvelope {
    #[serde(with = "b64")]
    pub encrypted_key_data: Vec<u8>,
    #[serde(with = "b64")]
    pub encrypted_key_nonce: Vec<u8>,
}

/// An entity key sealed under a named diary key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiaryEncryption {
    pub diary_key_id: DiaryKeyId,
    #[serde(with = "b64")]
    pub encrypted_key_nonce: Vec<u8>,
    #[serde(with = "b64")]
    pub encrypted_key_data: Vec<u8>,
}

impl DiaryEncryption {
    pub fn from_blob(diary_key_id: DiaryKeyId, blob: EncryptedBlob) -> Self {
        Self {
            diary_key_id,
            encrypted_key_nonce: blob.nonce,
            encrypted_key_data: blob.data,
        }
    }

    /// The sealed entity key as a blob.
    pub fn key_blob(&self) -> EncryptedBlob {
        EncryptedBlob {
            nonce: self.encrypted_key_nonce.clone(),
            data: self.encrypted_key_data.clone(),
        }
    }
}

impl Validate for DiaryEncryption {
    fn validate(&self) -> Result<(), ZkDiaryError> {
        if self.diary_key_id.is_empty() {
            return Err(invalid("diary key id is required"));
        }
        if self.encrypted_key_nonce.is_empty() {
            return Err(invalid("encrypted key nonce is required"));
        }
        if self.encrypted_key_data.is_empty() {
            return Err(invalid("encrypted key data is required"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyStatus {
    Active,
    Inactive,
    #[serde(other)]
    Unknown,
}

/// One diary key record: the diary key sealed to the owner's encryption
/// public key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiaryEncryptionKey {
    pub id: DiaryKeyId,
    #[serde(with = "b64")]
    pub value: Vec<u8>,
    pub status: KeyStatus,
}

// ---------------------------------------------------------------------------
// Write requests
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateDiaryRequest {
    #[serde(with = "b64")]
    pub encrypted_diary_key: Vec<u8>,
    pub details: EncryptedBlob,
    pub encryption: EntityKeyEnvelope,
}

impl Validate for CreateDiaryRequest {
    fn validate(&self) -> Result<(), ZkDiaryError> {
        if self.encrypted_diary_key.is_empty() {
            return Err(invalid("encrypted_diary_key is required"));
        }
        require_blob(&self.details, "details")?;
        if self.encryption.encrypted_key_data.is_empty()
            || self.encryption.encrypted_key_nonce.is_empty()
        {
            return Err(invalid("encryption is required"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PutDiaryRequest {
    pub version: Version,
    pub details: EncryptedBlob,
    pub encryption: DiaryEncryption,
}

impl Validate for PutDiaryRequest {
    fn validate(&self) -> Result<(), ZkDiaryError> {
        validate_version(self.version.get())?;
        self.encryption.validate()?;
        require_blob(&self.details, "details")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PutEntryRequest {
    pub version: Version,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic_id: Option<String>,
    pub encryption: DiaryEncryption,
    pub details: EncryptedBlob,
    pub preview: EncryptedBlob,
}

impl Validate for PutEntryRequest {
    fn validate(&self) -> Result<(), ZkDiaryError> {
        validate_version(self.version.get())?;
        self.encryption.validate()?;
        require_blob(&self.details, "details")?;
        require_blob(&self.preview, "preview")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PutTopicRequest {
    pub version: Version,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_template_id: Option<String>,
    pub encryption: DiaryEncryption,
    pub details: EncryptedBlob,
}

impl Validate for PutTopicRequest {
    fn validate(&self) -> Result<(), ZkDiaryError> {
        validate_version(self.version.get())?;
        self.encryption.validate()?;
        require_blob(&self.details, "details")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PutTemplateRequest {
    pub version: Version,
    pub encryption: DiaryEncryption,
    pub details: EncryptedBlob,
}

impl Validate for PutTemplateRequest {
    fn validate(&self) -> Result<(), ZkDiaryError> {
        validate_version(self.version.get())?;
        self.encryption.validate()?;
        require_blob(&self.details, "details")
    }
}

// ---------------------------------------------------------------------------
// Encrypted entities as the server returns them
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diary {
    pub id: String,
    pub encryption_keys: Vec<DiaryEncryptionKey>,
    pub encryption: DiaryEncryption,
    pub details: EncryptedBlob,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entry {
    pub id: String,
    pub diary_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic_id: Option<String>,
    pub encryption: DiaryEncryption,
    pub details: EncryptedBlob,
    pub preview: EncryptedBlob,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
    pub version: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Topic {
    pub id: String,
    pub diary_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_template_id: Option<String>,
    pub encryption: DiaryEncryption,
    pub details: EncryptedBlob,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
    pub version: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Template {
    pub id: String,
    pub diary_id: String,
    pub encryption: DiaryEncryption,
    pub details: EncryptedBlob,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
    pub version: u64,
}

// ---------------------------------------------------------------------------
// Authentication
// ---------------------------------------------------------------------------

#[derive(Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub login: String,
    pub password: String,
    #[serde(with = "b64")]
    pub signature_public_key: Vec<u8>,
    #[serde(with = "b64")]
    pub encryption_public_key: Vec<u8>,
}

impl fmt::Debug for RegisterRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisterRequest")
            .field("login", &self.login)
            .field("signature_public_key", &self.signature_public_key)
            .field("encryption_public_key", &self.encryption_public_key)
            .finish_non_exhaustive()
    }
}

impl Validate for RegisterRequest {
    fn validate(&self) -> Result<(), ZkDiaryError> {
        if self.login.trim().is_empty() {
            return Err(invalid("login must not be empty"));
        }
        if self.password.trim().is_empty() {
            return Err(invalid("password must not be empty"));
        }
        if !is_usable_public_key(&self.encryption_public_key, X25519_KEY_LEN)
            || !is_usable_signing_key(&self.signature_public_key)
        {
            return Err(ZkDiaryError::InvalidPublicKeyEncoding);
        }
        Ok(())
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub login: String,
    pub password: String,
}

impl fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginRequest")
            .field("login", &self.login)
            .finish_non_exhaustive()
    }
}

impl Validate for LoginRequest {
    fn validate(&self) -> Result<(), ZkDiaryError> {
        if self.login.is_empty() {
            return Err(invalid("login is required"));
        }
        if self.password.is_empty() {
            return Err(invalid("password is required"));
        }
        Ok(())
    }
}

/// A login challenge: sign `nonce` and return it under `challenge_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginResponse {
    pub challenge_id: String,
    #[serde(with = "b64")]
    pub nonce: Vec<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginVerifyRequest {
    pub challenge_id: String,
    #[serde(with = "b64")]
    pub signed_nonce: Vec<u8>,
}

impl Validate for LoginVerifyRequest {
    fn validate(&self) -> Result<(), ZkDiaryError> {
        if self.challenge_id.is_empty() {
            return Err(invalid("challenge_id is required"));
        }
        if self.signed_nonce.len() != SIGNATURE_LEN {
            return Err(invalid(&format!(
                "invalid signed_nonce length: expected {SIGNATURE_LEN}, got {}",
                self.signed_nonce.len()
            )));
        }
        Ok(())
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct LoginVerifyResponse {
    pub token: String,
}

impl fmt::Debug for LoginVerifyResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("LoginVerifyResponse { .. }")
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    DiaryLimitExceeded,
    DiaryNotFound,
    EntryNotFound,
    TopicNotFound,
    TemplateNotFound,
    InvalidSignature,
    AccountAlreadyExists,
    Forbidden,
    #[serde(other)]
    Unknown,
}

/// Body of a 4xx response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error_code: ErrorCode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ErrorResponse {
    pub fn new(error_code: ErrorCode) -> Self {
        Self {
            error_code,
            message: None,
        }
    }

    /// Map the server's code to the matching domain error. Unknown codes
    /// become a generic transport failure.
    pub fn into_error(self) -> ZkDiaryError {
        match self.error_code {
            ErrorCode::DiaryLimitExceeded => ZkDiaryError::DiaryLimitExceeded,
            ErrorCode::DiaryNotFound => ZkDiaryError::DiaryNotFound,
            ErrorCode::EntryNotFound => ZkDiaryError::EntryNotFound,
            ErrorCode::TopicNotFound => ZkDiaryError::TopicNotFound,
            ErrorCode::TemplateNotFound => ZkDiaryError::TemplateNotFound,
            ErrorCode::InvalidSignature => ZkDiaryError::InvalidSignature,
            ErrorCode::AccountAlreadyExists => ZkDiaryError::AccountAlreadyExists,
            ErrorCode::Forbidden => ZkDiaryError::Forbidden,
            ErrorCode::Unknown => ZkDiaryError::Transport(
                self.message.unwrap_or_else(|| "bad request".to_string()),
            ),
        }
    }
}
