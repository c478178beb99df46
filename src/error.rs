//! Error types for zkdiary.
//!
//! Every variant is a distinct failure mode of the client-side core.
//! Messages name *which* layer failed without revealing key material,
//! nonces or plaintext.

use std::fmt;

use thiserror::Error;

/// The layer of the envelope scheme an encryption or decryption failure
/// happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// A bare AEAD call with no envelope context.
    Payload,
    /// The asymmetric envelope around a diary key.
    DiaryKey,
    /// The symmetric envelope around an entity key.
    EntityKey,
    /// An entity's details blob.
    Details,
    /// An entry's preview blob.
    Preview,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Payload => "payload",
            Self::DiaryKey => "diary key",
            Self::EntityKey => "entity key",
            Self::Details => "details",
            Self::Preview => "preview",
        };
        f.write_str(name)
    }
}

/// The single error type for all zkdiary operations.
#[derive(Debug, Error)]
pub enum ZkDiaryError {
    /// An operation needing credentials ran outside an authenticated session.
    #[error("unauthorized")]
    Unauthorized,

    /// Logout was requested while no session was authenticated.
    #[error("not authenticated")]
    NotAuthenticated,

    /// Challenge verification was requested without a preceding login.
    #[error("no pending login challenge")]
    NoPendingChallenge,

    /// The login/password pair was rejected. Unknown users and wrong
    /// passwords are deliberately indistinguishable.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// The signed challenge was rejected.
    #[error("invalid challenge")]
    InvalidChallenge,

    #[error("account already exists")]
    AccountAlreadyExists,

    #[error("forbidden: insufficient permissions to perform action")]
    Forbidden,

    /// A key had the wrong length for its algorithm.
    #[error("invalid key length: expected {expected} bytes, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },

    /// A public key was not a usable curve point encoding.
    #[error("invalid public key encoding")]
    InvalidPublicKeyEncoding,

    #[error("seed phrase must not be empty")]
    InvalidSeedPhrase,

    #[error("encryption failed: {0}")]
    EncryptionFailed(Stage),

    /// Wrong key, tampered ciphertext or nonce, or a corrupted tag.
    #[error("decryption failed: {0}")]
    DecryptionFailed(Stage),

    #[error("key derivation failed")]
    KeyDerivationFailure,

    #[error("randomness source failed")]
    RandomnessFailure,

    /// A diary's key records did not contain exactly one active key.
    #[error("expected exactly one active diary key, found {0}")]
    NoActiveKey(usize),

    #[error("version {version} is out of range: {reason}")]
    InvalidVersion { version: u64, reason: &'static str },

    /// A request failed pre-flight validation and was never signed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("diary not found")]
    DiaryNotFound,

    #[error("entry not found")]
    EntryNotFound,

    #[error("topic not found")]
    TopicNotFound,

    #[error("template not found")]
    TemplateNotFound,

    #[error("diary limit exceeded")]
    DiaryLimitExceeded,

    /// The server refused a request signature. A request the client
    /// signed itself being refused is a bug, not a transient failure.
    #[error("invalid signature")]
    InvalidSignature,

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Any other failure reported by the transport collaborator.
    #[error("transport error: {0}")]
    Transport(String),
}

impl ZkDiaryError {
    /// Returns true for failures that retrying with the same inputs can
    /// never fix.
    pub fn is_crypto_failure(&self) -> bool {
        matches!(
            self,
            Self::EncryptionFailed(_)
                | Self::DecryptionFailed(_)
                | Self::InvalidKeyLength { .. }
                | Self::InvalidPublicKeyEncoding
                | Self::InvalidSignature
        )
    }

    /// Re-tag an encryption or decryption failure with the envelope stage it
    /// happened in. Other variants pass through unchanged.
    pub(crate) fn at(self, stage: Stage) -> Self {
        match self {
            Self::EncryptionFailed(_) => Self::EncryptionFailed(stage),
            Self::DecryptionFailed(_) => Self::DecryptionFailed(stage),
            other => other,
        }
    }
}
