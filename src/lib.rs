//! # zkdiary
//!
//! Client-side cryptographic core of a zero-knowledge diary service.
//!
//! The server only ever stores ciphertext. Everything that turns a user's
//! seed phrase into keys, seals diary content, and proves who wrote a
//! request happens here:
//!
//! - [`credentials`]: seed phrase -> X25519 + Ed25519 identity
//! - [`crypto`]: AES-256-GCM over arbitrary payloads
//! - [`sealer`]: anonymous sealed boxes for wrapping DiaryKeys
//! - [`signature`]: detached Ed25519 request signatures
//! - [`session`]: challenge–response login and session-scoped credentials
//! - [`envelope`]: the DiaryKey / EntityKey / content hierarchy
//! - [`entities`]: diary, topic, entry and template pipelines
//!
//! HTTP is not part of this crate. Callers plug a transport in through
//! [`session::AuthTransport`] and send the bodies produced by
//! [`SignedRequest`] verbatim.
//!
//! ## Key hierarchy
//!
//! ```text
//!   seed phrase ──PBKDF2──► Credentials (X25519 + Ed25519)
//!                                │ sealed box
//!                                ▼
//!                            DiaryKey (one active per diary)
//!                                │ AES-256-GCM
//!                                ▼
//!                            EntityKey (fresh per write)
//!                                │ AES-256-GCM
//!                                ▼
//!                            details / preview
//! ```

pub mod credentials;
pub mod crypto;
pub mod entities;
pub mod envelope;
pub mod error;
pub mod keys;
pub mod sealer;
pub mod session;
pub mod signature;
pub mod version;
pub mod wire;

pub use credentials::{Credentials, DerivationParams};
pub use crypto::EncryptedBlob;
pub use error::{Stage, ZkDiaryError};
pub use keys::{ActiveDiaryKey, DiaryKeyId, SymmetricKey};
pub use session::{AuthSession, AuthTransport, Authenticated, SessionStatus};
pub use signature::{SignedRequest, SIGNATURE_HEADER};
pub use version::Version;

/// Derive a user's full identity from their seed phrase.
///
/// Deterministic: the same phrase always yields byte-identical keys. Uses
/// the compatibility parameters (100,000 PBKDF2 rounds, fixed salt); see
/// [`credentials`] for the salt caveat.
pub fn derive_credentials(seed_phrase: &str) -> Result<Credentials, ZkDiaryError> {
    credentials::derive(seed_phrase)
}

/// Generate a fresh random symmetric key.
pub fn generate_key() -> Result<SymmetricKey, ZkDiaryError> {
    crypto::generate_key()
}
