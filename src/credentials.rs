//! Seed-phrase credential derivation.
//!
//! A user's whole identity is re-derived from their seed phrase every
//! session. Nothing here is persisted.
//!
//! ## Derivation structure
//!
//! ```text
//! seed = PBKDF2-HMAC-SHA256(
//!     password   = seed phrase,
//!     salt       = "my-app-context",
//!     iterations = 100_000,
//!     len        = 32,
//! )
//! encryption keypair = (seed, X25519(seed, basepoint))
//! signing keypair    = Ed25519 keypair with seed as its RFC 8032 seed
//! ```
//!
//! The same 32 bytes feed two unrelated curve constructions. The resulting
//! keys are not interchangeable and each is only ever used with its own
//! algorithm.
//!
//! **Caveat:** the salt is a fixed application-wide constant, so two users
//! who pick the same seed phrase get the same keys. Changing it would
//! change every derived key, so it is kept for compatibility.

use std::fmt;
use std::num::NonZeroU32;

use ring::pbkdf2;
use ring::signature::{Ed25519KeyPair, KeyPair};
use serde::Deserialize;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::ZkDiaryError;
use crate::sealer::X25519_KEY_LEN;
use crate::signature::{self, SIGNATURE_LEN, SIGNING_KEY_LEN, VERIFYING_KEY_LEN};
use crate::wire::RegisterRequest;

/// Application-wide PBKDF2 salt.
pub const DEFAULT_SALT: &str = "my-app-context";

/// PBKDF2 work factor.
pub const DEFAULT_ITERATIONS: u32 = 100_000;

const SEED_LEN: usize = 32;

/// Key-stretching parameters.
///
/// The defaults are the only values that reproduce keys registered with
/// the service. Anything else yields a different identity.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DerivationParams {
    pub iterations: u32,
    pub salt: String,
}

impl Default for DerivationParams {
    fn default() -> Self {
        Self {
            iterations: DEFAULT_ITERATIONS,
            salt: DEFAULT_SALT.to_string(),
        }
    }
}

/// The key material derived from one seed phrase.
///
/// - Not `Clone`. Shared between tasks through the session's `Arc`.
/// - Zeroised on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct Credentials {
    encryption_public_key: [u8; X25519_KEY_LEN],
    encryption_private_key: [u8; X25519_KEY_LEN],
    signing_public_key: [u8; VERIFYING_KEY_LEN],
    /// RFC 8032 seed followed by the public key.
    signing_private_key: [u8; SIGNING_KEY_LEN],
}

impl Credentials {
    /// X25519 public key that diary keys are sealed to.
    pub fn encryption_public_key(&self) -> &[u8; X25519_KEY_LEN] {
        &self.encryption_public_key
    }

    /// X25519 private scalar. Used only to open diary-key envelopes.
    pub fn encryption_private_key(&self) -> &[u8; X25519_KEY_LEN] {
        &self.encryption_private_key
    }

    /// Ed25519 public key the server verifies request signatures with.
    pub fn signing_public_key(&self) -> &[u8; VERIFYING_KEY_LEN] {
        &self.signing_public_key
    }

    /// Expanded Ed25519 private key (seed || public key).
    pub fn signing_private_key(&self) -> &[u8; SIGNING_KEY_LEN] {
        &self.signing_private_key
    }

    /// Sign `payload` with this identity's signing key.
    pub fn sign(&self, payload: &[u8]) -> Result<[u8; SIGNATURE_LEN], ZkDiaryError> {
        signature::sign(payload, &self.signing_private_key)
    }

    /// Build the registration payload announcing this identity's public keys.
    pub fn register_request(&self, login: &str, password: &str) -> RegisterRequest {
        RegisterRequest {
            login: login.to_string(),
            password: password.to_string(),
            signature_public_key: self.signing_public_key.to_vec(),
            encryption_public_key: self.encryption_public_key.to_vec(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("encryption_public_key", &self.encryption_public_key)
            .field("signing_public_key", &self.signing_public_key)
            .finish_non_exhaustive()
    }
}

/// Derive credentials with the default parameters.
pub fn derive(seed_phrase: &str) -> Result<Credentials, ZkDiaryError> {
    derive_with(seed_phrase, &DerivationParams::default())
}

/// Derive credentials with explicit parameters.
///
/// Deterministic: the same phrase and parameters always give byte-identical
/// keys.
pub fn derive_with(
    seed_phrase: &str,
    params: &DerivationParams,
) -> Result<Credentials, ZkDiaryError> {
    if seed_phrase.is_empty() {
        return Err(ZkDiaryError::InvalidSeedPhrase);
    }
    if params.salt.is_empty() {
        return Err(ZkDiaryError::KeyDerivationFailure);
    }
    let iterations = NonZeroU32::new(params.iterations).ok_or(ZkDiaryError::KeyDerivationFailure)?;

    let mut seed = [0u8; SEED_LEN];
    pbkdf2::derive(
        pbkdf2::PBKDF2_HMAC_SHA256,
        iterations,
        params.salt.as_bytes(),
        seed_phrase.as_bytes(),
        &mut seed,
    );

    let result = keypairs_from_seed(&seed);
    seed.zeroize();
    result
}

fn keypairs_from_seed(seed: &[u8; SEED_LEN]) -> Result<Credentials, ZkDiaryError> {
    // X25519: the seed is the private scalar (clamped inside the scalar
    // multiplication, stored unclamped).
    let encryption_secret = crypto_box::SecretKey::from(*seed);
    let encryption_public_key = *encryption_secret.public_key().as_bytes();

    // Ed25519: the seed is the RFC 8032 private key seed.
    let signing = Ed25519KeyPair::from_seed_unchecked(seed)
        .map_err(|_| ZkDiaryError::KeyDerivationFailure)?;
    let signing_public_key: [u8; VERIFYING_KEY_LEN] = signing
        .public_key()
        .as_ref()
        .try_into()
        .map_err(|_| ZkDiaryError::KeyDerivationFailure)?;

    let mut signing_private_key = [0u8; SIGNING_KEY_LEN];
    signing_private_key[..SEED_LEN].copy_from_slice(seed);
    signing_private_key[SEED_LEN..].copy_from_slice(&signing_public_key);

    Ok(Credentials {
        encryption_public_key,
        encryption_private_key: *seed,
        signing_public_key,
        signing_private_key,
    })
}
