//! Symmetric authenticated encryption.
//!
//! This module is the only place in the crate that calls `ring::aead`.
//! Every diary key, entity key and content blob goes through the
//! functions here.
//!
//! Primitive choices:
//! - **Cipher**: AES-256-GCM, no associated data
//! - **Nonce**: 96-bit (12 bytes), generated fresh per call via `SystemRandom`
//! - **Key size**: 256 bits (32 bytes)

use ring::aead::{self, LessSafeKey, Nonce, UnboundKey, AES_256_GCM};
use ring::rand::{SecureRandom, SystemRandom};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::error::{Stage, ZkDiaryError};
use crate::keys::SymmetricKey;
use crate::wire::b64;

/// The AEAD algorithm used throughout zkdiary.
const ALGORITHM: &aead::Algorithm = &AES_256_GCM;

/// Size of the nonce in bytes (96 bits).
pub const NONCE_LEN: usize = 12;

/// Size of a symmetric key in bytes (256 bits).
pub const KEY_LEN: usize = 32;

/// Size of the GCM authentication tag appended to every ciphertext.
pub const TAG_LEN: usize = 16;

/// Output of one seal call.
///
/// `data` is the ciphertext with the GCM tag appended. On the wire this is
/// `{ "nonce": <base64>, "data": <base64> }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedBlob {
    #[serde(with = "b64")]
    pub nonce: Vec<u8>,
    #[serde(with = "b64")]
    pub data: Vec<u8>,
}

/// Fill a buffer from the system CSPRNG.
pub(crate) fn fill_random(buf: &mut [u8]) -> Result<(), ZkDiaryError> {
    SystemRandom::new()
        .fill(buf)
        .map_err(|_| ZkDiaryError::RandomnessFailure)
}

/// Generate a fresh random key. Used for every diary key and entity key.
pub fn generate_key() -> Result<SymmetricKey, ZkDiaryError> {
    let mut bytes = [0u8; KEY_LEN];
    fill_random(&mut bytes)?;
    let key = SymmetricKey::from_bytes(bytes);
    // `bytes` is a copy; clear it before it goes out of scope.
    zeroize::Zeroize::zeroize(&mut bytes);
    Ok(key)
}

fn less_safe_key(key: &SymmetricKey) -> Result<LessSafeKey, ZkDiaryError> {
    let unbound = UnboundKey::new(ALGORITHM, key.as_bytes()).map_err(|_| {
        ZkDiaryError::InvalidKeyLength {
            expected: KEY_LEN,
            actual: key.as_bytes().len(),
        }
    })?;
    Ok(LessSafeKey::new(unbound))
}

/// Encrypt a payload with AES-256-GCM under a fresh random nonce.
pub fn seal(plaintext: &[u8], key: &SymmetricKey) -> Result<EncryptedBlob, ZkDiaryError> {
    let key = less_safe_key(key)?;

    let mut nonce = [0u8; NONCE_LEN];
    fill_random(&mut nonce)?;

    let mut data = Vec::with_capacity(plaintext.len() + ALGORITHM.tag_len());
    data.extend_from_slice(plaintext);

    key.seal_in_place_append_tag(
        Nonce::assume_unique_for_key(nonce),
        aead::Aad::empty(),
        &mut data,
    )
    .map_err(|_| ZkDiaryError::EncryptionFailed(Stage::Payload))?;

    Ok(EncryptedBlob {
        nonce: nonce.to_vec(),
        data,
    })
}

/// Decrypt a blob produced by [`seal`].
///
/// A wrong key, a tampered ciphertext, a tampered nonce or a nonce of the
/// wrong length all fail the same way. The caller never receives partial
/// plaintext.
pub fn open(blob: &EncryptedBlob, key: &SymmetricKey) -> Result<Vec<u8>, ZkDiaryError> {
    let nonce: [u8; NONCE_LEN] = blob
        .nonce
        .as_slice()
        .try_into()
        .map_err(|_| ZkDiaryError::DecryptionFailed(Stage::Payload))?;

    let key = less_safe_key(key)?;
    let mut payload = Zeroizing::new(blob.data.clone());

    let len = key
        .open_in_place(
            Nonce::assume_unique_for_key(nonce),
            aead::Aad::empty(),
            &mut payload[..],
        )
        .map_err(|_| ZkDiaryError::DecryptionFailed(Stage::Payload))?
        .len();

    // The plaintext is handed back in the buffer it was decrypted into.
    let mut plaintext = std::mem::take(&mut *payload);
    plaintext.truncate(len);
    Ok(plaintext)
}
