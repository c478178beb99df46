//! Anonymous public-key envelopes.
//!
//! Wraps a payload for a recipient's X25519 public key using the
//! curve25519 sealed-box construction: an ephemeral sender keypair, the
//! recipient's static key, XSalsa20-Poly1305. The output is
//!
//! ```text
//! [ ephemeral public key (32 bytes) ][ ciphertext + Poly1305 tag ]
//! ```
//!
//! and is byte-compatible with libsodium's `crypto_box_seal`. The sender is
//! not authenticated at this layer; request signatures cover that.
//!
//! Used only to wrap and unwrap diary keys against the owner's
//! `encryption_public_key`.

use crypto_box::aead::OsRng;
use crypto_box::{PublicKey, SecretKey};

use crate::error::{Stage, ZkDiaryError};

/// Length of an X25519 public or private key.
pub const X25519_KEY_LEN: usize = 32;

/// Bytes a sealed box adds on top of its plaintext (ephemeral key + tag).
pub const SEAL_OVERHEAD: usize = X25519_KEY_LEN + 16;

fn public_key(bytes: &[u8]) -> Result<PublicKey, ZkDiaryError> {
    let bytes: [u8; X25519_KEY_LEN] = bytes
        .try_into()
        .map_err(|_| ZkDiaryError::InvalidPublicKeyEncoding)?;
    Ok(PublicKey::from(bytes))
}

fn secret_key(bytes: &[u8]) -> Result<SecretKey, ZkDiaryError> {
    let bytes: [u8; X25519_KEY_LEN] = bytes.try_into().map_err(|_| ZkDiaryError::InvalidKeyLength {
        expected: X25519_KEY_LEN,
        actual: bytes.len(),
    })?;
    Ok(SecretKey::from(bytes))
}

/// Seal `plaintext` so that only the holder of the matching private key can
/// open it.
pub fn seal_anonymous(
    plaintext: &[u8],
    recipient_public_key: &[u8],
) -> Result<Vec<u8>, ZkDiaryError> {
    let recipient = public_key(recipient_public_key)?;
    recipient
        .seal(&mut OsRng, plaintext)
        .map_err(|_| ZkDiaryError::EncryptionFailed(Stage::DiaryKey))
}

/// Open a sealed box with the recipient's keypair.
///
/// The public key takes part in nonce derivation, so a private key and
/// public key that do not belong together fail exactly like a tampered box.
pub fn open_anonymous(
    ciphertext: &[u8],
    recipient_private_key: &[u8],
    recipient_public_key: &[u8],
) -> Result<Vec<u8>, ZkDiaryError> {
    let secret = secret_key(recipient_private_key)?;
    let claimed = public_key(recipient_public_key)?;

    if secret.public_key().as_bytes() != claimed.as_bytes() {
        return Err(ZkDiaryError::DecryptionFailed(Stage::DiaryKey));
    }

    if ciphertext.len() < SEAL_OVERHEAD {
        return Err(ZkDiaryError::DecryptionFailed(Stage::DiaryKey));
    }

    secret
        .unseal(ciphertext)
        .map_err(|_| ZkDiaryError::DecryptionFailed(Stage::DiaryKey))
}
