//! Request signing.
//!
//! Every state-mutating write carries a detached Ed25519 signature over the
//! exact bytes of its body, transmitted base64-encoded in the
//! `X-Signature` header. The server verifies it against the signing public
//! key registered for the account.
//!
//! A signature only holds if the server sees the *same bytes* that were
//! signed. [`SignedRequest`] therefore serializes a request once and keeps
//! those bytes; transports must send `body()` verbatim instead of
//! re-serializing the request.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use ring::signature::{Ed25519KeyPair, UnparsedPublicKey, ED25519};
use serde::Serialize;

use crate::credentials::Credentials;
use crate::error::ZkDiaryError;
use crate::wire::Validate;

/// Header carrying the base64 request signature.
pub const SIGNATURE_HEADER: &str = "X-Signature";

/// Length of an Ed25519 signature.
pub const SIGNATURE_LEN: usize = 64;

/// Length of an Ed25519 public key.
pub const VERIFYING_KEY_LEN: usize = 32;

/// Length of an expanded Ed25519 private key (seed || public key).
pub const SIGNING_KEY_LEN: usize = 64;

/// Sign `payload` with an expanded Ed25519 private key.
///
/// Deterministic per RFC 8032: the same key and payload always produce the
/// same signature.
pub fn sign(
    payload: &[u8],
    signing_private_key: &[u8; SIGNING_KEY_LEN],
) -> Result<[u8; SIGNATURE_LEN], ZkDiaryError> {
    let (seed, public) = signing_private_key.split_at(32);
    let key_pair = Ed25519KeyPair::from_seed_and_public_key(seed, public)
        .map_err(|_| ZkDiaryError::InvalidPublicKeyEncoding)?;

    let sig = key_pair.sign(payload);
    sig.as_ref()
        .try_into()
        .map_err(|_| ZkDiaryError::InvalidSignature)
}

/// Check a detached signature. This is the server-side contract; the client
/// uses it in tests and for self-checks.
pub fn verify(payload: &[u8], signature: &[u8], signing_public_key: &[u8]) -> bool {
    if signature.len() != SIGNATURE_LEN || signing_public_key.len() != VERIFYING_KEY_LEN {
        return false;
    }
    UnparsedPublicKey::new(&ED25519, signing_public_key)
        .verify(payload, signature)
        .is_ok()
}

/// A validated request, its canonical body bytes, and the signature over
/// them.
#[derive(Debug, Clone)]
pub struct SignedRequest<T> {
    request: T,
    body: Vec<u8>,
    signature: [u8; SIGNATURE_LEN],
}

impl<T> SignedRequest<T>
where
    T: Serialize + Validate,
{
    /// Validate, serialize once, and sign the serialized bytes.
    pub fn new(request: T, credentials: &Credentials) -> Result<Self, ZkDiaryError> {
        request.validate()?;
        let body = serde_json::to_vec(&request)?;
        let signature = credentials.sign(&body)?;
        Ok(Self {
            request,
            body,
            signature,
        })
    }
}

impl<T> SignedRequest<T> {
    /// The typed request the body was produced from.
    pub fn request(&self) -> &T {
        &self.request
    }

    /// The canonical bytes to put on the wire.
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn signature(&self) -> &[u8; SIGNATURE_LEN] {
        &self.signature
    }

    /// Value for the [`SIGNATURE_HEADER`] header.
    pub fn signature_header(&self) -> String {
        STANDARD.encode(self.signature)
    }

    /// Verify this request against a signing public key.
    pub fn verify(&self, signing_public_key: &[u8]) -> bool {
        verify(&self.body, &self.signature, signing_public_key)
    }

    pub fn into_parts(self) -> (T, Vec<u8>, [u8; SIGNATURE_LEN]) {
        (self.request, self.body, self.signature)
    }
}

/// Decode an `X-Signature` header value.
pub fn decode_signature_header(value: &str) -> Result<Vec<u8>, ZkDiaryError> {
    STANDARD
        .decode(value)
        .map_err(|_| ZkDiaryError::InvalidSignature)
}
