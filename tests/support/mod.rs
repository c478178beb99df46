//! Shared test helpers: an in-memory backend that behaves like the real
//! service as far as the client core can observe.
//!
//! It stores only what the client sends (ciphertext and public keys),
//! checks every write's `X-Signature` against the registered signing key,
//! caps diaries per account, and applies the topic deletion policy.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use serde::de::DeserializeOwned;
use uuid::Uuid;

use zkdiary::wire::{
    self, CreateDiaryRequest, DiaryEncryption, DiaryEncryptionKey, ErrorCode, ErrorResponse,
    KeyStatus, LoginRequest, LoginResponse, LoginVerifyRequest, LoginVerifyResponse,
    PutEntryRequest, PutTopicRequest, RegisterRequest,
};
use zkdiary::{
    signature, AuthSession, AuthTransport, DerivationParams, SignedRequest, Version, ZkDiaryError,
};

pub const DIARY_LIMIT: usize = 10;

/// Cheap derivation so tests do not pay for 100k PBKDF2 rounds each.
pub fn fast_params() -> DerivationParams {
    DerivationParams {
        iterations: 1_000,
        ..DerivationParams::default()
    }
}

struct Account {
    password: String,
    signing_key: Vec<u8>,
}

struct Challenge {
    login: String,
    nonce: Vec<u8>,
}

struct StoredDiary {
    owner: String,
    diary: wire::Diary,
}

#[derive(Default)]
struct State {
    accounts: HashMap<String, Account>,
    challenges: HashMap<String, Challenge>,
    tokens: HashMap<String, String>,
    diaries: HashMap<String, StoredDiary>,
    topics: HashMap<String, wire::Topic>,
    entries: HashMap<String, wire::Entry>,
}

#[derive(Default)]
pub struct MockServer {
    state: Mutex<State>,
}

impl MockServer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    pub fn active_tokens(&self) -> usize {
        self.lock().tokens.len()
    }

    pub fn create_diary(
        &self,
        token: &str,
        body: &[u8],
        signature: &str,
    ) -> Result<wire::Diary, ZkDiaryError> {
        let mut state = self.lock();
        let login = owner_of(&state, token)?;
        let request: CreateDiaryRequest = verified(&state, &login, body, signature)?;

        let owned = state.diaries.values().filter(|d| d.owner == login).count();
        if owned >= DIARY_LIMIT {
            return Err(ErrorResponse::new(ErrorCode::DiaryLimitExceeded).into_error());
        }

        let now = Utc::now();
        let key_id = Uuid::new_v4().to_string();
        let diary = wire::Diary {
            id: Uuid::new_v4().to_string(),
            encryption_keys: vec![DiaryEncryptionKey {
                id: key_id.clone(),
                value: request.encrypted_diary_key,
                status: KeyStatus::Active,
            }],
            encryption: DiaryEncryption {
                diary_key_id: key_id,
                encrypted_key_nonce: request.encryption.encrypted_key_nonce,
                encrypted_key_data: request.encryption.encrypted_key_data,
            },
            details: request.details,
            created_at: now,
            updated_at: now,
            version: Version::now().get(),
        };
        state.diaries.insert(
            diary.id.clone(),
            StoredDiary {
                owner: login,
                diary: diary.clone(),
            },
        );
        Ok(diary)
    }

    pub fn get_diary(&self, token: &str, diary_id: &str) -> Result<wire::Diary, ZkDiaryError> {
        let state = self.lock();
        let login = owner_of(&state, token)?;
        let diary = owned_diary(&state, &login, diary_id)?.diary.clone();
        Ok(diary)
    }

    /// The "get active diary key" call: every key record of the diary.
    pub fn diary_keys(
        &self,
        token: &str,
        diary_id: &str,
    ) -> Result<Vec<DiaryEncryptionKey>, ZkDiaryError> {
        let state = self.lock();
        let login = owner_of(&state, token)?;
        let keys = owned_diary(&state, &login, diary_id)?.diary.encryption_keys.clone();
        Ok(keys)
    }

    /// Append a historical, inactive key record to a diary.
    pub fn add_inactive_key(&self, diary_id: &str, sealed_key: Vec<u8>) {
        let mut state = self.lock();
        if let Some(stored) = state.diaries.get_mut(diary_id) {
            stored.diary.encryption_keys.push(DiaryEncryptionKey {
                id: Uuid::new_v4().to_string(),
                value: sealed_key,
                status: KeyStatus::Inactive,
            });
        }
    }

    pub fn put_topic(
        &self,
        token: &str,
        diary_id: &str,
        topic_id: &str,
        body: &[u8],
        signature: &str,
    ) -> Result<wire::Topic, ZkDiaryError> {
        let mut state = self.lock();
        let login = owner_of(&state, token)?;
        owned_diary(&state, &login, diary_id)?;
        let request: PutTopicRequest = verified(&state, &login, body, signature)?;

        let now = Utc::now();
        let created_at = state.topics.get(topic_id).map_or(now, |t| t.created_at);
        let topic = wire::Topic {
            id: topic_id.to_string(),
            diary_id: diary_id.to_string(),
            default_template_id: request.default_template_id,
            encryption: request.encryption,
            details: request.details,
            created_at,
            updated_at: now,
            deleted_at: None,
            version: request.version.get(),
        };
        state.topics.insert(topic_id.to_string(), topic.clone());
        Ok(topic)
    }

    pub fn put_entry(
        &self,
        token: &str,
        diary_id: &str,
        entry_id: &str,
        body: &[u8],
        signature: &str,
    ) -> Result<wire::Entry, ZkDiaryError> {
        let mut state = self.lock();
        let login = owner_of(&state, token)?;
        owned_diary(&state, &login, diary_id)?;
        let request: PutEntryRequest = verified(&state, &login, body, signature)?;

        if let Some(topic_id) = &request.topic_id {
            let live = state
                .topics
                .get(topic_id)
                .is_some_and(|t| t.diary_id == diary_id && t.deleted_at.is_none());
            if !live {
                return Err(ErrorResponse::new(ErrorCode::TopicNotFound).into_error());
            }
        }

        let now = Utc::now();
        let created_at = state.entries.get(entry_id).map_or(now, |e| e.created_at);
        let entry = wire::Entry {
            id: entry_id.to_string(),
            diary_id: diary_id.to_string(),
            topic_id: request.topic_id,
            encryption: request.encryption,
            details: request.details,
            preview: request.preview,
            created_at,
            updated_at: now,
            deleted_at: None,
            version: request.version.get(),
        };
        state.entries.insert(entry_id.to_string(), entry.clone());
        Ok(entry)
    }

    pub fn get_entry(
        &self,
        token: &str,
        diary_id: &str,
        entry_id: &str,
    ) -> Result<wire::Entry, ZkDiaryError> {
        let state = self.lock();
        let login = owner_of(&state, token)?;
        owned_diary(&state, &login, diary_id)?;
        let entry = state.entries.get(entry_id).filter(|e| e.diary_id == diary_id).cloned();
        entry.ok_or(ZkDiaryError::EntryNotFound)
    }

    /// Soft-delete a topic. `query` is what the client put on the URL.
    pub fn delete_topic(
        &self,
        token: &str,
        diary_id: &str,
        topic_id: &str,
        query: &[(&str, &str)],
    ) -> Result<(), ZkDiaryError> {
        let mut state = self.lock();
        let login = owner_of(&state, token)?;
        owned_diary(&state, &login, diary_id)?;

        let cascade = query.iter().any(|(k, v)| *k == "delete_entries" && *v == "true");
        let now = Utc::now();

        let topic = state
            .topics
            .get_mut(topic_id)
            .filter(|t| t.diary_id == diary_id && t.deleted_at.is_none())
            .ok_or(ZkDiaryError::TopicNotFound)?;
        topic.deleted_at = Some(now);

        for entry in state.entries.values_mut() {
            if entry.topic_id.as_deref() != Some(topic_id) {
                continue;
            }
            if cascade {
                entry.deleted_at = Some(now);
            } else {
                entry.topic_id = None;
            }
            entry.updated_at = now;
        }
        Ok(())
    }
}

fn owner_of(state: &State, token: &str) -> Result<String, ZkDiaryError> {
    state.tokens.get(token).cloned().ok_or(ZkDiaryError::Unauthorized)
}

fn owned_diary<'a>(
    state: &'a State,
    login: &str,
    diary_id: &str,
) -> Result<&'a StoredDiary, ZkDiaryError> {
    let stored = state.diaries.get(diary_id).ok_or(ZkDiaryError::DiaryNotFound)?;
    if stored.owner != login {
        return Err(ZkDiaryError::Forbidden);
    }
    Ok(stored)
}

/// Check the body's signature against the caller's registered key, then
/// parse it.
fn verified<T: DeserializeOwned>(
    state: &State,
    login: &str,
    body: &[u8],
    header: &str,
) -> Result<T, ZkDiaryError> {
    let account = state.accounts.get(login).ok_or(ZkDiaryError::Unauthorized)?;
    let sig = signature::decode_signature_header(header)?;
    if !signature::verify(body, &sig, &account.signing_key) {
        return Err(ErrorResponse::new(ErrorCode::InvalidSignature).into_error());
    }
    Ok(serde_json::from_slice(body)?)
}

#[async_trait]
impl AuthTransport for MockServer {
    async fn register(&self, request: &RegisterRequest) -> Result<(), ZkDiaryError> {
        let mut state = self.lock();
        if state.accounts.contains_key(&request.login) {
            return Err(ErrorResponse::new(ErrorCode::AccountAlreadyExists).into_error());
        }
        state.accounts.insert(
            request.login.clone(),
            Account {
                password: request.password.clone(),
                signing_key: request.signature_public_key.clone(),
            },
        );
        Ok(())
    }

    async fn login(&self, request: &LoginRequest) -> Result<LoginResponse, ZkDiaryError> {
        let mut state = self.lock();
        // Unknown login and wrong password are indistinguishable.
        let accepted = state
            .accounts
            .get(&request.login)
            .is_some_and(|a| a.password == request.password);
        if !accepted {
            return Err(ZkDiaryError::InvalidCredentials);
        }

        let challenge_id = Uuid::new_v4().to_string();
        let mut nonce = Uuid::new_v4().as_bytes().to_vec();
        nonce.extend_from_slice(Uuid::new_v4().as_bytes());
        state.challenges.insert(
            challenge_id.clone(),
            Challenge {
                login: request.login.clone(),
                nonce: nonce.clone(),
            },
        );
        Ok(LoginResponse { challenge_id, nonce })
    }

    async fn verify_challenge(
        &self,
        request: &LoginVerifyRequest,
    ) -> Result<LoginVerifyResponse, ZkDiaryError> {
        let mut state = self.lock();
        let challenge = state
            .challenges
            .remove(&request.challenge_id)
            .ok_or(ZkDiaryError::InvalidChallenge)?;
        let account = state
            .accounts
            .get(&challenge.login)
            .ok_or(ZkDiaryError::InvalidChallenge)?;
        if !signature::verify(&challenge.nonce, &request.signed_nonce, &account.signing_key) {
            return Err(ZkDiaryError::InvalidChallenge);
        }

        let token = Uuid::new_v4().to_string();
        state.tokens.insert(token.clone(), challenge.login);
        Ok(LoginVerifyResponse { token })
    }

    async fn logout(&self, token: &str) -> Result<(), ZkDiaryError> {
        self.lock()
            .tokens
            .remove(token)
            .map(|_| ())
            .ok_or(ZkDiaryError::Unauthorized)
    }
}

/// Register `login` and return an authenticated session for it.
pub async fn signed_in(
    server: &Arc<MockServer>,
    login: &str,
    seed_phrase: &str,
) -> AuthSession<Arc<MockServer>> {
    let session = AuthSession::with_params(Arc::clone(server), fast_params());
    session.register(login, "hunter2", seed_phrase).await.unwrap();
    session.authenticate(login, "hunter2", seed_phrase).await.unwrap();
    session
}

/// Body and header of a signed request, as a transport would send them.
pub fn wire_parts<T>(signed: &SignedRequest<T>) -> (&[u8], String) {
    (signed.body(), signed.signature_header())
}
