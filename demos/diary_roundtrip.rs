//! Minimal example: one user's diary, end to end, without a network.
//!
//! Run with: `cargo run --example diary_roundtrip`
//!
//! Walks the key hierarchy the way a client does:
//! - derive credentials from a seed phrase
//! - create a diary (fresh DiaryKey sealed to the owner)
//! - write a topic and an entry under the active DiaryKey
//! - read everything back from what a server would have stored
//!
//! The "server" here is just the request values; only ciphertext and
//! public keys ever appear in them.

use chrono::Utc;
use zkdiary::entities::diary::{self, CreateDiaryParams};
use zkdiary::entities::entry::{self, PutEntryParams};
use zkdiary::entities::new_entity_id;
use zkdiary::wire::{self, DiaryEncryption, DiaryEncryptionKey, KeyStatus};
use zkdiary::{derive_credentials, keys, Version, SIGNATURE_HEADER};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Identity
    let credentials = derive_credentials("correct horse battery staple")?;
    println!("Derived credentials: {credentials:?}");

    // 2. Create a diary
    let params = CreateDiaryParams {
        title: "Travel log".into(),
        description: "Summer 2026".into(),
    };
    let (create, _) = diary::to_create_request(&params, &credentials)?;
    println!(
        "Create diary: {} byte body, {SIGNATURE_HEADER}: {}",
        create.body().len(),
        create.signature_header()
    );

    // 3. What the server stores and returns
    let request = create.request();
    let now = Utc::now();
    let stored = wire::Diary {
        id: new_entity_id(),
        encryption_keys: vec![DiaryEncryptionKey {
            id: "key-1".into(),
            value: request.encrypted_diary_key.clone(),
            status: KeyStatus::Active,
        }],
        encryption: DiaryEncryption {
            diary_key_id: "key-1".into(),
            encrypted_key_nonce: request.encryption.encrypted_key_nonce.clone(),
            encrypted_key_data: request.encryption.encrypted_key_data.clone(),
        },
        details: request.details.clone(),
        created_at: now,
        updated_at: now,
        version: Version::now().get(),
    };
    println!("Server sees: {}", serde_json::to_string(&stored)?);

    // 4. Write an entry under the active key
    let active = keys::active_diary_key(&stored.encryption_keys, &credentials)?;
    let put = entry::to_encrypted_request(
        &PutEntryParams {
            content: "Arrived in Lisbon.".into(),
            bookmarked: true,
            ..PutEntryParams::default()
        },
        &active,
        Version::now(),
        &credentials,
    )?;
    let put = put.request();
    let stored_entry = wire::Entry {
        id: new_entity_id(),
        diary_id: stored.id.clone(),
        topic_id: put.topic_id.clone(),
        encryption: put.encryption.clone(),
        details: put.details.clone(),
        preview: put.preview.clone(),
        created_at: now,
        updated_at: now,
        deleted_at: None,
        version: put.version.get(),
    };

    // 5. Read back
    let diary = diary::open(&stored, &credentials)?;
    let entry = entry::to_plaintext(&stored_entry, &active.key)?;
    println!("Diary: {} ({})", diary.title, diary.description);
    println!("Entry: {} [bookmarked: {}]", entry.content, entry.bookmarked);

    Ok(())
}
