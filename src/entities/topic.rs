//! Topic pipeline and deletion policy.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::credentials::Credentials;
use crate::error::ZkDiaryError;
use crate::keys::{ActiveDiaryKey, SymmetricKey};
use crate::signature::SignedRequest;
use crate::version::Version;
use crate::wire::{self, PutTopicRequest};

/// A decrypted topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topic {
    pub id: String,
    pub diary_id: String,
    pub title: String,
    pub description: String,
    pub color: String,
    pub default_template_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub version: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicDetails {
    pub title: String,
    pub description: String,
    pub color: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PutTopicParams {
    pub title: String,
    pub description: String,
    pub color: String,
    pub default_template_id: Option<String>,
}

impl PutTopicParams {
    pub fn details(&self) -> TopicDetails {
        TopicDetails {
            title: self.title.clone(),
            description: self.description.clone(),
            color: self.color.clone(),
        }
    }
}

pub type CreateTopicParams = PutTopicParams;

/// What happens to a topic's entries when it is deleted.
///
/// `false` (the default) keeps the entries and clears their topic
/// reference; `true` soft-deletes them with the topic.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeleteTopicParams {
    pub delete_entries: bool,
}

impl DeleteTopicParams {
    pub const QUERY_KEY: &'static str = "delete_entries";

    /// Query parameters for the delete call. Empty unless cascading.
    pub fn query_pairs(&self) -> Vec<(&'static str, &'static str)> {
        if self.delete_entries {
            vec![(Self::QUERY_KEY, "true")]
        } else {
            Vec::new()
        }
    }
}

pub fn to_plaintext(topic: &wire::Topic, diary_key: &SymmetricKey) -> Result<Topic, ZkDiaryError> {
    let details: TopicDetails = super::open_details(&topic.details, &topic.encryption, diary_key)?;
    Ok(Topic {
        id: topic.id.clone(),
        diary_id: topic.diary_id.clone(),
        title: details.title,
        description: details.description,
        color: details.color,
        default_template_id: topic.default_template_id.clone(),
        created_at: topic.created_at,
        updated_at: topic.updated_at,
        deleted_at: topic.deleted_at,
        version: topic.version,
    })
}

pub fn to_encrypted_request(
    params: &PutTopicParams,
    diary_key: &ActiveDiaryKey,
    version: Version,
    credentials: &Credentials,
) -> Result<SignedRequest<PutTopicRequest>, ZkDiaryError> {
    let (encryption, details) = super::seal_details(&params.details(), diary_key)?;
    SignedRequest::new(
        PutTopicRequest {
            version,
            default_template_id: params.default_template_id.clone(),
            encryption,
            details,
        },
        credentials,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::{derive_with, DerivationParams};
    use crate::crypto;

    #[test]
    fn test_delete_defaults_to_not_cascading() {
        assert!(DeleteTopicParams::default().query_pairs().is_empty());
        assert_eq!(
            DeleteTopicParams { delete_entries: true }.query_pairs(),
            vec![("delete_entries", "true")]
        );
    }

    #[test]
    fn test_topic_roundtrip() {
        let c = derive_with(
            "topic writer",
            &DerivationParams {
                iterations: 1_000,
                ..DerivationParams::default()
            },
        )
        .unwrap();
        let active = ActiveDiaryKey {
            id: "k1".into(),
            key: crypto::generate_key().unwrap(),
        };
        let params = PutTopicParams {
            title: "Travel".into(),
            description: String::new(),
            color: "#00ff00".into(),
            default_template_id: Some("tpl-1".into()),
        };

        let signed = to_encrypted_request(&params, &active, Version::now(), &c).unwrap();
        let request = signed.request();
        let now = Utc::now();
        let server = wire::Topic {
            id: "topic-1".into(),
            diary_id: "diary-1".into(),
            default_template_id: request.default_template_id.clone(),
            encryption: request.encryption.clone(),
            details: request.details.clone(),
            created_at: now,
            updated_at: now,
            deleted_at: None,
            version: request.version.get(),
        };

        let topic = to_plaintext(&server, &active.key).unwrap();
        assert_eq!(topic.title, "Travel");
        assert_eq!(topic.description, "");
        assert_eq!(topic.color, "#00ff00");
        assert_eq!(topic.default_template_id.as_deref(), Some("tpl-1"));
    }

    #[test]
    fn test_wrong_diary_key_fails_whole_read() {
        let c = derive_with(
            "topic writer",
            &DerivationParams {
                iterations: 1_000,
                ..DerivationParams::default()
            },
        )
        .unwrap();
        let active = ActiveDiaryKey {
            id: "k1".into(),
            key: crypto::generate_key().unwrap(),
        };
        let signed =
            to_encrypted_request(&PutTopicParams::default(), &active, Version::now(), &c).unwrap();
        let request = signed.request();
        let now = Utc::now();
        let server = wire::Topic {
            id: "topic-1".into(),
            diary_id: "diary-1".into(),
            default_template_id: None,
            encryption: request.encryption.clone(),
            details: request.details.clone(),
            created_at: now,
            updated_at: now,
            deleted_at: None,
            version: request.version.get(),
        };

        let other = crypto::generate_key().unwrap();
        assert!(matches!(
            to_plaintext(&server, &other),
            Err(ZkDiaryError::DecryptionFailed(crate::error::Stage::EntityKey))
        ));
    }
}
