//! Template pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::credentials::Credentials;
use crate::error::ZkDiaryError;
use crate::keys::{ActiveDiaryKey, SymmetricKey};
use crate::signature::SignedRequest;
use crate::version::Version;
use crate::wire::{self, PutTemplateRequest};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    pub id: String,
    pub diary_id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub version: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateDetails {
    pub content: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PutTemplateParams {
    pub content: String,
}

pub type CreateTemplateParams = PutTemplateParams;

pub fn to_plaintext(
    template: &wire::Template,
    diary_key: &SymmetricKey,
) -> Result<Template, ZkDiaryError> {
    let details: TemplateDetails =
        super::open_details(&template.details, &template.encryption, diary_key)?;
    Ok(Template {
        id: template.id.clone(),
        diary_id: template.diary_id.clone(),
        content: details.content,
        created_at: template.created_at,
        updated_at: template.updated_at,
        deleted_at: template.deleted_at,
        version: template.version,
    })
}

pub fn to_encrypted_request(
    params: &PutTemplateParams,
    diary_key: &ActiveDiaryKey,
    version: Version,
    credentials: &Credentials,
) -> Result<SignedRequest<PutTemplateRequest>, ZkDiaryError> {
    let details = TemplateDetails {
        content: params.content.clone(),
    };
    let (encryption, details) = super::seal_details(&details, diary_key)?;
    SignedRequest::new(
        PutTemplateRequest {
            version,
            encryption,
            details,
        },
        credentials,
    )
}
