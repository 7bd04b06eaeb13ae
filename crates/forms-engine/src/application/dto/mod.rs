//! Data Transfer Objects

use serde::{Deserialize, Serialize};

use crate::domain::value_objects::{EntityId, FormSlug, LanguageTag};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateFormCommand {
    pub slug: FormSlug,
    pub title: String,
    /// Defaults to the configured language
    pub language: Option<LanguageTag>,
    pub subtitle: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewDraftCommand {
    pub slug: FormSlug,
    pub language: LanguageTag,
    pub title: String,
    /// Published version whose structure the draft should start from.
    /// `None` opens an empty draft.
    pub seed_from_version: Option<u32>,
}

/// Where uploaded files belong
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadTarget {
    pub form_id: Option<EntityId>,
    pub field_id: EntityId,
}

/// A file picked by the user, not yet stored
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    pub fn new(file_name: impl Into<String>, content_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            bytes,
        }
    }
}
