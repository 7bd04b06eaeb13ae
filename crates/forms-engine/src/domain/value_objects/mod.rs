//! Value Objects module
//!
//! Immutable domain primitives shared by the schema, submissions and the
//! version lineage.

pub mod field_type;
pub mod field_value;
pub mod type_params;

pub use field_type::FieldType;
pub use field_value::{FieldValue, FileUploads, UploadedFile};
pub use type_params::{ChoiceOptions, ElementProperties, Orientation, TypeParams};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier value object for entities
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for EntityId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Opaque language tag carried by every form row (e.g. `en`, `pt-BR`)
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LanguageTag(String);

impl LanguageTag {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LanguageTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for LanguageTag {
    fn from(code: &str) -> Self {
        Self::new(code)
    }
}

/// Localization catalogue entry used to populate language pickers
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Language {
    pub code: LanguageTag,
    pub name: String,
    pub native_name: String,
}

impl Language {
    pub fn new(code: &str, name: &str, native_name: &str) -> Self {
        Self {
            code: LanguageTag::new(code),
            name: name.into(),
            native_name: native_name.into(),
        }
    }
}

/// Stable form identifier shared by every version and language of a form
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FormSlug(String);

impl FormSlug {
    pub fn new(slug: impl Into<String>) -> Self {
        Self(slug.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FormSlug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for FormSlug {
    fn from(slug: &str) -> Self {
        Self::new(slug)
    }
}
