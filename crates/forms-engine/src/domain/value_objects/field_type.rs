//! Field type value object
//!
//! Closed set of primitive input types plus the internal authoring types.
//! Unknown type strings survive a round trip so that submissions made
//! against an older schema stay viewable.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FieldType {
    Text,
    Number,
    Date,
    Select,
    Checkbox,
    Textarea,
    File,
    Email,
    Tel,
    Radio,
    Range,
    Color,
    Datetime,
    Search,
    Time,
    Url,
    None,
    // Internal-only authoring types
    Html,
    Json,
    Hidden,
    /// Type string not known to this build
    Unknown(String),
}

impl FieldType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Text => "text",
            Self::Number => "number",
            Self::Date => "date",
            Self::Select => "select",
            Self::Checkbox => "checkbox",
            Self::Textarea => "textarea",
            Self::File => "file",
            Self::Email => "email",
            Self::Tel => "tel",
            Self::Radio => "radio",
            Self::Range => "range",
            Self::Color => "color",
            Self::Datetime => "datetime",
            Self::Search => "search",
            Self::Time => "time",
            Self::Url => "url",
            Self::None => "none",
            Self::Html => "html",
            Self::Json => "json",
            Self::Hidden => "hidden",
            Self::Unknown(raw) => raw,
        }
    }

    /// Types only offered to form authors, never to respondents
    pub fn is_internal(&self) -> bool {
        matches!(self, Self::Html | Self::Json | Self::Hidden)
    }

    /// Types that carry a `typeParams.options` map
    pub fn has_options(&self) -> bool {
        matches!(self, Self::Select | Self::Radio)
    }

    /// Types that never produce a response value
    pub fn is_presentational(&self) -> bool {
        matches!(self, Self::None)
    }
}

impl From<String> for FieldType {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "text" => Self::Text,
            "number" => Self::Number,
            "date" => Self::Date,
            "select" => Self::Select,
            "checkbox" => Self::Checkbox,
            "textarea" => Self::Textarea,
            "file" => Self::File,
            "email" => Self::Email,
            "tel" => Self::Tel,
            "radio" => Self::Radio,
            "range" => Self::Range,
            "color" => Self::Color,
            "datetime" | "datetime-local" => Self::Datetime,
            "search" => Self::Search,
            "time" => Self::Time,
            "url" => Self::Url,
            "none" => Self::None,
            "html" => Self::Html,
            "json" => Self::Json,
            "hidden" => Self::Hidden,
            _ => Self::Unknown(raw),
        }
    }
}

impl From<&str> for FieldType {
    fn from(raw: &str) -> Self {
        Self::from(raw.to_string())
    }
}

impl From<FieldType> for String {
    fn from(field_type: FieldType) -> Self {
        field_type.as_str().to_string()
    }
}

impl Default for FieldType {
    fn default() -> Self {
        Self::Text
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
