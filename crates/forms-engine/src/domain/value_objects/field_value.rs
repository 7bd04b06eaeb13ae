//! Field value value objects

use serde::{Deserialize, Serialize};

/// A single response value. The variant in use depends on the declared
/// type of the field the value belongs to.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Files(FileUploads),
    Bool(bool),
    Number(f64),
    Text(String),
}

impl FieldValue {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    pub fn empty() -> Self {
        Self::Text(String::new())
    }

    /// Empty for the purposes of the `required` check
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Text(s) => s.trim().is_empty(),
            Self::Bool(b) => !b,
            Self::Number(_) => false,
            Self::Files(files) => files.keys.is_empty(),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_files(&self) -> Option<&FileUploads> {
        match self {
            Self::Files(files) => Some(files),
            _ => None,
        }
    }

    /// String rendering used by text-like inputs
    pub fn display(&self) -> String {
        match self {
            Self::Text(s) => s.clone(),
            Self::Bool(b) => b.to_string(),
            Self::Number(n) => n.to_string(),
            Self::Files(files) => files.keys.join(", "),
        }
    }
}

impl Default for FieldValue {
    fn default() -> Self {
        Self::empty()
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::text(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileUploadsTag {
    #[default]
    #[serde(rename = "file-uploads")]
    FileUploads,
}

/// `{dataType: "file-uploads", keys: [...]}` envelope stored for file fields
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileUploads {
    pub data_type: FileUploadsTag,
    pub keys: Vec<String>,
}

impl FileUploads {
    pub fn new(keys: Vec<String>) -> Self {
        Self {
            data_type: FileUploadsTag::FileUploads,
            keys,
        }
    }

    /// Append keys not already present, preserving upload order
    pub fn with_keys<I>(&self, keys: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        let mut merged = self.keys.clone();
        for key in keys {
            if !merged.contains(&key) {
                merged.push(key);
            }
        }
        Self::new(merged)
    }
}

/// A stored upload as returned by the upload collaborator
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedFile {
    pub key: String,
    pub url: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_untagged_values_deserialize_by_shape() {
        let v: FieldValue = serde_json::from_value(json!("x")).unwrap();
        assert_eq!(v, FieldValue::text("x"));

        let v: FieldValue = serde_json::from_value(json!(true)).unwrap();
        assert_eq!(v, FieldValue::Bool(true));

        let v: FieldValue = serde_json::from_value(json!(4)).unwrap();
        assert_eq!(v, FieldValue::Number(4.0));

        let v: FieldValue =
            serde_json::from_value(json!({"dataType": "file-uploads", "keys": ["a"]})).unwrap();
        assert_eq!(v, FieldValue::Files(FileUploads::new(vec!["a".into()])));
    }

    #[test]
    fn test_envelope_serializes_data_type() {
        let json = serde_json::to_value(FileUploads::new(vec!["k".into()])).unwrap();
        assert_eq!(json, json!({"dataType": "file-uploads", "keys": ["k"]}));
    }

    #[test]
    fn test_with_keys_accumulates_without_duplicates() {
        let files = FileUploads::new(vec!["a".into()]).with_keys(vec!["b".into(), "a".into()]);
        assert_eq!(files.keys, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_emptiness() {
        assert!(FieldValue::text("  ").is_empty());
        assert!(FieldValue::Bool(false).is_empty());
        assert!(!FieldValue::Number(0.0).is_empty());
        assert!(FieldValue::Files(FileUploads::default()).is_empty());
    }
}
