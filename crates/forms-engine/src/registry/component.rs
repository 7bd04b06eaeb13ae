//! Renderer descriptors and input attribute sets

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::domain::value_objects::Orientation;

/// Which widget renders a field
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "component", rename_all = "kebab-case")]
pub enum Component {
    TextInput { input_type: String },
    Textarea { rows: u32 },
    Checkbox,
    DateInput,
    Select { options: Vec<ChoiceOption> },
    Radio { options: Vec<ChoiceOption>, orientation: Orientation },
    FileUpload,
    HtmlEditor,
    JsonEditor,
    Hidden,
    /// Presentational only, collects no value
    Static,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChoiceOption {
    pub value: String,
    pub label: String,
    /// `false` for a selected value that is not among the declared options
    pub declared: bool,
}

/// Attribute set handed to an input control
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InputAttributes(BTreeMap<String, serde_json::Value>);

impl InputAttributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: &str, value: impl Into<serde_json::Value>) {
        self.0.insert(key.to_string(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<serde_json::Value> {
        self.0.remove(key)
    }

    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.0.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}
