//! Type-specific field configuration

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Free-form rendering hints (e.g. `{"rows": 6}` for a textarea)
pub type ElementProperties = serde_json::Map<String, serde_json::Value>;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    #[default]
    Vertical,
    Horizontal,
}

/// `typeParams` of a field
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeParams {
    #[serde(default, skip_serializing_if = "ChoiceOptions::is_empty")]
    pub options: ChoiceOptions,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orientation: Option<Orientation>,
}

impl TypeParams {
    pub fn with_options<I, V, L>(options: I) -> Self
    where
        I: IntoIterator<Item = (V, L)>,
        V: Into<String>,
        L: Into<String>,
    {
        Self {
            options: options.into_iter().collect(),
            orientation: None,
        }
    }

    pub fn orientation(mut self, orientation: Orientation) -> Self {
        self.orientation = Some(orientation);
        self
    }
}

/// Raw value -> display label map, kept in authored order.
///
/// Serialized as a JSON object; duplicate keys keep the last label.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChoiceOptions(Vec<(String, String)>);

impl ChoiceOptions {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn label(&self, value: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(v, _)| v == value)
            .map(|(_, label)| label.as_str())
    }

    pub fn contains(&self, value: &str) -> bool {
        self.label(value).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(v, l)| (v.as_str(), l.as_str()))
    }

    pub fn insert(&mut self, value: impl Into<String>, label: impl Into<String>) {
        let value = value.into();
        let label = label.into();
        match self.0.iter_mut().find(|(v, _)| *v == value) {
            Some(entry) => entry.1 = label,
            None => self.0.push((value, label)),
        }
    }
}

impl<V: Into<String>, L: Into<String>> FromIterator<(V, L)> for ChoiceOptions {
    fn from_iter<T: IntoIterator<Item = (V, L)>>(iter: T) -> Self {
        let mut options = ChoiceOptions::default();
        for (value, label) in iter {
            options.insert(value, label);
        }
        options
    }
}

impl Serialize for ChoiceOptions {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (value, label) in &self.0 {
            map.serialize_entry(value, label)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for ChoiceOptions {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct OptionsVisitor;

        impl<'de> Visitor<'de> for OptionsVisitor {
            type Value = ChoiceOptions;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of option value to label")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut options = ChoiceOptions::default();
                while let Some((value, label)) = access.next_entry::<String, String>()? {
                    options.insert(value, label);
                }
                Ok(options)
            }
        }

        deserializer.deserialize_map(OptionsVisitor)
    }
}
