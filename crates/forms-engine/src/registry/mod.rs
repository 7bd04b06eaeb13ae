//! Field Type Registry
//!
//! Maps a field's declared type to the behaviour that renders, coerces and
//! validates its value. Types without a registered handler (including
//! type strings this build does not know) resolve through the plain-text
//! handler so old submissions remain viewable.

pub mod component;
pub mod handlers;

pub use component::{ChoiceOption, Component, InputAttributes};

use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

use crate::domain::aggregates::Field;
use crate::domain::value_objects::{FieldType, FieldValue};
use handlers::{
    CheckboxHandler, ChoiceHandler, DateHandler, FileHandler, HiddenHandler, HtmlHandler,
    JsonHandler, StaticHandler, TextHandler, TextareaHandler,
};

/// Behaviour for one field type
pub trait FieldHandler: Send + Sync {
    fn component(&self, field: &Field, value: &FieldValue) -> Component;

    /// Turn raw input into a stored value. `previous` is the value currently
    /// held for the field, if any.
    fn coerce(&self, field: &Field, raw: &Value, previous: Option<&FieldValue>) -> FieldValue;

    fn attributes(&self, field: &Field, value: &FieldValue) -> InputAttributes {
        let mut attrs = InputAttributes::new();
        attrs.set("id", field.id.as_str());
        attrs.set("name", field.name.as_str());
        attrs.set("required", field.required);
        attrs.set("value", value.display());
        attrs
    }

    fn validate(&self, field: &Field, value: &FieldValue) -> Result<(), ValidationIssue> {
        if field.required && value.is_empty() {
            return Err(ValidationIssue::Required { field: field.name.clone() });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationIssue {
    #[error("{field} is required")]
    Required { field: String },

    #[error("{field} is not a valid email address")]
    InvalidEmail { field: String },

    #[error("{field} is not a number")]
    InvalidNumber { field: String },

    #[error("{field} is not a valid URL")]
    InvalidUrl { field: String },

    #[error("{field} does not contain valid JSON")]
    InvalidJson { field: String },
}

impl ValidationIssue {
    pub fn field(&self) -> &str {
        match self {
            Self::Required { field }
            | Self::InvalidEmail { field }
            | Self::InvalidNumber { field }
            | Self::InvalidUrl { field }
            | Self::InvalidJson { field } => field,
        }
    }
}

/// Everything a renderer needs for one field
#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedField {
    pub component: Component,
    pub value: FieldValue,
    pub attributes: InputAttributes,
}

pub struct FieldTypeRegistry {
    handlers: HashMap<FieldType, Arc<dyn FieldHandler>>,
    fallback: Arc<dyn FieldHandler>,
}

impl FieldTypeRegistry {
    /// Registry with no handlers; everything renders as text
    pub fn empty() -> Self {
        Self {
            handlers: HashMap::new(),
            fallback: Arc::new(TextHandler::new("text")),
        }
    }

    /// Registry with a handler for every built-in type
    pub fn new() -> Self {
        let mut registry = Self::empty();

        for (field_type, input_type) in [
            (FieldType::Text, "text"),
            (FieldType::Number, "number"),
            (FieldType::Email, "email"),
            (FieldType::Tel, "tel"),
            (FieldType::Range, "range"),
            (FieldType::Color, "color"),
            (FieldType::Datetime, "datetime-local"),
            (FieldType::Search, "search"),
            (FieldType::Time, "time"),
            (FieldType::Url, "url"),
        ] {
            registry.register(field_type, Arc::new(TextHandler::new(input_type)));
        }

        registry.register(FieldType::Textarea, Arc::new(TextareaHandler));
        registry.register(FieldType::Checkbox, Arc::new(CheckboxHandler));
        registry.register(FieldType::Date, Arc::new(DateHandler));
        registry.register(FieldType::Select, Arc::new(ChoiceHandler::select()));
        registry.register(FieldType::Radio, Arc::new(ChoiceHandler::radio()));
        registry.register(FieldType::File, Arc::new(FileHandler));
        registry.register(FieldType::Html, Arc::new(HtmlHandler));
        registry.register(FieldType::Json, Arc::new(JsonHandler));
        registry.register(FieldType::Hidden, Arc::new(HiddenHandler));
        registry.register(FieldType::None, Arc::new(StaticHandler));
        registry
    }

    pub fn register(&mut self, field_type: FieldType, handler: Arc<dyn FieldHandler>) {
        self.handlers.insert(field_type, handler);
    }

    pub fn handler_for(&self, field_type: &FieldType) -> &dyn FieldHandler {
        self.handlers
            .get(field_type)
            .unwrap_or(&self.fallback)
            .as_ref()
    }

    pub fn coerce(&self, field: &Field, raw: &Value, previous: Option<&FieldValue>) -> FieldValue {
        self.handler_for(&field.field_type).coerce(field, raw, previous)
    }

    /// Coerce `raw` and describe how to render the result
    pub fn resolve(&self, field: &Field, raw: &Value, previous: Option<&FieldValue>) -> ResolvedField {
        let handler = self.handler_for(&field.field_type);
        let value = handler.coerce(field, raw, previous);
        ResolvedField {
            component: handler.component(field, &value),
            attributes: handler.attributes(field, &value),
            value,
        }
    }

    /// Resolve a stored value (or nothing) for display
    pub fn render(&self, field: &Field, stored: Option<&FieldValue>) -> ResolvedField {
        let raw = stored
            .and_then(|v| serde_json::to_value(v).ok())
            .unwrap_or(Value::Null);
        self.resolve(field, &raw, stored)
    }

    /// Validate the value held for a field; a missing value counts as empty
    pub fn validate(&self, field: &Field, value: Option<&FieldValue>) -> Result<(), ValidationIssue> {
        let handler = self.handler_for(&field.field_type);
        match value {
            Some(value) => handler.validate(field, value),
            None => handler.validate(field, &handler.coerce(field, &Value::Null, None)),
        }
    }
}

impl Default for FieldTypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}
