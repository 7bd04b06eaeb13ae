//! Per-type field handlers
//!
//! Coercion never fails: input that cannot be interpreted is either passed
//! through or replaced by the last valid value, depending on the type.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;
use tracing::debug;

use crate::domain::aggregates::Field;
use crate::domain::value_objects::{FieldValue, FileUploads};
use crate::registry::component::{ChoiceOption, Component, InputAttributes};
use crate::registry::{FieldHandler, ValidationIssue};

const DEFAULT_TEXTAREA_ROWS: u32 = 3;

fn email_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").ok())
        .as_ref()
}

/// Plain scalar pass-through; `undefined`/`null` becomes `""`
fn pass_through(raw: &Value) -> FieldValue {
    match raw {
        Value::Null => FieldValue::empty(),
        Value::String(s) => FieldValue::Text(s.clone()),
        Value::Bool(b) => FieldValue::Bool(*b),
        Value::Number(n) => n
            .as_f64()
            .map(FieldValue::Number)
            .unwrap_or_else(|| FieldValue::Text(n.to_string())),
        other => FieldValue::Text(other.to_string()),
    }
}

fn truthy(raw: &Value) -> bool {
    match raw {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0 && !f.is_nan()).unwrap_or(true),
        Value::String(s) => !matches!(s.trim().to_ascii_lowercase().as_str(), "" | "false" | "off" | "0"),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Attributes common to every input control
fn base_attributes(field: &Field) -> InputAttributes {
    let mut attrs = InputAttributes::new();
    attrs.set("id", field.id.as_str());
    attrs.set("name", field.name.as_str());
    attrs.set("required", field.required);
    if let Some(placeholder) = &field.placeholder {
        attrs.set("placeholder", placeholder.as_str());
    }
    attrs
}

fn check_required(field: &Field, value: &FieldValue) -> Result<(), ValidationIssue> {
    if field.required && value.is_empty() {
        return Err(ValidationIssue::Required { field: field.name.clone() });
    }
    Ok(())
}

// =============================================================================
// Text-like inputs
// =============================================================================

/// Single-line `<input>` of a given HTML type. Also the fallback renderer.
pub struct TextHandler {
    input_type: &'static str,
}

impl TextHandler {
    pub fn new(input_type: &'static str) -> Self {
        Self { input_type }
    }
}

impl FieldHandler for TextHandler {
    fn component(&self, _field: &Field, _value: &FieldValue) -> Component {
        Component::TextInput { input_type: self.input_type.to_string() }
    }

    fn coerce(&self, _field: &Field, raw: &Value, _previous: Option<&FieldValue>) -> FieldValue {
        pass_through(raw)
    }

    fn attributes(&self, field: &Field, value: &FieldValue) -> InputAttributes {
        let mut attrs = base_attributes(field);
        attrs.set("type", self.input_type);
        attrs.set("value", value.display());
        attrs
    }

    fn validate(&self, field: &Field, value: &FieldValue) -> Result<(), ValidationIssue> {
        check_required(field, value)?;
        if value.is_empty() {
            return Ok(());
        }

        let text = value.display();
        match self.input_type {
            "email" => {
                let valid = email_pattern().map(|re| re.is_match(text.trim())).unwrap_or(true);
                if !valid {
                    return Err(ValidationIssue::InvalidEmail { field: field.name.clone() });
                }
            }
            "number" | "range" => {
                if !matches!(value, FieldValue::Number(_)) && text.trim().parse::<f64>().is_err() {
                    return Err(ValidationIssue::InvalidNumber { field: field.name.clone() });
                }
            }
            "url" => {
                let text = text.trim();
                let valid = text
                    .split_once("://")
                    .map(|(scheme, rest)| !scheme.is_empty() && !rest.is_empty())
                    .unwrap_or(false);
                if !valid {
                    return Err(ValidationIssue::InvalidUrl { field: field.name.clone() });
                }
            }
            _ => {}
        }
        Ok(())
    }
}

pub struct TextareaHandler;

impl FieldHandler for TextareaHandler {
    fn component(&self, field: &Field, _value: &FieldValue) -> Component {
        let rows = field
            .element_properties
            .get("rows")
            .and_then(Value::as_u64)
            .and_then(|r| u32::try_from(r).ok())
            .unwrap_or(DEFAULT_TEXTAREA_ROWS);
        Component::Textarea { rows }
    }

    fn coerce(&self, _field: &Field, raw: &Value, _previous: Option<&FieldValue>) -> FieldValue {
        pass_through(raw)
    }
}

pub struct HiddenHandler;

impl FieldHandler for HiddenHandler {
    fn component(&self, _field: &Field, _value: &FieldValue) -> Component {
        Component::Hidden
    }

    fn coerce(&self, _field: &Field, raw: &Value, _previous: Option<&FieldValue>) -> FieldValue {
        pass_through(raw)
    }
}

/// `none` fields are headings/copy and never collect a value
pub struct StaticHandler;

impl FieldHandler for StaticHandler {
    fn component(&self, _field: &Field, _value: &FieldValue) -> Component {
        Component::Static
    }

    fn coerce(&self, _field: &Field, raw: &Value, _previous: Option<&FieldValue>) -> FieldValue {
        pass_through(raw)
    }

    fn validate(&self, _field: &Field, _value: &FieldValue) -> Result<(), ValidationIssue> {
        Ok(())
    }
}

// =============================================================================
// Checkbox
// =============================================================================

pub struct CheckboxHandler;

impl FieldHandler for CheckboxHandler {
    fn component(&self, _field: &Field, _value: &FieldValue) -> Component {
        Component::Checkbox
    }

    fn coerce(&self, _field: &Field, raw: &Value, _previous: Option<&FieldValue>) -> FieldValue {
        FieldValue::Bool(truthy(raw))
    }

    /// `checked` replaces `value`; the two never appear together
    fn attributes(&self, field: &Field, value: &FieldValue) -> InputAttributes {
        let mut attrs = base_attributes(field);
        attrs.set("type", "checkbox");
        attrs.remove("value");
        attrs.set("checked", matches!(value, FieldValue::Bool(true)));
        attrs
    }
}

// =============================================================================
// Date
// =============================================================================

pub struct DateHandler;

impl DateHandler {
    /// Reformat to `YYYY-MM-DD`, or `None` if the input is not a date
    pub fn normalize(input: &str) -> Option<String> {
        let input = input.trim();
        let date = NaiveDate::parse_from_str(input, "%Y-%m-%d")
            .ok()
            .or_else(|| DateTime::parse_from_rfc3339(input).ok().map(|dt| dt.date_naive()))
            .or_else(|| {
                NaiveDateTime::parse_from_str(input, "%Y-%m-%dT%H:%M:%S")
                    .or_else(|_| NaiveDateTime::parse_from_str(input, "%Y-%m-%dT%H:%M"))
                    .ok()
                    .map(|dt| dt.date())
            })
            .or_else(|| NaiveDate::parse_from_str(input, "%m/%d/%Y").ok())
            .or_else(|| NaiveDate::parse_from_str(input, "%Y/%m/%d").ok())?;
        Some(date.format("%Y-%m-%d").to_string())
    }
}

impl FieldHandler for DateHandler {
    fn component(&self, _field: &Field, _value: &FieldValue) -> Component {
        Component::DateInput
    }

    fn coerce(&self, field: &Field, raw: &Value, _previous: Option<&FieldValue>) -> FieldValue {
        match raw {
            Value::String(s) if !s.trim().is_empty() => match Self::normalize(s) {
                Some(date) => FieldValue::Text(date),
                None => {
                    debug!(field = %field.name, value = %s, "Unparseable date passed through");
                    FieldValue::Text(s.clone())
                }
            },
            other => pass_through(other),
        }
    }

    fn attributes(&self, field: &Field, value: &FieldValue) -> InputAttributes {
        let mut attrs = base_attributes(field);
        attrs.set("type", "date");
        attrs.set("value", value.display());
        attrs
    }
}

// =============================================================================
// Select / radio
// =============================================================================

pub struct ChoiceHandler {
    radio: bool,
}

impl ChoiceHandler {
    pub fn select() -> Self {
        Self { radio: false }
    }

    pub fn radio() -> Self {
        Self { radio: true }
    }

    /// Declared options in authored order, plus the selected value if it is
    /// not one of them, so stale answers still render
    pub fn options(field: &Field, selected: &FieldValue) -> Vec<ChoiceOption> {
        let mut options: Vec<ChoiceOption> = field
            .type_params
            .options
            .iter()
            .map(|(value, label)| ChoiceOption {
                value: value.to_string(),
                label: label.to_string(),
                declared: true,
            })
            .collect();

        let selected = selected.display();
        if !selected.is_empty() && !field.type_params.options.contains(&selected) {
            options.push(ChoiceOption {
                value: selected.clone(),
                label: selected,
                declared: false,
            });
        }
        options
    }
}

impl FieldHandler for ChoiceHandler {
    fn component(&self, field: &Field, value: &FieldValue) -> Component {
        let options = Self::options(field, value);
        if self.radio {
            Component::Radio {
                options,
                orientation: field.type_params.orientation.unwrap_or_default(),
            }
        } else {
            Component::Select { options }
        }
    }

    /// Option keys are strings, so scalar input is normalised to text
    fn coerce(&self, _field: &Field, raw: &Value, _previous: Option<&FieldValue>) -> FieldValue {
        match raw {
            Value::Null => FieldValue::empty(),
            Value::String(s) => FieldValue::Text(s.clone()),
            other => FieldValue::Text(other.to_string()),
        }
    }
}

// =============================================================================
// File upload
// =============================================================================

pub struct FileHandler;

impl FieldHandler for FileHandler {
    fn component(&self, _field: &Field, _value: &FieldValue) -> Component {
        Component::FileUpload
    }

    fn coerce(&self, field: &Field, raw: &Value, previous: Option<&FieldValue>) -> FieldValue {
        if let Ok(files) = serde_json::from_value::<FileUploads>(raw.clone()) {
            return FieldValue::Files(files);
        }
        if let Some(keys) = raw.as_array() {
            let keys = keys.iter().filter_map(Value::as_str).map(str::to_string);
            return FieldValue::Files(FileUploads::default().with_keys(keys));
        }

        debug!(field = %field.name, "Non-envelope file value ignored");
        match previous {
            Some(FieldValue::Files(files)) => FieldValue::Files(files.clone()),
            _ => FieldValue::Files(FileUploads::default()),
        }
    }

    fn attributes(&self, field: &Field, _value: &FieldValue) -> InputAttributes {
        let mut attrs = base_attributes(field);
        attrs.set("type", "file");
        attrs.set("multiple", true);
        attrs
    }
}

// =============================================================================
// Internal authoring types
// =============================================================================

pub struct HtmlHandler;

impl FieldHandler for HtmlHandler {
    fn component(&self, _field: &Field, _value: &FieldValue) -> Component {
        Component::HtmlEditor
    }

    fn coerce(&self, _field: &Field, raw: &Value, _previous: Option<&FieldValue>) -> FieldValue {
        match raw {
            Value::String(s) => FieldValue::Text(s.clone()),
            Value::Null => FieldValue::empty(),
            other => FieldValue::Text(other.to_string()),
        }
    }
}

pub struct JsonHandler;

impl FieldHandler for JsonHandler {
    fn component(&self, _field: &Field, _value: &FieldValue) -> Component {
        Component::JsonEditor
    }

    /// Valid JSON is re-stringified; invalid JSON keeps the previous value
    fn coerce(&self, field: &Field, raw: &Value, previous: Option<&FieldValue>) -> FieldValue {
        let parsed = match raw {
            Value::Null => return FieldValue::empty(),
            Value::String(s) => serde_json::from_str::<Value>(s),
            other => Ok(other.clone()),
        };

        match parsed.and_then(|v| serde_json::to_string_pretty(&v)) {
            Ok(text) => FieldValue::Text(text),
            Err(e) => {
                debug!(field = %field.name, error = %e, "Invalid JSON edit, keeping last valid value");
                previous.cloned().unwrap_or_default()
            }
        }
    }

    fn validate(&self, field: &Field, value: &FieldValue) -> Result<(), ValidationIssue> {
        check_required(field, value)?;
        if let Some(text) = value.as_text() {
            if !text.trim().is_empty() && serde_json::from_str::<Value>(text).is_err() {
                return Err(ValidationIssue::InvalidJson { field: field.name.clone() });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::{FieldType, TypeParams};
    use serde_json::json;

    fn field(field_type: FieldType) -> Field {
        Field::new("Test", field_type).with_name("test")
    }

    #[test]
    fn test_checkbox_truthiness() {
        let f = field(FieldType::Checkbox);
        assert_eq!(CheckboxHandler.coerce(&f, &json!("on"), None), FieldValue::Bool(true));
        assert_eq!(CheckboxHandler.coerce(&f, &json!(1), None), FieldValue::Bool(true));
        assert_eq!(CheckboxHandler.coerce(&f, &json!(""), None), FieldValue::Bool(false));
        assert_eq!(CheckboxHandler.coerce(&f, &json!("false"), None), FieldValue::Bool(false));
        assert_eq!(CheckboxHandler.coerce(&f, &Value::Null, None), FieldValue::Bool(false));
    }

    #[test]
    fn test_checkbox_attributes_have_checked_not_value() {
        let f = field(FieldType::Checkbox);
        let value = CheckboxHandler.coerce(&f, &json!("on"), None);
        let attrs = CheckboxHandler.attributes(&f, &value);
        assert_eq!(attrs.get("checked"), Some(&json!(true)));
        assert!(!attrs.contains("value"));
    }

    #[test]
    fn test_date_normalization() {
        assert_eq!(DateHandler::normalize("2024-03-05").as_deref(), Some("2024-03-05"));
        assert_eq!(DateHandler::normalize("2024-03-05T10:11:12Z").as_deref(), Some("2024-03-05"));
        assert_eq!(DateHandler::normalize("2024-03-05T10:11").as_deref(), Some("2024-03-05"));
        assert_eq!(DateHandler::normalize("03/05/2024").as_deref(), Some("2024-03-05"));
        assert_eq!(DateHandler::normalize("2024/03/05").as_deref(), Some("2024-03-05"));
        assert!(DateHandler::normalize("next tuesday").is_none());
    }

    #[test]
    fn test_unparseable_date_passes_through() {
        let f = field(FieldType::Date);
        assert_eq!(DateHandler.coerce(&f, &json!("soon"), None), FieldValue::text("soon"));
        assert_eq!(DateHandler.coerce(&f, &json!("01/09/2024"), None), FieldValue::text("2024-01-09"));
    }

    #[test]
    fn test_unknown_choice_still_rendered() {
        let f = field(FieldType::Select).with_type_params(TypeParams::with_options([("a", "Alpha")]));
        let options = ChoiceHandler::options(&f, &FieldValue::text("legacy"));
        assert_eq!(options.len(), 2);
        assert!(options[0].declared);
        assert_eq!(options[1].value, "legacy");
        assert!(!options[1].declared);

        let options = ChoiceHandler::options(&f, &FieldValue::text("a"));
        assert_eq!(options.len(), 1);
    }

    #[test]
    fn test_radio_component_carries_orientation() {
        use crate::domain::value_objects::Orientation;
        let f = field(FieldType::Radio)
            .with_type_params(TypeParams::with_options([("y", "Yes")]).orientation(Orientation::Horizontal));
        match ChoiceHandler::radio().component(&f, &FieldValue::empty()) {
            Component::Radio { orientation, options } => {
                assert_eq!(orientation, Orientation::Horizontal);
                assert_eq!(options.len(), 1);
            }
            other => panic!("unexpected component {:?}", other),
        }
    }

    #[test]
    fn test_file_coercion() {
        let f = field(FieldType::File);
        let envelope = json!({"dataType": "file-uploads", "keys": ["k1"]});
        assert_eq!(
            FileHandler.coerce(&f, &envelope, None),
            FieldValue::Files(FileUploads::new(vec!["k1".into()]))
        );

        let previous = FieldValue::Files(FileUploads::new(vec!["k0".into()]));
        assert_eq!(FileHandler.coerce(&f, &json!("garbage"), Some(&previous)), previous);
    }

    #[test]
    fn test_json_round_trip_and_recovery() {
        let f = field(FieldType::Json);
        let good = JsonHandler.coerce(&f, &json!("{\"a\":1}"), None);
        assert_eq!(good, FieldValue::text("{\n  \"a\": 1\n}"));

        let kept = JsonHandler.coerce(&f, &json!("{\"a\":"), Some(&good));
        assert_eq!(kept, good);
        assert!(JsonHandler.validate(&f, &kept).is_ok());
        assert!(JsonHandler.validate(&f, &FieldValue::text("{")).is_err());
    }

    #[test]
    fn test_blank_json_edit_keeps_last_valid_value() {
        let f = field(FieldType::Json);
        let good = JsonHandler.coerce(&f, &json!("[1]"), None);
        assert_eq!(JsonHandler.coerce(&f, &json!(""), Some(&good)), good);
        assert_eq!(JsonHandler.coerce(&f, &json!("   "), Some(&good)), good);
        assert_eq!(JsonHandler.coerce(&f, &json!(""), None), FieldValue::default());
    }

    #[test]
    fn test_text_validation_by_input_type() {
        let email = field(FieldType::Email);
        let handler = TextHandler::new("email");
        assert!(handler.validate(&email, &FieldValue::text("a@b.co")).is_ok());
        assert!(matches!(
            handler.validate(&email, &FieldValue::text("nope")),
            Err(ValidationIssue::InvalidEmail { .. })
        ));

        let number = TextHandler::new("number");
        assert!(number.validate(&field(FieldType::Number), &FieldValue::text("4.5")).is_ok());
        assert!(number.validate(&field(FieldType::Number), &FieldValue::text("four")).is_err());

        let url = TextHandler::new("url");
        assert!(url.validate(&field(FieldType::Url), &FieldValue::text("https://x.org")).is_ok());
        assert!(url.validate(&field(FieldType::Url), &FieldValue::text("x.org")).is_err());
    }

    #[test]
    fn test_required_check() {
        let f = field(FieldType::Text).required();
        let handler = TextHandler::new("text");
        assert!(matches!(
            handler.validate(&f, &FieldValue::empty()),
            Err(ValidationIssue::Required { .. })
        ));
        assert!(StaticHandler.validate(&field(FieldType::None).required(), &FieldValue::empty()).is_ok());
    }

    #[test]
    fn test_textarea_rows_from_element_properties() {
        let f = field(FieldType::Textarea).with_element_property("rows", json!(8));
        assert_eq!(TextareaHandler.component(&f, &FieldValue::empty()), Component::Textarea { rows: 8 });
        assert_eq!(
            TextareaHandler.component(&field(FieldType::Textarea), &FieldValue::empty()),
            Component::Textarea { rows: 3 }
        );

        let huge = field(FieldType::Textarea).with_element_property("rows", json!(u64::from(u32::MAX) + 1));
        assert_eq!(TextareaHandler.component(&huge, &FieldValue::empty()), Component::Textarea { rows: 3 });
    }
}
