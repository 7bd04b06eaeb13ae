//! Submission aggregate
//!
//! A submission only references schema by id. The form is authoritative
//! and may have changed since the values were entered.

use serde::{Deserialize, Serialize};

use crate::domain::value_objects::{EntityId, FieldType, FieldValue};

/// Back-reference to the field a response answers
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FieldRef {
    pub id: EntityId,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub field_type: Option<FieldType>,
}

impl FieldRef {
    pub fn id_only(id: EntityId) -> Self {
        Self { id, field_type: None }
    }

    pub fn typed(id: EntityId, field_type: FieldType) -> Self {
        Self {
            id,
            field_type: Some(field_type),
        }
    }
}

/// One submitted value for one field
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldResponse {
    pub value: FieldValue,
    pub field: FieldRef,
    /// Seeds file-upload widgets; never needed to interpret `value`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loaded_value: Option<serde_json::Value>,
}

impl FieldResponse {
    pub fn new(field: FieldRef, value: FieldValue) -> Self {
        Self {
            value,
            field,
            loaded_value: None,
        }
    }

    pub fn field_id(&self) -> &EntityId {
        &self.field.id
    }
}

/// Back-reference to the form a submission was made against
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormRef {
    pub id: EntityId,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormSubmission {
    /// Absent until the first save
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<EntityId>,
    pub form: FormRef,
    #[serde(default)]
    pub field_responses: Vec<FieldResponse>,
}

impl FormSubmission {
    pub fn create(form_id: EntityId, field_responses: Vec<FieldResponse>) -> Self {
        Self {
            id: None,
            form: FormRef { id: form_id },
            field_responses,
        }
    }

    pub fn response_for(&self, field_id: &EntityId) -> Option<&FieldResponse> {
        self.field_responses.iter().find(|r| &r.field.id == field_id)
    }
}
