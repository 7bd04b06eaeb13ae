//! Response Reconciler
//!
//! Merges a schema with previously submitted responses into an edit buffer
//! keyed by field id, and flattens the buffer back into a payload.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::domain::aggregates::{Field, FieldRef, FieldResponse, Form, FormSubmission};
use crate::domain::value_objects::{EntityId, FieldType, FieldValue};
use crate::registry::FieldTypeRegistry;

/// In-progress submission data, one entry per touched field.
///
/// Every mutation returns a new buffer; the receiver is never changed.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EditBuffer {
    entries: HashMap<EntityId, FieldResponse>,
}

impl EditBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed from a prior submission, or start empty.
    ///
    /// Each seeded entry keeps only the field id; the schema is the
    /// authority on types.
    pub fn build(schema: &Form, submission: Option<&FormSubmission>) -> Self {
        let Some(submission) = submission else {
            return Self::new();
        };

        let mut entries = HashMap::with_capacity(submission.field_responses.len());
        let mut orphaned = 0usize;
        for response in &submission.field_responses {
            let id = response.field.id.clone();
            if schema.find_field(&id).is_none() {
                orphaned += 1;
            }
            entries.insert(
                id.clone(),
                FieldResponse {
                    value: response.value.clone(),
                    field: FieldRef::id_only(id),
                    loaded_value: response.loaded_value.clone(),
                },
            );
        }

        if orphaned > 0 {
            debug!(
                form = %schema.slug(),
                orphaned,
                "Seeded responses for fields no longer in the schema"
            );
        }

        Self { entries }
    }

    /// Replace the entry for `field_id` wholesale with an already coerced value
    pub fn apply_edit(&self, field_id: &EntityId, field_type: FieldType, value: FieldValue) -> Self {
        let mut entries = self.entries.clone();
        entries.insert(
            field_id.clone(),
            FieldResponse::new(FieldRef::typed(field_id.clone(), field_type), value),
        );
        Self { entries }
    }

    /// Replace an entry, keeping the given widget seed alongside the value
    pub fn with_response(&self, response: FieldResponse) -> Self {
        let mut entries = self.entries.clone();
        entries.insert(response.field.id.clone(), response);
        Self { entries }
    }

    pub fn get(&self, field_id: &EntityId) -> Option<&FieldResponse> {
        self.entries.get(field_id)
    }

    pub fn value(&self, field_id: &EntityId) -> Option<&FieldValue> {
        self.entries.get(field_id).map(|r| &r.value)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Responses for touched fields only, in no particular order
    pub fn flatten(&self) -> Vec<FieldResponse> {
        self.entries.values().cloned().collect()
    }
}

/// Routes raw edits through the registry before they reach the buffer
#[derive(Clone)]
pub struct ResponseReconciler {
    registry: Arc<FieldTypeRegistry>,
}

impl ResponseReconciler {
    pub fn new(registry: Arc<FieldTypeRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &FieldTypeRegistry {
        &self.registry
    }

    /// Coerce `raw` for `field` and write it into a new buffer
    pub fn apply_edit(&self, buffer: &EditBuffer, field: &Field, raw: &Value) -> EditBuffer {
        let value = self.registry.coerce(field, raw, buffer.value(&field.id));
        buffer.apply_edit(&field.id, field.field_type.clone(), value)
    }
}

// =============================================================================
// Seed latch
// =============================================================================

#[derive(Clone, Debug, PartialEq, Eq)]
enum SeedIdentity {
    Unsaved,
    Saved(EntityId),
}

/// Lets the buffer be seeded at most once per submission identity
#[derive(Clone, Debug, Default)]
pub struct SeedLatch {
    seeded: Option<SeedIdentity>,
}

impl SeedLatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_loaded(&self) -> bool {
        self.seeded.is_some()
    }

    /// Returns true when `submission` should (re)seed the buffer, and takes
    /// the latch for it.
    pub fn should_seed(&mut self, submission: &FormSubmission) -> bool {
        let incoming = match &submission.id {
            Some(id) => SeedIdentity::Saved(id.clone()),
            None => SeedIdentity::Unsaved,
        };

        match (&self.seeded, incoming) {
            (None, incoming) => {
                self.seeded = Some(incoming);
                true
            }
            // First save of the submission we already seeded from
            (Some(SeedIdentity::Unsaved), SeedIdentity::Saved(id)) => {
                self.seeded = Some(SeedIdentity::Saved(id));
                false
            }
            (Some(SeedIdentity::Saved(current)), SeedIdentity::Saved(id)) if current != &id => {
                self.seeded = Some(SeedIdentity::Saved(id));
                true
            }
            _ => false,
        }
    }

    /// Record the id assigned by a save without re-seeding
    pub fn adopt(&mut self, id: EntityId) {
        self.seeded = Some(SeedIdentity::Saved(id));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::Parent;
    use serde_json::json;

    fn schema() -> (Form, EntityId, EntityId) {
        let mut form = Form::create("intake", "en", "Intake");
        let name = form
            .attach_field(Field::new("Name", FieldType::Text), Parent::Form)
            .unwrap();
        let agree = form
            .attach_field(Field::new("Agree", FieldType::Checkbox), Parent::Form)
            .unwrap();
        (form, name, agree)
    }

    #[test]
    fn test_edit_then_flatten_holds_only_touched_fields() {
        let (form, name, _) = schema();
        let buffer = EditBuffer::build(&form, None);
        let edited = buffer.apply_edit(&name, FieldType::Text, FieldValue::text("x"));

        let flat = edited.flatten();
        assert_eq!(flat.len(), 1);
        assert_eq!(flat[0].field, FieldRef::typed(name, FieldType::Text));
        assert_eq!(flat[0].value, FieldValue::text("x"));
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_seeded_entries_carry_only_field_id() {
        let (form, name, _) = schema();
        let submission = FormSubmission::create(
            EntityId::from_string("form-1"),
            vec![FieldResponse::new(
                FieldRef::typed(name.clone(), FieldType::Textarea),
                FieldValue::text("old"),
            )],
        );

        let buffer = EditBuffer::build(&form, Some(&submission));
        let entry = buffer.get(&name).unwrap();
        assert_eq!(entry.field, FieldRef::id_only(name));
        assert_eq!(entry.value, FieldValue::text("old"));
    }

    #[test]
    fn test_edit_replaces_entry_wholesale() {
        let (form, name, _) = schema();
        let mut seeded = FieldResponse::new(FieldRef::id_only(name.clone()), FieldValue::text("a"));
        seeded.loaded_value = Some(json!([{"key": "k"}]));
        let submission = FormSubmission::create(EntityId::from_string("form-1"), vec![seeded]);

        let buffer = EditBuffer::build(&form, Some(&submission));
        let edited = buffer.apply_edit(&name, FieldType::Text, FieldValue::text("b"));
        let entry = edited.get(&name).unwrap();
        assert_eq!(entry.value, FieldValue::text("b"));
        assert!(entry.loaded_value.is_none());
    }

    #[test]
    fn test_reconciler_coerces_through_registry() {
        let (form, _, agree) = schema();
        let reconciler = ResponseReconciler::new(Arc::new(FieldTypeRegistry::new()));
        let field = form.find_field(&agree).unwrap();

        let buffer = reconciler.apply_edit(&EditBuffer::new(), field, &json!("on"));
        assert_eq!(buffer.value(&agree), Some(&FieldValue::Bool(true)));
        assert_eq!(
            buffer.get(&agree).unwrap().field.field_type,
            Some(FieldType::Checkbox)
        );
    }

    #[test]
    fn test_latch_seeds_once_per_identity() {
        let mut latch = SeedLatch::new();
        let mut submission = FormSubmission::create(EntityId::from_string("form-1"), vec![]);
        submission.id = Some(EntityId::from_string("s1"));

        assert!(latch.should_seed(&submission));
        assert!(!latch.should_seed(&submission));

        submission.id = Some(EntityId::from_string("s2"));
        assert!(latch.should_seed(&submission));
    }

    #[test]
    fn test_latch_adopts_first_save_without_reseeding() {
        let mut latch = SeedLatch::new();
        let mut submission = FormSubmission::create(EntityId::from_string("form-1"), vec![]);

        assert!(latch.should_seed(&submission));
        assert!(!latch.should_seed(&submission));

        submission.id = Some(EntityId::from_string("s1"));
        assert!(!latch.should_seed(&submission));
        assert!(!latch.should_seed(&submission));
    }
}
