//! Form Aggregate
//!
//! Root of the schema tree (`Form` -> `FieldGroup` -> `Field`). Nesting and
//! naming invariants are enforced here, at attach time, rather than trusted
//! to the shape of the data.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

use crate::domain::aggregates::field::{Field, FieldGroup, Parent, MAX_GROUP_DEPTH};
use crate::domain::events::{DomainEvent, FormEvent};
use crate::domain::services::naming::NameDeriver;
use crate::domain::services::ordering::sorted_for_display;
use crate::domain::value_objects::{
    ElementProperties, EntityId, FieldType, FormSlug, LanguageTag, TypeParams,
};

/// Form aggregate root
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Form {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<EntityId>,
    slug: FormSlug,
    title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    subtitle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(default)]
    fields: Vec<Field>,
    #[serde(default)]
    groups: Vec<FieldGroup>,
    #[serde(default)]
    state: FormState,
    #[serde(default)]
    version: u32,
    language: LanguageTag,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    published_at: Option<DateTime<Utc>>,
    #[serde(skip)]
    naming: NameDeriver,
    #[serde(skip)]
    events: Vec<DomainEvent>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormState {
    #[default]
    Draft,
    Published,
}

/// A node that can be attached to a form
#[derive(Clone, Debug)]
pub enum SchemaNode {
    Field(Field),
    Group(FieldGroup),
}

/// Partial update of a field. `None` leaves the attribute as is.
#[derive(Clone, Debug, Default)]
pub struct FieldPatch {
    pub label: Option<String>,
    pub placeholder: Option<String>,
    pub help_text: Option<String>,
    pub field_type: Option<FieldType>,
    pub type_params: Option<TypeParams>,
    pub element_properties: Option<ElementProperties>,
    pub required: Option<bool>,
    pub order: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("invalid parent: {reason}")]
    InvalidParent { reason: String },

    #[error("group not found: {0}")]
    GroupNotFound(EntityId),

    #[error("field not found: {0}")]
    FieldNotFound(EntityId),

    #[error("node already attached: {0}")]
    DuplicateNode(EntityId),

    #[error("no unique name available for '{base}'")]
    NameExhausted { base: String },

    #[error("duplicate field name: {0}")]
    DuplicateName(String),

    #[error("published forms cannot be edited")]
    PublishedImmutable,
}

impl Form {
    /// Create an empty working copy (`version = 0`, draft)
    pub fn create(
        slug: impl Into<FormSlug>,
        language: impl Into<LanguageTag>,
        title: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        let mut form = Self {
            id: None,
            slug: slug.into(),
            title: title.into(),
            subtitle: None,
            description: None,
            fields: Vec::new(),
            groups: Vec::new(),
            state: FormState::Draft,
            version: 0,
            language: language.into(),
            created_at: now,
            updated_at: now,
            published_at: None,
            naming: NameDeriver::default(),
            events: Vec::new(),
        };

        form.raise_event(DomainEvent::Form(FormEvent::Created {
            slug: form.slug.clone(),
            language: form.language.clone(),
            created_at: now,
        }));

        form
    }

    // =========================================================================
    // Getters
    // =========================================================================

    pub fn id(&self) -> Option<&EntityId> { self.id.as_ref() }
    pub fn slug(&self) -> &FormSlug { &self.slug }
    pub fn title(&self) -> &str { &self.title }
    pub fn subtitle(&self) -> Option<&str> { self.subtitle.as_deref() }
    pub fn description(&self) -> Option<&str> { self.description.as_deref() }
    pub fn fields(&self) -> &[Field] { &self.fields }
    pub fn groups(&self) -> &[FieldGroup] { &self.groups }
    pub fn state(&self) -> FormState { self.state }
    pub fn version(&self) -> u32 { self.version }
    pub fn language(&self) -> &LanguageTag { &self.language }
    pub fn created_at(&self) -> DateTime<Utc> { self.created_at }
    pub fn updated_at(&self) -> DateTime<Utc> { self.updated_at }
    pub fn published_at(&self) -> Option<DateTime<Utc>> { self.published_at }

    pub fn is_draft(&self) -> bool {
        self.state == FormState::Draft
    }

    pub fn is_published(&self) -> bool {
        self.state == FormState::Published
    }

    pub fn sorted_fields(&self) -> Vec<&Field> {
        sorted_for_display(&self.fields)
    }

    pub fn sorted_groups(&self) -> Vec<&FieldGroup> {
        sorted_for_display(&self.groups)
    }

    // =========================================================================
    // Lookup
    // =========================================================================

    /// Every field in the form, pre-order: top-level fields, then each
    /// group's fields followed by its subgroups
    pub fn all_fields(&self) -> Vec<&Field> {
        let mut out: Vec<&Field> = self.fields.iter().collect();
        for group in &self.groups {
            group.collect_fields(&mut out);
        }
        out
    }

    pub fn field_names(&self) -> HashSet<String> {
        self.all_fields().into_iter().map(|f| f.name.clone()).collect()
    }

    pub fn find_field(&self, id: &EntityId) -> Option<&Field> {
        self.all_fields().into_iter().find(|f| &f.id == id)
    }

    pub fn find_group(&self, id: &EntityId) -> Option<&FieldGroup> {
        fn search<'a>(groups: &'a [FieldGroup], id: &EntityId) -> Option<&'a FieldGroup> {
            for group in groups {
                if &group.id == id {
                    return Some(group);
                }
                if let Some(found) = search(&group.child_groups, id) {
                    return Some(found);
                }
            }
            None
        }
        search(&self.groups, id)
    }

    /// 1 for a top-level group, 2 for a subgroup
    pub fn group_depth(&self, id: &EntityId) -> Option<u8> {
        fn search(groups: &[FieldGroup], id: &EntityId, depth: u8) -> Option<u8> {
            for group in groups {
                if &group.id == id {
                    return Some(depth);
                }
                if let Some(found) = search(&group.child_groups, id, depth + 1) {
                    return Some(found);
                }
            }
            None
        }
        search(&self.groups, id, 1)
    }

    // =========================================================================
    // Business Operations
    // =========================================================================

    /// Replace the naming policy used for label-derived machine names
    pub fn set_naming(&mut self, naming: NameDeriver) {
        self.naming = naming;
    }

    pub fn set_title(&mut self, title: impl Into<String>) -> Result<(), SchemaError> {
        self.ensure_editable()?;
        self.title = title.into();
        self.touch();
        Ok(())
    }

    pub fn set_subtitle(&mut self, subtitle: Option<String>) -> Result<(), SchemaError> {
        self.ensure_editable()?;
        self.subtitle = subtitle;
        self.touch();
        Ok(())
    }

    pub fn set_description(&mut self, description: Option<String>) -> Result<(), SchemaError> {
        self.ensure_editable()?;
        self.description = description;
        self.touch();
        Ok(())
    }

    pub fn attach(&mut self, node: SchemaNode, parent: Parent) -> Result<EntityId, SchemaError> {
        match node {
            SchemaNode::Field(field) => self.attach_field(field, parent),
            SchemaNode::Group(group) => self.attach_group(group, parent),
        }
    }

    /// Attach a field to the form or to one of its groups.
    ///
    /// A missing name is derived from the label; a colliding one is suffixed.
    pub fn attach_field(&mut self, mut field: Field, parent: Parent) -> Result<EntityId, SchemaError> {
        self.ensure_editable()?;
        if let Some(group_id) = parent.group_id() {
            if self.find_group(group_id).is_none() {
                return Err(SchemaError::GroupNotFound(group_id.clone()));
            }
        }
        if self.find_field(&field.id).is_some() {
            return Err(SchemaError::DuplicateNode(field.id));
        }

        let mut taken = self.field_names();
        self.assign_name(&mut field, &mut taken)?;
        field.set_parent(parent.clone());

        let id = field.id.clone();
        match parent {
            Parent::Form => self.fields.push(field),
            Parent::Group(group_id) => match self.find_group_mut(&group_id) {
                Some(group) => group.fields.push(field),
                None => return Err(SchemaError::GroupNotFound(group_id)),
            },
        }
        self.touch();
        Ok(id)
    }

    /// Attach a group (with any fields and subgroups it carries).
    ///
    /// Rejects anything that would put a group deeper than one subgroup level.
    pub fn attach_group(&mut self, mut group: FieldGroup, parent: Parent) -> Result<EntityId, SchemaError> {
        self.ensure_editable()?;

        let parent_depth = match parent.group_id() {
            None => 0,
            Some(group_id) => self
                .group_depth(group_id)
                .ok_or_else(|| SchemaError::GroupNotFound(group_id.clone()))?,
        };

        if parent_depth >= MAX_GROUP_DEPTH {
            return Err(SchemaError::InvalidParent {
                reason: "a subgroup cannot receive child groups".into(),
            });
        }
        if parent_depth + group.height() > MAX_GROUP_DEPTH {
            return Err(SchemaError::InvalidParent {
                reason: format!(
                    "group '{}' would nest deeper than {} levels",
                    group.title, MAX_GROUP_DEPTH
                ),
            });
        }
        {
            let mut incoming = HashSet::new();
            for group_id in group.group_ids() {
                if self.find_group(group_id).is_some() || !incoming.insert(group_id) {
                    return Err(SchemaError::DuplicateNode(group_id.clone()));
                }
            }
        }

        let mut taken = self.field_names();
        let mut existing: HashSet<EntityId> = self.all_fields().iter().map(|f| f.id.clone()).collect();
        let naming = self.naming.clone();
        for field in group.fields_mut_recursive() {
            if !existing.insert(field.id.clone()) {
                return Err(SchemaError::DuplicateNode(field.id.clone()));
            }
            assign_name_with(&naming, field, &mut taken)?;
        }
        group.link(parent.clone());

        let id = group.id.clone();
        match parent {
            Parent::Form => self.groups.push(group),
            Parent::Group(group_id) => match self.find_group_mut(&group_id) {
                Some(target) => target.child_groups.push(group),
                None => return Err(SchemaError::GroupNotFound(group_id)),
            },
        }
        self.touch();
        Ok(id)
    }

    /// Change a field's label and re-derive its machine name.
    ///
    /// An unchanged label leaves the name alone.
    pub fn set_field_label(&mut self, id: &EntityId, label: impl Into<String>) -> Result<String, SchemaError> {
        self.ensure_editable()?;
        let label = label.into();

        let current = self
            .find_field(id)
            .ok_or_else(|| SchemaError::FieldNotFound(id.clone()))?;
        if current.label == label {
            return Ok(current.name.clone());
        }

        let taken: HashSet<String> = self
            .all_fields()
            .into_iter()
            .filter(|f| &f.id != id)
            .map(|f| f.name.clone())
            .collect();
        let name = self.naming.derive(&label, &taken)?;

        let field = self
            .find_field_mut(id)
            .ok_or_else(|| SchemaError::FieldNotFound(id.clone()))?;
        field.label = label;
        field.name = name.clone();
        self.touch();
        Ok(name)
    }

    pub fn edit_field(&mut self, id: &EntityId, patch: FieldPatch) -> Result<(), SchemaError> {
        self.ensure_editable()?;
        if let Some(label) = patch.label {
            self.set_field_label(id, label)?;
        }

        let field = self
            .find_field_mut(id)
            .ok_or_else(|| SchemaError::FieldNotFound(id.clone()))?;
        if patch.placeholder.is_some() {
            field.placeholder = patch.placeholder;
        }
        if patch.help_text.is_some() {
            field.help_text = patch.help_text;
        }
        if let Some(field_type) = patch.field_type {
            field.field_type = field_type;
        }
        if let Some(params) = patch.type_params {
            field.type_params = params;
        }
        if let Some(props) = patch.element_properties {
            field.element_properties = props;
        }
        if let Some(required) = patch.required {
            field.required = required;
        }
        if let Some(order) = patch.order {
            field.order = order;
        }
        self.touch();
        Ok(())
    }

    pub fn remove_field(&mut self, id: &EntityId) -> Result<Field, SchemaError> {
        self.ensure_editable()?;

        fn take(fields: &mut Vec<Field>, id: &EntityId) -> Option<Field> {
            let index = fields.iter().position(|f| &f.id == id)?;
            Some(fields.remove(index))
        }
        fn take_in_groups(groups: &mut [FieldGroup], id: &EntityId) -> Option<Field> {
            for group in groups {
                if let Some(field) = take(&mut group.fields, id) {
                    return Some(field);
                }
                if let Some(field) = take_in_groups(&mut group.child_groups, id) {
                    return Some(field);
                }
            }
            None
        }

        let removed = take(&mut self.fields, id)
            .or_else(|| take_in_groups(&mut self.groups, id))
            .ok_or_else(|| SchemaError::FieldNotFound(id.clone()))?;
        self.touch();
        Ok(removed)
    }

    /// Remove a group together with its fields and subgroups
    pub fn remove_group(&mut self, id: &EntityId) -> Result<FieldGroup, SchemaError> {
        self.ensure_editable()?;

        fn take(groups: &mut Vec<FieldGroup>, id: &EntityId) -> Option<FieldGroup> {
            if let Some(index) = groups.iter().position(|g| &g.id == id) {
                return Some(groups.remove(index));
            }
            for group in groups.iter_mut() {
                if let Some(found) = take(&mut group.child_groups, id) {
                    return Some(found);
                }
            }
            None
        }

        let removed = take(&mut self.groups, id).ok_or_else(|| SchemaError::GroupNotFound(id.clone()))?;
        self.touch();
        Ok(removed)
    }

    /// Copy this form's structure into a fresh `version = 0` draft.
    ///
    /// Node ids are reissued; names, ordering and parameters are kept.
    pub fn clone_structure_for_draft(&self) -> Form {
        let mut draft = Form::create(self.slug.clone(), self.language.clone(), self.title.clone());
        draft.subtitle = self.subtitle.clone();
        draft.description = self.description.clone();
        draft.naming = self.naming.clone();

        draft.fields = self
            .fields
            .iter()
            .map(|f| {
                let mut copy = f.clone().with_id(EntityId::new());
                copy.set_parent(Parent::Form);
                copy
            })
            .collect();
        draft.groups = self
            .groups
            .iter()
            .map(|g| {
                let mut copy = reissue_group_ids(g);
                copy.link(Parent::Form);
                copy
            })
            .collect();
        draft
    }

    /// Verify parent links, nesting depth and name uniqueness.
    ///
    /// Used on rows that arrive from storage, where the aggregate could
    /// not guard construction.
    pub fn check_invariants(&self) -> Result<(), SchemaError> {
        for field in &self.fields {
            if field.parent() != Some(&Parent::Form) {
                return Err(SchemaError::InvalidParent {
                    reason: format!("field {} is not linked to the form", field.id),
                });
            }
        }

        fn check_group(group: &FieldGroup, expected: &Parent, depth: u8) -> Result<(), SchemaError> {
            if depth > MAX_GROUP_DEPTH {
                return Err(SchemaError::InvalidParent {
                    reason: format!("group {} nested at depth {}", group.id, depth),
                });
            }
            if group.parent() != Some(expected) {
                return Err(SchemaError::InvalidParent {
                    reason: format!("group {} has a mismatched parent", group.id),
                });
            }
            let own = Parent::Group(group.id.clone());
            for field in group.fields() {
                if field.parent() != Some(&own) {
                    return Err(SchemaError::InvalidParent {
                        reason: format!("field {} has a mismatched parent", field.id),
                    });
                }
            }
            for child in group.child_groups() {
                check_group(child, &own, depth + 1)?;
            }
            Ok(())
        }

        for group in &self.groups {
            check_group(group, &Parent::Form, 1)?;
        }

        let mut seen = HashSet::new();
        for field in self.all_fields() {
            if !seen.insert(field.name.as_str()) {
                return Err(SchemaError::DuplicateName(field.name.clone()));
            }
        }
        Ok(())
    }

    // =========================================================================
    // Lineage transitions (driven by VersionPolicy)
    // =========================================================================

    pub fn assign_id(&mut self, id: EntityId) {
        self.id = Some(id);
    }

    pub(crate) fn mark_published(&mut self, version: u32) {
        let now = Utc::now();
        self.state = FormState::Published;
        self.version = version;
        self.published_at = Some(now);
        self.touch();

        self.raise_event(DomainEvent::Form(FormEvent::Published {
            form_id: self.id.clone(),
            slug: self.slug.clone(),
            language: self.language.clone(),
            version,
            published_at: now,
        }));
    }

    // =========================================================================
    // Domain Events
    // =========================================================================

    pub fn take_events(&mut self) -> Vec<DomainEvent> {
        std::mem::take(&mut self.events)
    }

    fn raise_event(&mut self, event: DomainEvent) {
        self.events.push(event);
    }

    fn ensure_editable(&self) -> Result<(), SchemaError> {
        if self.is_published() {
            return Err(SchemaError::PublishedImmutable);
        }
        Ok(())
    }

    fn assign_name(&self, field: &mut Field, taken: &mut HashSet<String>) -> Result<(), SchemaError> {
        assign_name_with(&self.naming, field, taken)
    }

    fn find_field_mut(&mut self, id: &EntityId) -> Option<&mut Field> {
        if let Some(field) = self.fields.iter_mut().find(|f| &f.id == id) {
            return Some(field);
        }
        self.groups
            .iter_mut()
            .flat_map(|g| g.fields_mut_recursive())
            .find(|f| &f.id == id)
    }

    fn find_group_mut(&mut self, id: &EntityId) -> Option<&mut FieldGroup> {
        fn search<'a>(groups: &'a mut [FieldGroup], id: &EntityId) -> Option<&'a mut FieldGroup> {
            for group in groups {
                if &group.id == id {
                    return Some(group);
                }
                if let Some(found) = search(&mut group.child_groups, id) {
                    return Some(found);
                }
            }
            None
        }
        search(&mut self.groups, id)
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

fn assign_name_with(
    naming: &NameDeriver,
    field: &mut Field,
    taken: &mut HashSet<String>,
) -> Result<(), SchemaError> {
    let source = if field.name.is_empty() {
        field.label.clone()
    } else {
        field.name.clone()
    };
    let name = naming.derive(&source, taken)?;
    taken.insert(name.clone());
    field.name = name;
    Ok(())
}

fn reissue_group_ids(group: &FieldGroup) -> FieldGroup {
    let mut copy = group.clone().with_id(EntityId::new());
    copy.fields = group
        .fields
        .iter()
        .map(|f| f.clone().with_id(EntityId::new()))
        .collect();
    copy.child_groups = group.child_groups.iter().map(reissue_group_ids).collect();
    copy
}
