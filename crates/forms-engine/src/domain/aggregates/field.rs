//! Field and FieldGroup entities
//!
//! Both node kinds belong to exactly one parent. The parent link is a
//! tagged union, so "form and group at once" cannot be represented.

use serde::{Deserialize, Serialize};

use crate::domain::services::ordering::{sorted_for_display, DisplayOrder};
use crate::domain::value_objects::{ElementProperties, EntityId, FieldType, TypeParams};

/// Deepest allowed group nesting: top-level group (1) + one subgroup level (2)
pub const MAX_GROUP_DEPTH: u8 = 2;

/// Where a schema node hangs
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id")]
pub enum Parent {
    #[serde(rename = "form-child")]
    Form,
    #[serde(rename = "group-child")]
    Group(EntityId),
}

impl Parent {
    pub fn group_id(&self) -> Option<&EntityId> {
        match self {
            Parent::Form => None,
            Parent::Group(id) => Some(id),
        }
    }
}

/// A single input definition
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Field {
    pub id: EntityId,
    /// Machine key, unique within the form
    #[serde(default)]
    pub name: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub help_text: Option<String>,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub element_properties: ElementProperties,
    #[serde(default)]
    pub type_params: TypeParams,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub order: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    parent: Option<Parent>,
}

impl Field {
    pub fn new(label: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            id: EntityId::new(),
            name: String::new(),
            label: label.into(),
            placeholder: None,
            help_text: None,
            field_type,
            element_properties: ElementProperties::new(),
            type_params: TypeParams::default(),
            required: false,
            order: 0,
            parent: None,
        }
    }

    pub fn with_id(mut self, id: EntityId) -> Self {
        self.id = id;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }

    pub fn with_placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.placeholder = Some(placeholder.into());
        self
    }

    pub fn with_help_text(mut self, help_text: impl Into<String>) -> Self {
        self.help_text = Some(help_text.into());
        self
    }

    pub fn with_type_params(mut self, params: TypeParams) -> Self {
        self.type_params = params;
        self
    }

    pub fn with_element_property(mut self, key: &str, value: serde_json::Value) -> Self {
        self.element_properties.insert(key.to_string(), value);
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// `None` until the field is attached to a form
    pub fn parent(&self) -> Option<&Parent> {
        self.parent.as_ref()
    }

    pub(crate) fn set_parent(&mut self, parent: Parent) {
        self.parent = Some(parent);
    }
}

impl DisplayOrder for Field {
    fn display_order(&self) -> i32 {
        self.order
    }
}

/// Named bucket of fields, optionally holding one level of subgroups
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldGroup {
    pub id: EntityId,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub order: i32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub(crate) fields: Vec<Field>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub(crate) child_groups: Vec<FieldGroup>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    parent: Option<Parent>,
}

impl FieldGroup {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: EntityId::new(),
            title: title.into(),
            subtitle: None,
            description: None,
            order: 0,
            fields: Vec::new(),
            child_groups: Vec::new(),
            parent: None,
        }
    }

    pub fn with_id(mut self, id: EntityId) -> Self {
        self.id = id;
        self
    }

    pub fn with_subtitle(mut self, subtitle: impl Into<String>) -> Self {
        self.subtitle = Some(subtitle.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }

    /// Add a field to a detached group. Names are assigned on attach.
    pub fn with_field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    /// Add a subgroup to a detached group. Depth is checked on attach.
    pub fn with_subgroup(mut self, group: FieldGroup) -> Self {
        self.child_groups.push(group);
        self
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn child_groups(&self) -> &[FieldGroup] {
        &self.child_groups
    }

    pub fn parent(&self) -> Option<&Parent> {
        self.parent.as_ref()
    }

    pub fn sorted_fields(&self) -> Vec<&Field> {
        sorted_for_display(&self.fields)
    }

    pub fn sorted_child_groups(&self) -> Vec<&FieldGroup> {
        sorted_for_display(&self.child_groups)
    }

    /// Levels of groups in this subtree, counting itself
    pub fn height(&self) -> u8 {
        1 + self
            .child_groups
            .iter()
            .map(FieldGroup::height)
            .max()
            .unwrap_or(0)
    }

    /// Set parent links for this group and everything below it
    pub(crate) fn link(&mut self, parent: Parent) {
        self.parent = Some(parent);
        let own = Parent::Group(self.id.clone());
        for field in &mut self.fields {
            field.set_parent(own.clone());
        }
        for child in &mut self.child_groups {
            child.link(own.clone());
        }
    }

    /// Pre-order walk: own fields, then each subgroup's walk
    pub(crate) fn collect_fields<'a>(&'a self, out: &mut Vec<&'a Field>) {
        out.extend(self.fields.iter());
        for child in &self.child_groups {
            child.collect_fields(out);
        }
    }

    /// Ids of this group and every group below it, pre-order
    pub(crate) fn group_ids(&self) -> Vec<&EntityId> {
        let mut out = vec![&self.id];
        for child in &self.child_groups {
            out.extend(child.group_ids());
        }
        out
    }

    pub(crate) fn fields_mut_recursive(&mut self) -> Vec<&mut Field> {
        let mut out: Vec<&mut Field> = self.fields.iter_mut().collect();
        for child in &mut self.child_groups {
            out.extend(child.fields_mut_recursive());
        }
        out
    }
}

impl DisplayOrder for FieldGroup {
    fn display_order(&self) -> i32 {
        self.order
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parent_serializes_as_tagged_union() {
        let json = serde_json::to_value(Parent::Group(EntityId::from_string("g1"))).unwrap();
        assert_eq!(json, serde_json::json!({"kind": "group-child", "id": "g1"}));

        let json = serde_json::to_value(Parent::Form).unwrap();
        assert_eq!(json, serde_json::json!({"kind": "form-child"}));
    }

    #[test]
    fn test_field_serializes_type_key() {
        let field = Field::new("Age", FieldType::Number).with_name("age");
        let json = serde_json::to_value(&field).unwrap();
        assert_eq!(json["type"], "number");
        assert_eq!(json["name"], "age");
        assert!(json.get("parent").is_none());
    }

    #[test]
    fn test_height_counts_levels() {
        let group = FieldGroup::new("Outer").with_subgroup(FieldGroup::new("Inner"));
        assert_eq!(group.height(), 2);
        assert_eq!(FieldGroup::new("Flat").height(), 1);
    }

    #[test]
    fn test_link_sets_parents_recursively() {
        let mut group = FieldGroup::new("Outer")
            .with_field(Field::new("A", FieldType::Text))
            .with_subgroup(FieldGroup::new("Inner").with_field(Field::new("B", FieldType::Text)));
        group.link(Parent::Form);

        let outer_id = group.id.clone();
        assert_eq!(group.parent(), Some(&Parent::Form));
        assert_eq!(group.fields()[0].parent(), Some(&Parent::Group(outer_id.clone())));

        let inner = &group.child_groups()[0];
        assert_eq!(inner.parent(), Some(&Parent::Group(outer_id)));
        assert_eq!(inner.fields()[0].parent(), Some(&Parent::Group(inner.id.clone())));
    }
}
