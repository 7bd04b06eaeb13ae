//! Aggregates module

pub mod field;
pub mod form;
pub mod submission;

pub use field::{Field, FieldGroup, Parent, MAX_GROUP_DEPTH};
pub use form::{FieldPatch, Form, FormState, SchemaError, SchemaNode};
pub use submission::{FieldRef, FieldResponse, FormRef, FormSubmission};
