//! Forms Engine
//!
//! Schema and versioning engine for composable, multi-language forms,
//! following Domain-Driven Design with a hexagonal ports layer.
//!
//! ## Architecture
//!
//! - **Domain Layer**: `Form` aggregate, field/group tree, submissions,
//!   value objects, lineage events and the version policy
//! - **Registry**: per-field-type rendering, coercion and validation
//! - **Application Layer**: form and submission services, the edit session,
//!   the response reconciler and the auto-execute scheduler
//! - **Ports Layer**: Hexagonal architecture interfaces
//! - **Infrastructure Layer**: In-memory adapters
//!
//! ## Invariants
//!
//! - Every field and group has exactly one parent; groups nest two deep
//! - Machine names are derived from labels and unique within a form
//! - A `(slug, language)` lineage has at most one draft, always `version = 0`
//! - Published rows are never edited in place
//! - An edit buffer is seeded at most once per submission identity

pub mod application;
pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod ports;
pub mod registry;
pub mod telemetry;

// Re-exports for convenience
pub use application::{
    AutoAction, AutoExecutor, DebounceTimer, EditBuffer, EditSession, FormService,
    ResponseReconciler, SessionError, SubmissionService,
};
pub use config::{AutoExecuteConfig, FormsConfig, NamingConfig};
pub use domain::aggregates::{
    Field, FieldGroup, FieldResponse, Form, FormState, FormSubmission, Parent, SchemaError,
};
pub use domain::events::{DomainEvent, FormEvent, SubmissionEvent};
pub use domain::services::{NameDeriver, VersionError, VersionPolicy};
pub use domain::value_objects::{EntityId, FieldType, FieldValue, FormSlug, LanguageTag};
pub use error::{FormsError, FormsResult};
pub use ports::inbound::{FormUseCases, SubmissionUseCases, UseCaseError};
pub use ports::outbound::{FormRepository, RepositoryError, SubmissionRepository};
pub use registry::{FieldHandler, FieldTypeRegistry};
