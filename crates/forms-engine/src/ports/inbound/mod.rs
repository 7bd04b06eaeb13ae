//! Inbound ports (Use case traits)
//!
//! Hexagonal architecture: application service interfaces.

use async_trait::async_trait;
use thiserror::Error;

use crate::application::dto::{CreateFormCommand, NewDraftCommand};
use crate::domain::aggregates::{Form, FormSubmission, SchemaError};
use crate::domain::services::VersionError;
use crate::domain::value_objects::{EntityId, FormSlug, Language, LanguageTag};
use crate::ports::outbound::RepositoryError;
use crate::registry::ValidationIssue;

/// Form lineage use cases
#[async_trait]
pub trait FormUseCases: Send + Sync {
    /// Create and store an empty `version = 0` draft
    async fn create_form(&self, command: CreateFormCommand) -> Result<Form, UseCaseError>;

    /// Insert or update a draft in place. No version bump.
    async fn save_draft(&self, form: Form) -> Result<Form, UseCaseError>;

    /// Publish a draft as the next version of its lineage
    async fn publish(&self, form: Form) -> Result<Form, UseCaseError>;

    /// Open the working copy for a lineage that has none
    async fn new_draft(&self, command: NewDraftCommand) -> Result<Form, UseCaseError>;

    async fn delete_draft(&self, form_id: &EntityId) -> Result<(), UseCaseError>;

    /// Read-only. No version means the draft if any, else the latest published.
    async fn select_version(
        &self,
        slug: &FormSlug,
        language: &LanguageTag,
        version: Option<u32>,
    ) -> Result<Option<Form>, UseCaseError>;

    async fn lineage(&self, slug: &FormSlug) -> Result<Vec<Form>, UseCaseError>;

    /// Catalogue languages with no variant for the slug yet
    async fn missing_languages(&self, slug: &FormSlug) -> Result<Vec<Language>, UseCaseError>;
}

/// Submission use cases
#[async_trait]
pub trait SubmissionUseCases: Send + Sync {
    /// Validate against the schema, then store
    async fn submit(&self, form: &Form, submission: FormSubmission) -> Result<FormSubmission, UseCaseError>;

    /// Store without validation (autosave of partial answers)
    async fn save_progress(&self, submission: FormSubmission) -> Result<FormSubmission, UseCaseError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UseCaseError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("{} field(s) failed validation", .0.len())]
    Validation(Vec<ValidationIssue>),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Version(#[from] VersionError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}
