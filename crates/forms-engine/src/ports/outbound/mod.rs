//! Outbound ports
//!
//! Hexagonal architecture: collaborators the engine calls out to. All I/O is
//! async and fallible; callers report failures instead of crashing on them.

use async_trait::async_trait;
use thiserror::Error;

use crate::application::dto::{UploadFile, UploadTarget};
use crate::domain::aggregates::{Form, FormSubmission};
use crate::domain::events::DomainEvent;
use crate::domain::value_objects::{EntityId, FormSlug, Language, UploadedFile};

/// Form persistence port
#[async_trait]
pub trait FormRepository: Send + Sync {
    async fn load_form(&self, id: &EntityId) -> Result<Form, RepositoryError>;

    /// Insert when the form has no id (assigning one), update otherwise
    async fn save_form(&self, form: &Form) -> Result<Form, RepositoryError>;

    async fn delete_form(&self, id: &EntityId) -> Result<(), RepositoryError>;

    /// Every row sharing the slug, across versions and languages
    async fn load_forms_by_slug(&self, slug: &FormSlug) -> Result<Vec<Form>, RepositoryError>;
}

/// Submission storage port
#[async_trait]
pub trait SubmissionRepository: Send + Sync {
    /// Insert when the submission has no id (assigning one), update otherwise
    async fn save_submission(&self, submission: &FormSubmission) -> Result<FormSubmission, RepositoryError>;

    async fn load_submission(&self, id: &EntityId) -> Result<FormSubmission, RepositoryError>;
}

/// File upload port
#[async_trait]
pub trait FileUploader: Send + Sync {
    async fn upload_files(
        &self,
        target: &UploadTarget,
        files: Vec<UploadFile>,
    ) -> Result<Vec<UploadedFile>, UploadError>;
}

/// Localization catalogue port
pub trait LanguageCatalogue: Send + Sync {
    fn languages(&self) -> Vec<Language>;
}

/// Shared alert/error sink for failures the user should see
pub trait ErrorReporter: Send + Sync {
    fn report(&self, message: &str);
}

/// Event publisher port
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, events: Vec<DomainEvent>) -> Result<(), RepositoryError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RepositoryError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UploadError {
    #[error("upload failed: {0}")]
    Failed(String),

    #[error("file {file_name} rejected: {reason}")]
    Rejected { file_name: String, reason: String },
}
