//! In-memory repository implementations

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

use crate::domain::aggregates::{Form, FormSubmission};
use crate::domain::events::DomainEvent;
use crate::domain::value_objects::{EntityId, FormSlug};
use crate::ports::outbound::{
    EventPublisher, FormRepository, RepositoryError, SubmissionRepository,
};

/// In-memory form repository
#[derive(Default)]
pub struct InMemoryFormRepository {
    forms: DashMap<EntityId, Form>,
}

impl InMemoryFormRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.forms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forms.is_empty()
    }
}

#[async_trait]
impl FormRepository for InMemoryFormRepository {
    async fn load_form(&self, id: &EntityId) -> Result<Form, RepositoryError> {
        self.forms
            .get(id)
            .map(|f| f.value().clone())
            .ok_or_else(|| RepositoryError::NotFound(format!("form {}", id)))
    }

    async fn save_form(&self, form: &Form) -> Result<Form, RepositoryError> {
        let mut stored = form.clone();
        let _ = stored.take_events();

        let id = match stored.id() {
            Some(id) => id.clone(),
            None => {
                let id = EntityId::new();
                stored.assign_id(id.clone());
                id
            }
        };

        debug!(form_id = %id, slug = %stored.slug(), version = stored.version(), "Form stored");
        self.forms.insert(id, stored.clone());
        Ok(stored)
    }

    async fn delete_form(&self, id: &EntityId) -> Result<(), RepositoryError> {
        self.forms
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| RepositoryError::NotFound(format!("form {}", id)))
    }

    async fn load_forms_by_slug(&self, slug: &FormSlug) -> Result<Vec<Form>, RepositoryError> {
        Ok(self
            .forms
            .iter()
            .filter(|entry| entry.value().slug() == slug)
            .map(|entry| entry.value().clone())
            .collect())
    }
}

/// In-memory submission repository. Can be switched into a failing mode to
/// exercise I/O error paths.
#[derive(Default)]
pub struct InMemorySubmissionRepository {
    submissions: DashMap<EntityId, FormSubmission>,
    failing: AtomicBool,
}

impl InMemorySubmissionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.submissions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.submissions.is_empty()
    }

    fn check_available(&self) -> Result<(), RepositoryError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(RepositoryError::Connection("submission store unavailable".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl SubmissionRepository for InMemorySubmissionRepository {
    async fn save_submission(&self, submission: &FormSubmission) -> Result<FormSubmission, RepositoryError> {
        self.check_available()?;

        let mut stored = submission.clone();
        let id = stored.id.get_or_insert_with(EntityId::new).clone();
        self.submissions.insert(id, stored.clone());
        Ok(stored)
    }

    async fn load_submission(&self, id: &EntityId) -> Result<FormSubmission, RepositoryError> {
        self.check_available()?;

        self.submissions
            .get(id)
            .map(|s| s.value().clone())
            .ok_or_else(|| RepositoryError::NotFound(format!("submission {}", id)))
    }
}

/// No-op event publisher
pub struct NoOpEventPublisher;

#[async_trait]
impl EventPublisher for NoOpEventPublisher {
    async fn publish(&self, _events: Vec<DomainEvent>) -> Result<(), RepositoryError> {
        Ok(())
    }
}

/// Keeps every published event, in order
#[derive(Default)]
pub struct RecordingEventPublisher {
    events: Mutex<Vec<DomainEvent>>,
}

impl RecordingEventPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<DomainEvent> {
        self.events.lock().clone()
    }

    pub fn event_types(&self) -> Vec<&'static str> {
        self.events.lock().iter().map(DomainEvent::event_type).collect()
    }
}

#[async_trait]
impl EventPublisher for RecordingEventPublisher {
    async fn publish(&self, events: Vec<DomainEvent>) -> Result<(), RepositoryError> {
        self.events.lock().extend(events);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_save_assigns_id_once() {
        let repo = InMemoryFormRepository::new();
        let saved = repo.save_form(&Form::create("intake", "en", "Intake")).await.unwrap();
        let id = saved.id().cloned().unwrap();

        let again = repo.save_form(&saved).await.unwrap();
        assert_eq!(again.id(), Some(&id));
        assert_eq!(repo.len(), 1);
    }

    #[tokio::test]
    async fn test_load_by_slug_filters_lineage() {
        let repo = InMemoryFormRepository::new();
        repo.save_form(&Form::create("intake", "en", "Intake")).await.unwrap();
        repo.save_form(&Form::create("intake", "fr", "Accueil")).await.unwrap();
        repo.save_form(&Form::create("exit", "en", "Exit")).await.unwrap();

        let rows = repo.load_forms_by_slug(&FormSlug::new("intake")).await.unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[tokio::test]
    async fn test_delete_missing_form() {
        let repo = InMemoryFormRepository::new();
        let result = repo.delete_form(&EntityId::from_string("nope")).await;
        assert!(matches!(result, Err(RepositoryError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_failing_submission_store() {
        let repo = InMemorySubmissionRepository::new();
        repo.set_failing(true);
        let submission = FormSubmission::create(EntityId::from_string("form-1"), vec![]);
        assert!(matches!(
            repo.save_submission(&submission).await,
            Err(RepositoryError::Connection(_))
        ));

        repo.set_failing(false);
        let saved = repo.save_submission(&submission).await.unwrap();
        assert!(saved.id.is_some());
        assert_eq!(repo.len(), 1);
    }
}
