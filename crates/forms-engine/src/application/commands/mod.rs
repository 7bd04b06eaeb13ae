//! Command handlers
//!
//! Application services that orchestrate use cases.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};

use crate::application::dto::*;
use crate::config::FormsConfig;
use crate::domain::aggregates::{Form, FormSubmission};
use crate::domain::events::{DomainEvent, FormEvent, SubmissionEvent};
use crate::domain::services::{NameDeriver, VersionError, VersionPolicy};
use crate::domain::value_objects::{EntityId, FormSlug, Language, LanguageTag};
use crate::ports::inbound::{FormUseCases, SubmissionUseCases, UseCaseError};
use crate::ports::outbound::{
    EventPublisher, FormRepository, LanguageCatalogue, RepositoryError, SubmissionRepository,
};
use crate::registry::FieldTypeRegistry;

/// Form lineage application service
pub struct FormService {
    form_repo: Arc<dyn FormRepository>,
    catalogue: Arc<dyn LanguageCatalogue>,
    event_publisher: Arc<dyn EventPublisher>,
    naming: NameDeriver,
    default_language: LanguageTag,
}

impl FormService {
    pub fn new(
        form_repo: Arc<dyn FormRepository>,
        catalogue: Arc<dyn LanguageCatalogue>,
        event_publisher: Arc<dyn EventPublisher>,
        config: &FormsConfig,
    ) -> Self {
        Self {
            form_repo,
            catalogue,
            event_publisher,
            naming: NameDeriver::new(&config.naming),
            default_language: LanguageTag::new(config.default_language.clone()),
        }
    }

    async fn rows(&self, slug: &FormSlug) -> Result<Vec<Form>, UseCaseError> {
        let mut rows = self.form_repo.load_forms_by_slug(slug).await?;
        for row in &mut rows {
            row.set_naming(self.naming.clone());
        }
        Ok(rows)
    }

    /// Refuse to overwrite a row that storage already holds as published
    async fn ensure_stored_draft(&self, form: &Form) -> Result<(), UseCaseError> {
        if let Some(id) = form.id() {
            let stored = self.form_repo.load_form(id).await?;
            if !stored.is_draft() {
                return Err(VersionError::NotDraft.into());
            }
        }
        Ok(())
    }

    async fn persist(&self, form: &mut Form, extra: Option<FormEvent>) -> Result<Form, UseCaseError> {
        let mut events = form.take_events();
        let saved = self.form_repo.save_form(form).await?;

        if let Some(event) = extra {
            events.push(DomainEvent::Form(event));
        }
        self.event_publisher.publish(events).await?;
        Ok(saved)
    }
}

fn saved_id(form: &Form) -> Result<EntityId, UseCaseError> {
    form.id()
        .cloned()
        .ok_or_else(|| RepositoryError::Conflict("repository returned a form without id".into()).into())
}

#[async_trait]
impl FormUseCases for FormService {
    async fn create_form(&self, command: CreateFormCommand) -> Result<Form, UseCaseError> {
        let language = command.language.unwrap_or_else(|| self.default_language.clone());

        let rows = self.rows(&command.slug).await?;
        VersionPolicy::check_no_draft(&rows, &command.slug, &language)?;

        let mut form = Form::create(command.slug, language, command.title);
        form.set_naming(self.naming.clone());
        form.set_subtitle(command.subtitle)?;
        form.set_description(command.description)?;

        let saved = self.persist(&mut form, None).await?;
        info!(form_id = ?saved.id(), language = %saved.language(), "Form created");
        Ok(saved)
    }

    async fn save_draft(&self, mut form: Form) -> Result<Form, UseCaseError> {
        VersionPolicy::check_save_draft(&form)?;
        form.check_invariants()?;

        if form.id().is_none() {
            let rows = self.rows(form.slug()).await?;
            VersionPolicy::check_no_draft(&rows, form.slug(), form.language())?;
        } else {
            self.ensure_stored_draft(&form).await?;
        }

        let mut events = form.take_events();
        let saved = self.form_repo.save_form(&form).await?;
        events.push(DomainEvent::Form(FormEvent::DraftSaved {
            form_id: saved_id(&saved)?,
            slug: saved.slug().clone(),
            language: saved.language().clone(),
        }));
        self.event_publisher.publish(events).await?;

        info!(form_id = ?saved.id(), slug = %saved.slug(), "Draft saved");
        Ok(saved)
    }

    async fn publish(&self, mut form: Form) -> Result<Form, UseCaseError> {
        form.check_invariants()?;
        self.ensure_stored_draft(&form).await?;

        let rows = self.rows(form.slug()).await?;
        let version = VersionPolicy::publish(&mut form, &rows)?;

        let saved = self.persist(&mut form, None).await?;
        info!(
            form_id = ?saved.id(),
            slug = %saved.slug(),
            language = %saved.language(),
            version,
            "Form published"
        );
        Ok(saved)
    }

    async fn new_draft(&self, command: NewDraftCommand) -> Result<Form, UseCaseError> {
        let rows = self.rows(&command.slug).await?;
        VersionPolicy::check_no_draft(&rows, &command.slug, &command.language)?;

        let mut draft = match command.seed_from_version {
            Some(version) => {
                let source = VersionPolicy::select(&rows, &command.slug, &command.language, Some(version))
                    .filter(|f| f.is_published())
                    .ok_or_else(|| {
                        UseCaseError::NotFound(format!(
                            "{} ({}) has no published version {}",
                            command.slug, command.language, version
                        ))
                    })?;
                let mut draft = source.clone_structure_for_draft();
                draft.set_title(command.title)?;
                draft
            }
            None => {
                let mut draft = VersionPolicy::new_draft(&rows, &command.slug, &command.language, command.title)?;
                draft.set_naming(self.naming.clone());
                draft
            }
        };

        let created = FormEvent::DraftCreated {
            slug: command.slug.clone(),
            language: command.language.clone(),
        };
        let saved = self.persist(&mut draft, Some(created)).await?;
        info!(
            form_id = ?saved.id(),
            slug = %command.slug,
            language = %command.language,
            seeded_from = ?command.seed_from_version,
            "Draft created"
        );
        Ok(saved)
    }

    async fn delete_draft(&self, form_id: &EntityId) -> Result<(), UseCaseError> {
        let form = self.form_repo.load_form(form_id).await?;
        let rows = self.rows(form.slug()).await?;
        VersionPolicy::check_delete_draft(&form, &rows)?;

        self.form_repo.delete_form(form_id).await?;
        self.event_publisher
            .publish(vec![DomainEvent::Form(FormEvent::DraftDeleted {
                form_id: form_id.clone(),
                slug: form.slug().clone(),
                language: form.language().clone(),
            })])
            .await?;

        info!(form_id = %form_id, slug = %form.slug(), "Draft deleted");
        Ok(())
    }

    async fn select_version(
        &self,
        slug: &FormSlug,
        language: &LanguageTag,
        version: Option<u32>,
    ) -> Result<Option<Form>, UseCaseError> {
        let rows = self.rows(slug).await?;
        Ok(VersionPolicy::select(&rows, slug, language, version).cloned())
    }

    async fn lineage(&self, slug: &FormSlug) -> Result<Vec<Form>, UseCaseError> {
        let mut rows = self.rows(slug).await?;
        rows.sort_by(|a, b| {
            a.language()
                .cmp(b.language())
                .then_with(|| a.version().cmp(&b.version()))
        });
        Ok(rows)
    }

    async fn missing_languages(&self, slug: &FormSlug) -> Result<Vec<Language>, UseCaseError> {
        let rows = self.rows(slug).await?;
        let present: HashSet<&LanguageTag> = rows.iter().map(Form::language).collect();

        Ok(self
            .catalogue
            .languages()
            .into_iter()
            .filter(|l| !present.contains(&l.code))
            .collect())
    }
}

/// Submission application service
pub struct SubmissionService {
    submission_repo: Arc<dyn SubmissionRepository>,
    registry: Arc<FieldTypeRegistry>,
    event_publisher: Arc<dyn EventPublisher>,
}

impl SubmissionService {
    pub fn new(
        submission_repo: Arc<dyn SubmissionRepository>,
        registry: Arc<FieldTypeRegistry>,
        event_publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            submission_repo,
            registry,
            event_publisher,
        }
    }

    async fn store(&self, submission: FormSubmission) -> Result<FormSubmission, UseCaseError> {
        let saved = self.submission_repo.save_submission(&submission).await?;
        let submission_id = saved
            .id
            .clone()
            .ok_or_else(|| RepositoryError::Conflict("repository returned a submission without id".into()))?;

        self.event_publisher
            .publish(vec![DomainEvent::Submission(SubmissionEvent::Saved {
                submission_id,
                form_id: saved.form.id.clone(),
                response_count: saved.field_responses.len(),
            })])
            .await?;
        Ok(saved)
    }
}

#[async_trait]
impl SubmissionUseCases for SubmissionService {
    async fn submit(&self, form: &Form, submission: FormSubmission) -> Result<FormSubmission, UseCaseError> {
        let issues: Vec<_> = form
            .all_fields()
            .into_iter()
            .filter(|f| !f.field_type.is_presentational())
            .filter_map(|f| {
                let value = submission.response_for(&f.id).map(|r| &r.value);
                self.registry.validate(f, value).err()
            })
            .collect();

        if !issues.is_empty() {
            warn!(form = %form.slug(), issues = issues.len(), "Submission rejected");
            return Err(UseCaseError::Validation(issues));
        }

        let saved = self.store(submission).await?;
        info!(submission_id = ?saved.id, form_id = %saved.form.id, "Submission saved");
        Ok(saved)
    }

    async fn save_progress(&self, submission: FormSubmission) -> Result<FormSubmission, UseCaseError> {
        self.store(submission).await
    }
}
