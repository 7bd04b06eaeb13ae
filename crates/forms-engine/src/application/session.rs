//! Edit session
//!
//! One session per form being filled in. It owns the edit buffer, the seed
//! latch and the auto-executor, and is torn down with `close`.

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::application::dto::{UploadFile, UploadTarget};
use crate::application::reconciler::{EditBuffer, ResponseReconciler, SeedLatch};
use crate::application::scheduler::{ActionError, AutoAction, AutoExecutor};
use crate::config::AutoExecuteConfig;
use crate::domain::aggregates::{FieldRef, FieldResponse, Form, FormRef, FormSubmission};
use crate::domain::value_objects::{EntityId, FieldValue, UploadedFile};
use crate::ports::inbound::{SubmissionUseCases, UseCaseError};
use crate::ports::outbound::{ErrorReporter, FileUploader, UploadError};
use crate::registry::{FieldTypeRegistry, ResolvedField};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("field {0} is not part of this form")]
    UnknownField(EntityId),

    #[error("form has not been saved yet")]
    UnsavedForm,

    #[error("no file uploader configured")]
    NoUploader,

    #[error(transparent)]
    Upload(#[from] UploadError),

    #[error(transparent)]
    UseCase(#[from] UseCaseError),
}

/// Id of the submission a session writes to, shared with its autosave.
///
/// Writers hold `lock_writes` across the read-store-record sequence so only
/// the first save of a session ever inserts a row.
#[derive(Clone, Debug, Default)]
pub struct SubmissionIdentity {
    id: Arc<RwLock<Option<EntityId>>>,
    writes: Arc<tokio::sync::Mutex<()>>,
}

impl SubmissionIdentity {
    pub fn get(&self) -> Option<EntityId> {
        self.id.read().clone()
    }

    pub fn set(&self, id: Option<EntityId>) {
        *self.id.write() = id;
    }

    pub async fn lock_writes(&self) -> tokio::sync::MutexGuard<'_, ()> {
        self.writes.lock().await
    }
}

pub struct EditSession {
    form: Arc<Form>,
    reconciler: ResponseReconciler,
    buffer: EditBuffer,
    latch: SeedLatch,
    identity: SubmissionIdentity,
    submissions: Arc<dyn SubmissionUseCases>,
    reporter: Arc<dyn ErrorReporter>,
    uploader: Option<Arc<dyn FileUploader>>,
    auto_execute: Option<AutoExecutor>,
}

impl EditSession {
    pub fn new(
        form: Arc<Form>,
        registry: Arc<FieldTypeRegistry>,
        submissions: Arc<dyn SubmissionUseCases>,
        reporter: Arc<dyn ErrorReporter>,
    ) -> Self {
        Self {
            form,
            reconciler: ResponseReconciler::new(registry),
            buffer: EditBuffer::new(),
            latch: SeedLatch::new(),
            identity: SubmissionIdentity::default(),
            submissions,
            reporter,
            uploader: None,
            auto_execute: None,
        }
    }

    pub fn with_uploader(mut self, uploader: Arc<dyn FileUploader>) -> Self {
        self.uploader = Some(uploader);
        self
    }

    /// Run `action` after edits settle
    pub fn with_auto_execute(mut self, action: Arc<dyn AutoAction>, config: &AutoExecuteConfig) -> Self {
        self.auto_execute = Some(AutoExecutor::new(action, Arc::clone(&self.reporter), config));
        self
    }

    /// Autosave partial answers to this session's submission after edits settle
    pub fn with_autosave(self, config: &AutoExecuteConfig) -> Result<Self, SessionError> {
        let form_id = self.form.id().cloned().ok_or(SessionError::UnsavedForm)?;
        let action = SubmissionAutosave::new(Arc::clone(&self.submissions), form_id, self.identity.clone());
        Ok(self.with_auto_execute(Arc::new(action), config))
    }

    pub fn form(&self) -> &Form {
        &self.form
    }

    pub fn buffer(&self) -> &EditBuffer {
        &self.buffer
    }

    pub fn submission_id(&self) -> Option<EntityId> {
        self.identity.get()
    }

    pub fn loading(&self) -> bool {
        self.auto_execute.as_ref().is_some_and(AutoExecutor::loading)
    }

    pub fn subscribe_loading(&self) -> Option<watch::Receiver<bool>> {
        self.auto_execute.as_ref().map(AutoExecutor::subscribe)
    }

    /// Offer the latest fetched submission. The buffer is seeded from it at
    /// most once per submission identity; returns whether seeding happened.
    pub fn sync_submission(&mut self, submission: Option<&FormSubmission>) -> bool {
        let Some(submission) = submission else {
            return false;
        };

        // The row this session already wrote to (e.g. by autosave)
        if !self.latch.is_loaded() {
            if let (Some(own), Some(incoming)) = (self.identity.get(), submission.id.as_ref()) {
                if &own == incoming {
                    self.latch.adopt(own);
                    return false;
                }
            }
        }

        if self.latch.should_seed(submission) {
            self.buffer = EditBuffer::build(&self.form, Some(submission));
            self.identity.set(submission.id.clone());
            debug!(
                submission_id = ?submission.id,
                responses = self.buffer.len(),
                "Edit buffer seeded"
            );
            return true;
        }

        if self.identity.get().is_none() {
            self.identity.set(submission.id.clone());
        }
        false
    }

    /// Apply a raw edit to one field and schedule the auto-executed action
    pub fn edit(&mut self, field_id: &EntityId, raw: &Value) -> Result<FieldValue, SessionError> {
        let form = Arc::clone(&self.form);
        let field = form
            .find_field(field_id)
            .ok_or_else(|| SessionError::UnknownField(field_id.clone()))?;

        self.buffer = self.reconciler.apply_edit(&self.buffer, field, raw);
        self.schedule_auto_execute();

        self.buffer
            .value(field_id)
            .cloned()
            .ok_or_else(|| SessionError::UnknownField(field_id.clone()))
    }

    /// Everything needed to render one field with its current value
    pub fn render(&self, field_id: &EntityId) -> Result<ResolvedField, SessionError> {
        let field = self
            .form
            .find_field(field_id)
            .ok_or_else(|| SessionError::UnknownField(field_id.clone()))?;
        Ok(self.reconciler.registry().render(field, self.buffer.value(field_id)))
    }

    /// Upload files for a file field. New keys are appended to the field's
    /// envelope; on failure the envelope is left as it was.
    pub async fn upload_files(
        &mut self,
        field_id: &EntityId,
        files: Vec<UploadFile>,
    ) -> Result<Vec<UploadedFile>, SessionError> {
        let form = Arc::clone(&self.form);
        let field = form
            .find_field(field_id)
            .ok_or_else(|| SessionError::UnknownField(field_id.clone()))?;
        let uploader = self.uploader.clone().ok_or(SessionError::NoUploader)?;

        let target = UploadTarget {
            form_id: form.id().cloned(),
            field_id: field_id.clone(),
        };
        let uploaded = match uploader.upload_files(&target, files).await {
            Ok(uploaded) => uploaded,
            Err(e) => {
                warn!(field = %field.name, error = %e, "Upload failed");
                self.reporter.report(&format!("Could not upload files: {}", e));
                return Err(e.into());
            }
        };

        let previous = self.buffer.get(field_id);
        let envelope = previous
            .and_then(|r| r.value.as_files())
            .cloned()
            .unwrap_or_default()
            .with_keys(uploaded.iter().map(|u| u.key.clone()));

        let mut visible = previous.map(visible_files).unwrap_or_default();
        for file in &uploaded {
            if !visible.iter().any(|v| v.key == file.key) {
                visible.push(file.clone());
            }
        }

        let response = FieldResponse {
            value: FieldValue::Files(envelope),
            field: FieldRef::typed(field_id.clone(), field.field_type.clone()),
            loaded_value: serde_json::to_value(&visible).ok(),
        };
        self.buffer = self.buffer.with_response(response);
        self.schedule_auto_execute();

        info!(field = %field.name, count = uploaded.len(), "Files uploaded");
        Ok(uploaded)
    }

    /// Drop a file from the field's visible list. Stored keys and the
    /// stored object itself are left alone.
    pub fn remove_uploaded_file(&mut self, field_id: &EntityId, key: &str) -> Result<bool, SessionError> {
        if self.form.find_field(field_id).is_none() {
            return Err(SessionError::UnknownField(field_id.clone()));
        }
        let Some(current) = self.buffer.get(field_id) else {
            return Ok(false);
        };

        let mut visible = visible_files(current);
        let before = visible.len();
        visible.retain(|f| f.key != key);
        if visible.len() == before {
            return Ok(false);
        }

        let mut response = current.clone();
        response.loaded_value = serde_json::to_value(&visible).ok();
        self.buffer = self.buffer.with_response(response);
        Ok(true)
    }

    /// The buffer flattened into a submission for this form
    pub fn payload(&self) -> Result<FormSubmission, SessionError> {
        let form_id = self.form.id().cloned().ok_or(SessionError::UnsavedForm)?;
        Ok(FormSubmission {
            id: self.identity.get(),
            form: FormRef { id: form_id },
            field_responses: self.buffer.flatten(),
        })
    }

    /// Validate and store the payload. On failure the error is reported and
    /// the buffer is kept so the user can retry.
    pub async fn submit(&mut self) -> Result<FormSubmission, SessionError> {
        let identity = self.identity.clone();
        let _writes = identity.lock_writes().await;
        let payload = self.payload()?;

        match self.submissions.submit(&self.form, payload).await {
            Ok(saved) => {
                if let Some(id) = &saved.id {
                    self.identity.set(Some(id.clone()));
                    self.latch.adopt(id.clone());
                }
                info!(submission_id = ?saved.id, "Submission stored");
                Ok(saved)
            }
            Err(e) => {
                warn!(error = %e, "Submission failed");
                self.reporter.report(&format!("Could not submit the form: {}", e));
                Err(e.into())
            }
        }
    }

    /// End the session, abandoning any pending auto-execute trigger
    pub fn close(mut self) {
        if let Some(executor) = self.auto_execute.as_mut() {
            executor.shutdown();
        }
        debug!(form = %self.form.slug(), "Edit session closed");
    }

    fn schedule_auto_execute(&mut self) {
        if let Some(executor) = self.auto_execute.as_mut() {
            executor.trigger(self.buffer.flatten());
        }
    }
}

fn visible_files(response: &FieldResponse) -> Vec<UploadedFile> {
    response
        .loaded_value
        .clone()
        .and_then(|v| serde_json::from_value(v).ok())
        .unwrap_or_default()
}

// =============================================================================
// Autosave
// =============================================================================

/// Stores partial answers without validation, reusing the session's
/// submission id once one has been assigned
pub struct SubmissionAutosave {
    submissions: Arc<dyn SubmissionUseCases>,
    form_id: EntityId,
    identity: SubmissionIdentity,
}

impl SubmissionAutosave {
    pub fn new(submissions: Arc<dyn SubmissionUseCases>, form_id: EntityId, identity: SubmissionIdentity) -> Self {
        Self {
            submissions,
            form_id,
            identity,
        }
    }
}

#[async_trait]
impl AutoAction for SubmissionAutosave {
    fn name(&self) -> &str {
        "Autosave"
    }

    async fn run(&self, responses: Vec<FieldResponse>) -> Result<(), ActionError> {
        let _writes = self.identity.lock_writes().await;
        let submission = FormSubmission {
            id: self.identity.get(),
            form: FormRef {
                id: self.form_id.clone(),
            },
            field_responses: responses,
        };
        let saved = self.submissions.save_progress(submission).await?;
        if saved.id.is_some() {
            self.identity.set(saved.id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::commands::SubmissionService;
    use crate::domain::aggregates::{Field, Parent};
    use crate::domain::value_objects::{FieldType, FileUploads};
    use crate::infrastructure::{
        CollectingErrorReporter, InMemoryFileUploader, InMemorySubmissionRepository, NoOpEventPublisher,
    };
    use crate::ports::outbound::SubmissionRepository;
    use serde_json::json;
    use std::time::Duration;

    struct Fixture {
        session: EditSession,
        name: EntityId,
        agree: EntityId,
        upload: EntityId,
        repo: Arc<InMemorySubmissionRepository>,
        uploader: Arc<InMemoryFileUploader>,
        alerts: Arc<CollectingErrorReporter>,
    }

    fn fixture() -> Fixture {
        let mut form = Form::create("intake", "en", "Intake");
        form.assign_id(EntityId::from_string("form-1"));
        let name = form
            .attach_field(Field::new("Name", FieldType::Text).required(), Parent::Form)
            .unwrap();
        let agree = form
            .attach_field(Field::new("Agree", FieldType::Checkbox), Parent::Form)
            .unwrap();
        let upload = form
            .attach_field(Field::new("Documents", FieldType::File), Parent::Form)
            .unwrap();

        let registry = Arc::new(FieldTypeRegistry::new());
        let repo = Arc::new(InMemorySubmissionRepository::new());
        let submissions = Arc::new(SubmissionService::new(
            repo.clone(),
            registry.clone(),
            Arc::new(NoOpEventPublisher),
        ));
        let uploader = Arc::new(InMemoryFileUploader::new());
        let alerts = Arc::new(CollectingErrorReporter::new());

        let session = EditSession::new(Arc::new(form), registry, submissions, alerts.clone())
            .with_uploader(uploader.clone());

        Fixture {
            session,
            name,
            agree,
            upload,
            repo,
            uploader,
            alerts,
        }
    }

    fn pdf(name: &str) -> UploadFile {
        UploadFile::new(name, "application/pdf", vec![1])
    }

    #[test]
    fn test_edit_coerces_and_flattens() {
        let mut fx = fixture();
        let value = fx.session.edit(&fx.agree, &json!("on")).unwrap();
        assert_eq!(value, FieldValue::Bool(true));

        let payload = fx.session.payload().unwrap();
        assert_eq!(payload.field_responses.len(), 1);
        assert_eq!(payload.form.id, EntityId::from_string("form-1"));
        assert!(payload.id.is_none());
    }

    #[test]
    fn test_unknown_field_rejected() {
        let mut fx = fixture();
        let missing = EntityId::from_string("missing");
        assert_eq!(
            fx.session.edit(&missing, &json!("x")),
            Err(SessionError::UnknownField(missing))
        );
    }

    #[test]
    fn test_resync_does_not_clobber_edits() {
        let mut fx = fixture();
        let mut fetched = FormSubmission::create(
            EntityId::from_string("form-1"),
            vec![FieldResponse::new(FieldRef::id_only(fx.name.clone()), FieldValue::text("Ada"))],
        );
        fetched.id = Some(EntityId::from_string("s1"));

        assert!(fx.session.sync_submission(Some(&fetched)));
        fx.session.edit(&fx.name, &json!("Grace")).unwrap();

        assert!(!fx.session.sync_submission(Some(&fetched)));
        assert_eq!(fx.session.buffer().value(&fx.name), Some(&FieldValue::text("Grace")));
        assert_eq!(fx.session.submission_id(), Some(EntityId::from_string("s1")));
    }

    #[tokio::test]
    async fn test_uploads_accumulate_keys() {
        let mut fx = fixture();
        let first = fx.session.upload_files(&fx.upload, vec![pdf("a.pdf")]).await.unwrap();
        let second = fx.session.upload_files(&fx.upload, vec![pdf("b.pdf")]).await.unwrap();

        let files = fx.session.buffer().value(&fx.upload).unwrap().as_files().unwrap().clone();
        assert_eq!(files.keys, vec![first[0].key.clone(), second[0].key.clone()]);
        assert_eq!(fx.uploader.len(), 2);
    }

    #[tokio::test]
    async fn test_failed_upload_keeps_previous_keys() {
        let mut fx = fixture();
        let first = fx.session.upload_files(&fx.upload, vec![pdf("a.pdf")]).await.unwrap();

        fx.uploader.set_failing(true);
        let result = fx.session.upload_files(&fx.upload, vec![pdf("b.pdf")]).await;
        assert!(matches!(result, Err(SessionError::Upload(_))));

        let files = fx.session.buffer().value(&fx.upload).unwrap().as_files().unwrap().clone();
        assert_eq!(files, FileUploads::new(vec![first[0].key.clone()]));
        assert_eq!(fx.alerts.messages(), vec!["Could not upload files: upload failed: storage unavailable".to_string()]);
    }

    #[tokio::test]
    async fn test_removing_file_only_hides_it() {
        let mut fx = fixture();
        let uploaded = fx
            .session
            .upload_files(&fx.upload, vec![pdf("a.pdf"), pdf("b.pdf")])
            .await
            .unwrap();

        assert!(fx.session.remove_uploaded_file(&fx.upload, &uploaded[0].key).unwrap());
        assert!(!fx.session.remove_uploaded_file(&fx.upload, &uploaded[0].key).unwrap());

        let response = fx.session.buffer().get(&fx.upload).unwrap();
        assert_eq!(response.value.as_files().unwrap().keys.len(), 2);
        assert_eq!(visible_files(response), vec![uploaded[1].clone()]);
        assert!(fx.uploader.contains(&uploaded[0].key));
    }

    #[tokio::test]
    async fn test_failed_submit_reports_and_keeps_buffer() {
        let mut fx = fixture();
        fx.session.edit(&fx.agree, &json!(true)).unwrap();

        let result = fx.session.submit().await;
        assert!(matches!(
            result,
            Err(SessionError::UseCase(UseCaseError::Validation(_)))
        ));
        assert_eq!(fx.alerts.messages().len(), 1);
        assert_eq!(fx.session.buffer().len(), 1);

        fx.session.edit(&fx.name, &json!("Ada")).unwrap();
        fx.repo.set_failing(true);
        assert!(fx.session.submit().await.is_err());
        assert_eq!(fx.session.buffer().len(), 2);

        fx.repo.set_failing(false);
        let saved = fx.session.submit().await.unwrap();
        assert_eq!(fx.session.submission_id(), saved.id);
        assert_eq!(fx.alerts.messages().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_autosave_after_edits_settle() {
        let fx = fixture();
        let Fixture { session, name, repo, .. } = fx;
        let mut session = session.with_autosave(&AutoExecuteConfig::default()).unwrap();

        session.edit(&name, &json!("A")).unwrap();
        tokio::time::sleep(Duration::from_millis(300)).await;
        session.edit(&name, &json!("Ada")).unwrap();
        assert!(session.loading());

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(repo.len(), 1);
        assert!(!session.loading());

        let id = session.submission_id().unwrap();
        let stored = repo.load_submission(&id).await.unwrap();
        assert_eq!(stored.field_responses[0].value, FieldValue::text("Ada"));

        // A later fetch of the autosaved row must not reseed
        session.edit(&name, &json!("Ada L")).unwrap();
        assert!(!session.sync_submission(Some(&stored)));
        assert_eq!(session.buffer().value(&name), Some(&FieldValue::text("Ada L")));
        session.close();
    }

    /// Submission service whose saves take a while to land
    struct SlowSubmissions {
        inner: SubmissionService,
        delay: Duration,
    }

    #[async_trait]
    impl SubmissionUseCases for SlowSubmissions {
        async fn submit(&self, form: &Form, submission: FormSubmission) -> Result<FormSubmission, UseCaseError> {
            tokio::time::sleep(self.delay).await;
            self.inner.submit(form, submission).await
        }

        async fn save_progress(&self, submission: FormSubmission) -> Result<FormSubmission, UseCaseError> {
            tokio::time::sleep(self.delay).await;
            self.inner.save_progress(submission).await
        }
    }

    fn slow_session() -> (EditSession, EntityId, Arc<InMemorySubmissionRepository>) {
        let Fixture { session, name, repo, alerts, .. } = fixture();
        let registry = Arc::new(FieldTypeRegistry::new());
        let submissions = Arc::new(SlowSubmissions {
            inner: SubmissionService::new(repo.clone(), registry.clone(), Arc::new(NoOpEventPublisher)),
            delay: Duration::from_millis(1500),
        });
        let session = EditSession::new(Arc::new(session.form().clone()), registry, submissions, alerts)
            .with_autosave(&AutoExecuteConfig::default())
            .unwrap();
        (session, name, repo)
    }

    #[tokio::test(start_paused = true)]
    async fn test_overlapping_autosaves_write_one_row() {
        let (mut session, name, repo) = slow_session();

        session.edit(&name, &json!("A")).unwrap();
        tokio::time::sleep(Duration::from_millis(1100)).await;
        session.edit(&name, &json!("Ada")).unwrap();
        tokio::time::sleep(Duration::from_millis(5000)).await;

        assert_eq!(repo.len(), 1);
        let id = session.submission_id().unwrap();
        let stored = repo.load_submission(&id).await.unwrap();
        assert_eq!(stored.field_responses[0].value, FieldValue::text("Ada"));
        assert!(!session.loading());
        session.close();
    }

    #[tokio::test(start_paused = true)]
    async fn test_submit_waits_for_running_autosave() {
        let (mut session, name, repo) = slow_session();

        session.edit(&name, &json!("Ada")).unwrap();
        tokio::time::sleep(Duration::from_millis(1100)).await;

        let saved = session.submit().await.unwrap();
        assert_eq!(repo.len(), 1);
        assert_eq!(saved.id, session.submission_id());
        session.close();
    }

    #[test]
    fn test_edit_outside_runtime_reports_unscheduled_autosave() {
        let Fixture { session, name, alerts, .. } = fixture();
        let mut session = session.with_autosave(&AutoExecuteConfig::default()).unwrap();

        assert_eq!(session.edit(&name, &json!("Ada")).unwrap(), FieldValue::text("Ada"));
        assert!(!session.loading());
        assert_eq!(
            alerts.messages(),
            vec!["Autosave could not be scheduled: no async runtime to schedule on".to_string()]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_abandons_pending_autosave() {
        let fx = fixture();
        let Fixture { session, name, repo, .. } = fx;
        let mut session = session.with_autosave(&AutoExecuteConfig::default()).unwrap();

        session.edit(&name, &json!("Ada")).unwrap();
        session.close();

        tokio::time::sleep(Duration::from_millis(3000)).await;
        assert!(repo.is_empty());
    }
}
