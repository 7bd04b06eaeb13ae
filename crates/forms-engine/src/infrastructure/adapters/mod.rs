//! Adapters for the non-persistence collaborators: file uploads, the
//! error/alert sink and the language catalogue.

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{info, warn};

use crate::application::dto::{UploadFile, UploadTarget};
use crate::domain::value_objects::{EntityId, Language, UploadedFile};
use crate::ports::outbound::{ErrorReporter, FileUploader, LanguageCatalogue, UploadError};

// =============================================================================
// File uploads
// =============================================================================

/// Keeps uploaded bytes in memory under generated keys
#[derive(Default)]
pub struct InMemoryFileUploader {
    objects: DashMap<String, UploadFile>,
    failing: AtomicBool,
}

impl InMemoryFileUploader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.objects.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

#[async_trait]
impl FileUploader for InMemoryFileUploader {
    async fn upload_files(
        &self,
        target: &UploadTarget,
        files: Vec<UploadFile>,
    ) -> Result<Vec<UploadedFile>, UploadError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(UploadError::Failed("storage unavailable".into()));
        }
        if let Some(empty) = files.iter().find(|f| f.bytes.is_empty()) {
            return Err(UploadError::Rejected {
                file_name: empty.file_name.clone(),
                reason: "file is empty".into(),
            });
        }

        let mut uploaded = Vec::with_capacity(files.len());
        for file in files {
            let key = format!("{}/{}/{}", target.field_id, EntityId::new(), file.file_name);
            uploaded.push(UploadedFile {
                url: format!("memory://{}", key),
                key: key.clone(),
            });
            self.objects.insert(key, file);
        }
        Ok(uploaded)
    }
}

// =============================================================================
// Error reporting
// =============================================================================

/// Logs reported failures at warn level
pub struct TracingErrorReporter;

impl ErrorReporter for TracingErrorReporter {
    fn report(&self, message: &str) {
        warn!(alert = message, "User-facing error");
    }
}

/// Collects reported messages so hosts can show (and dismiss) them
#[derive(Default)]
pub struct CollectingErrorReporter {
    messages: Mutex<Vec<String>>,
}

impl CollectingErrorReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().clone()
    }

    /// Remove and return everything reported so far
    pub fn drain(&self) -> Vec<String> {
        std::mem::take(&mut *self.messages.lock())
    }
}

impl ErrorReporter for CollectingErrorReporter {
    fn report(&self, message: &str) {
        info!(alert = message, "Error reported");
        self.messages.lock().push(message.to_string());
    }
}

// =============================================================================
// Language catalogue
// =============================================================================

/// Fixed catalogue of languages
pub struct StaticLanguageCatalogue {
    languages: Vec<Language>,
}

impl StaticLanguageCatalogue {
    pub fn new(languages: Vec<Language>) -> Self {
        Self { languages }
    }
}

impl Default for StaticLanguageCatalogue {
    fn default() -> Self {
        Self::new(vec![
            Language::new("en", "English", "English"),
            Language::new("es", "Spanish", "Español"),
            Language::new("fr", "French", "Français"),
            Language::new("de", "German", "Deutsch"),
            Language::new("pt", "Portuguese", "Português"),
        ])
    }
}

impl LanguageCatalogue for StaticLanguageCatalogue {
    fn languages(&self) -> Vec<Language> {
        self.languages.clone()
    }
}
