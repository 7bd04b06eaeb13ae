//! Version/Publish state machine
//!
//! A `(slug, language)` lineage is a run of published versions `1..K` plus at
//! most one draft working copy, which is always `version = 0`. Published
//! rows are terminal. Every illegal transition is a typed rejection; nothing
//! here is silently ignored.

use thiserror::Error;

use crate::domain::aggregates::{Form, FormState};
use crate::domain::value_objects::{FormSlug, LanguageTag};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VersionError {
    #[error("form is not a draft")]
    NotDraft,

    #[error("draft rows must be version 0, found version {0}")]
    InvalidDraftVersion(u32),

    #[error("a draft already exists for {slug} ({language})")]
    DraftAlreadyExists { slug: FormSlug, language: LanguageTag },

    #[error("{slug} has no other variant; its only draft cannot be deleted")]
    SoleLanguageVariant { slug: FormSlug },

    #[error("form has not been saved yet")]
    Unsaved,
}

pub struct VersionPolicy;

impl VersionPolicy {
    /// Drafts are the only rows that may be written in place
    pub fn check_save_draft(form: &Form) -> Result<(), VersionError> {
        if form.state() != FormState::Draft {
            return Err(VersionError::NotDraft);
        }
        if form.version() != 0 {
            return Err(VersionError::InvalidDraftVersion(form.version()));
        }
        Ok(())
    }

    /// `max(existing versions) + 1` within the `(slug, language)` lineage
    pub fn next_version(rows: &[Form], slug: &FormSlug, language: &LanguageTag) -> u32 {
        rows.iter()
            .filter(|f| f.slug() == slug && f.language() == language)
            .map(Form::version)
            .max()
            .unwrap_or(0)
            + 1
    }

    /// Publish a draft, fixing its version number. Returns the new version.
    pub fn publish(form: &mut Form, rows: &[Form]) -> Result<u32, VersionError> {
        Self::check_save_draft(form)?;
        let version = Self::next_version(rows, form.slug(), form.language());
        form.mark_published(version);
        Ok(version)
    }

    /// Create the working copy for a lineage.
    ///
    /// The draft starts empty; copying structure from a published row is
    /// the caller's call (see `Form::clone_structure_for_draft`).
    pub fn new_draft(
        rows: &[Form],
        slug: &FormSlug,
        language: &LanguageTag,
        title: impl Into<String>,
    ) -> Result<Form, VersionError> {
        Self::check_no_draft(rows, slug, language)?;
        Ok(Form::create(slug.clone(), language.clone(), title))
    }

    /// Reject a second concurrent draft for the lineage
    pub fn check_no_draft(rows: &[Form], slug: &FormSlug, language: &LanguageTag) -> Result<(), VersionError> {
        let exists = rows
            .iter()
            .any(|f| f.slug() == slug && f.language() == language && f.is_draft());
        if exists {
            return Err(VersionError::DraftAlreadyExists {
                slug: slug.clone(),
                language: language.clone(),
            });
        }
        Ok(())
    }

    /// `rows` holds every row of the slug, across all languages
    pub fn check_delete_draft(form: &Form, rows: &[Form]) -> Result<(), VersionError> {
        if !form.is_draft() {
            return Err(VersionError::NotDraft);
        }
        let id = form.id().ok_or(VersionError::Unsaved)?;

        let others = rows
            .iter()
            .filter(|f| f.slug() == form.slug())
            .any(|f| f.id() != Some(id));
        if !others {
            return Err(VersionError::SoleLanguageVariant {
                slug: form.slug().clone(),
            });
        }
        Ok(())
    }

    /// Read-only lookup. No version means the draft if one exists, else the
    /// latest published row.
    pub fn select<'a>(
        rows: &'a [Form],
        slug: &FormSlug,
        language: &LanguageTag,
        version: Option<u32>,
    ) -> Option<&'a Form> {
        let mut lineage = rows
            .iter()
            .filter(|f| f.slug() == slug && f.language() == language);

        match version {
            Some(0) => lineage.find(|f| f.is_draft()),
            Some(v) => lineage.find(|f| f.is_published() && f.version() == v),
            None => {
                let lineage: Vec<&Form> = lineage.collect();
                lineage
                    .iter()
                    .find(|f| f.is_draft())
                    .copied()
                    .or_else(|| {
                        lineage
                            .iter()
                            .filter(|f| f.is_published())
                            .max_by_key(|f| f.version())
                            .copied()
                    })
            }
        }
    }
}
