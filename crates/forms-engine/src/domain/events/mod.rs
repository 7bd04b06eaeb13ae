//! Domain Events
//!
//! Raised by aggregates and services when a form lineage or a submission
//! changes state.

use chrono::{DateTime, Utc};
use crate::domain::value_objects::{EntityId, FormSlug, LanguageTag};

#[derive(Clone, Debug)]
pub enum DomainEvent {
    Form(FormEvent),
    Submission(SubmissionEvent),
}

#[derive(Clone, Debug)]
pub enum FormEvent {
    Created {
        slug: FormSlug,
        language: LanguageTag,
        created_at: DateTime<Utc>,
    },

    DraftSaved {
        form_id: EntityId,
        slug: FormSlug,
        language: LanguageTag,
    },

    DraftCreated {
        slug: FormSlug,
        language: LanguageTag,
    },

    Published {
        form_id: Option<EntityId>,
        slug: FormSlug,
        language: LanguageTag,
        version: u32,
        published_at: DateTime<Utc>,
    },

    DraftDeleted {
        form_id: EntityId,
        slug: FormSlug,
        language: LanguageTag,
    },
}

#[derive(Clone, Debug)]
pub enum SubmissionEvent {
    Saved {
        submission_id: EntityId,
        form_id: EntityId,
        response_count: usize,
    },
}

impl DomainEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            DomainEvent::Form(e) => match e {
                FormEvent::Created { .. } => "form.created",
                FormEvent::DraftSaved { .. } => "form.draft_saved",
                FormEvent::DraftCreated { .. } => "form.draft_created",
                FormEvent::Published { .. } => "form.published",
                FormEvent::DraftDeleted { .. } => "form.draft_deleted",
            },
            DomainEvent::Submission(e) => match e {
                SubmissionEvent::Saved { .. } => "submission.saved",
            },
        }
    }

    /// Slug of the lineage the event belongs to, if any
    pub fn slug(&self) -> Option<&FormSlug> {
        match self {
            DomainEvent::Form(e) => Some(match e {
                FormEvent::Created { slug, .. } => slug,
                FormEvent::DraftSaved { slug, .. } => slug,
                FormEvent::DraftCreated { slug, .. } => slug,
                FormEvent::Published { slug, .. } => slug,
                FormEvent::DraftDeleted { slug, .. } => slug,
            }),
            DomainEvent::Submission(_) => None,
        }
    }
}
