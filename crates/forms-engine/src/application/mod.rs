//! Application layer
//!
//! Use-case services, the edit session and the auto-execute scheduler.

pub mod commands;
pub mod dto;
pub mod reconciler;
pub mod scheduler;
pub mod session;

pub use commands::{FormService, SubmissionService};
pub use reconciler::{EditBuffer, ResponseReconciler, SeedLatch};
pub use scheduler::{ActionError, AutoAction, AutoExecutor, DebounceTimer, ScheduleError};
pub use session::{EditSession, SessionError, SubmissionAutosave, SubmissionIdentity};
