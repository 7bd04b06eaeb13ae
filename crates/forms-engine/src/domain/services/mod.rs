//! Domain services
//!
//! Stateless rules that span more than one aggregate instance.

pub mod naming;
pub mod ordering;
pub mod versioning;

pub use naming::NameDeriver;
pub use ordering::{sorted_for_display, DisplayOrder};
pub use versioning::{VersionError, VersionPolicy};
