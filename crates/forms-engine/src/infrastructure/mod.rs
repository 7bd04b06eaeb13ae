//! Infrastructure layer
//!
//! Concrete adapters for the outbound ports.

pub mod adapters;
pub mod persistence;

pub use adapters::*;
pub use persistence::*;
