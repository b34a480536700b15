//! Family tree domain model.
//!
//! # Responsibility
//! - Define canonical person records and relationship references.
//! - Define the snapshot shape shared by persistence and rendering.
//!
//! # Invariants
//! - Every person is identified by a stable `PersonId`.
//! - Relationship edges are symmetric across the two endpoint records.

pub mod person;
pub mod snapshot;
