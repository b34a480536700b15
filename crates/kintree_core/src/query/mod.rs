//! Read-only queries over tree snapshots.
//!
//! # Responsibility
//! - Answer lookups a frontend needs without touching the store.

pub mod family;
